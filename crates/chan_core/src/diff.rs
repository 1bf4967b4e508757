//! Structural diffs over files, posts and threads.
//!
//! Pairing is by natural key (`File::url`, `Post::number`) in collection order:
//! every old entity claims the first unclaimed new entity with the same key.
//! Field lists follow declaration order, so results are identical on every call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{File, Post, Thread};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileField {
    ThumbnailUrl,
    UploadName,
    CdnName,
    CheckSum,
    IsDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostField {
    CreateTimestamp,
    Name,
    Comment,
    IsBanned,
    IsDeleted,
    IsOp,
    /// Sentinel: the nested file diff is non-empty.
    Files,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreadField {
    Board,
    ImageBoard,
    Title,
    PostersCount,
    ViewsCount,
    LastActivity,
    CreateTimestamp,
    IsDeleted,
    /// Sentinel: the nested post diff is non-empty.
    Posts,
}

impl FileField {
    pub const COMPARED: [FileField; 5] = [
        FileField::ThumbnailUrl,
        FileField::UploadName,
        FileField::CdnName,
        FileField::CheckSum,
        FileField::IsDeleted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FileField::ThumbnailUrl => "thumbnailUrl",
            FileField::UploadName => "uploadName",
            FileField::CdnName => "cdnName",
            FileField::CheckSum => "checkSum",
            FileField::IsDeleted => "isDeleted",
        }
    }

    fn differs(self, old: &File, new: &File) -> bool {
        match self {
            FileField::ThumbnailUrl => old.thumbnail_url != new.thumbnail_url,
            FileField::UploadName => old.upload_name != new.upload_name,
            FileField::CdnName => old.cdn_name != new.cdn_name,
            FileField::CheckSum => old.check_sum != new.check_sum,
            FileField::IsDeleted => old.is_deleted != new.is_deleted,
        }
    }

    /// Copies this field from `source`. `IsDeleted` is never copied.
    pub fn apply(self, target: &mut File, source: &File) {
        match self {
            FileField::ThumbnailUrl => target.thumbnail_url = source.thumbnail_url.clone(),
            FileField::UploadName => target.upload_name = source.upload_name.clone(),
            FileField::CdnName => target.cdn_name = source.cdn_name.clone(),
            FileField::CheckSum => target.check_sum = source.check_sum.clone(),
            FileField::IsDeleted => {}
        }
    }
}

impl PostField {
    pub const COMPARED: [PostField; 6] = [
        PostField::CreateTimestamp,
        PostField::Name,
        PostField::Comment,
        PostField::IsBanned,
        PostField::IsDeleted,
        PostField::IsOp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PostField::CreateTimestamp => "createTimestamp",
            PostField::Name => "name",
            PostField::Comment => "comment",
            PostField::IsBanned => "isBanned",
            PostField::IsDeleted => "isDeleted",
            PostField::IsOp => "isOp",
            PostField::Files => "files",
        }
    }

    fn differs(self, old: &Post, new: &Post) -> bool {
        match self {
            PostField::CreateTimestamp => old.create_timestamp != new.create_timestamp,
            PostField::Name => old.name != new.name,
            PostField::Comment => old.comment != new.comment,
            PostField::IsBanned => old.is_banned != new.is_banned,
            PostField::IsDeleted => old.is_deleted != new.is_deleted,
            PostField::IsOp => old.is_op != new.is_op,
            PostField::Files => false,
        }
    }

    /// Copies this scalar field from `source`. `IsDeleted` and `Files` are never copied.
    pub fn apply(self, target: &mut Post, source: &Post) {
        match self {
            PostField::CreateTimestamp => target.create_timestamp = source.create_timestamp,
            PostField::Name => target.name = source.name.clone(),
            PostField::Comment => target.comment = source.comment.clone(),
            PostField::IsBanned => target.is_banned = source.is_banned,
            PostField::IsOp => target.is_op = source.is_op,
            PostField::IsDeleted | PostField::Files => {}
        }
    }
}

impl ThreadField {
    pub const COMPARED: [ThreadField; 8] = [
        ThreadField::Board,
        ThreadField::ImageBoard,
        ThreadField::Title,
        ThreadField::PostersCount,
        ThreadField::ViewsCount,
        ThreadField::LastActivity,
        ThreadField::CreateTimestamp,
        ThreadField::IsDeleted,
    ];

    /// Fields only the catalog pass is allowed to change.
    pub const CATALOG_OWNED: [ThreadField; 2] = [ThreadField::ViewsCount, ThreadField::LastActivity];

    pub fn name(self) -> &'static str {
        match self {
            ThreadField::Board => "board",
            ThreadField::ImageBoard => "imageBoard",
            ThreadField::Title => "title",
            ThreadField::PostersCount => "postersCount",
            ThreadField::ViewsCount => "viewsCount",
            ThreadField::LastActivity => "lastActivity",
            ThreadField::CreateTimestamp => "createTimestamp",
            ThreadField::IsDeleted => "isDeleted",
            ThreadField::Posts => "posts",
        }
    }

    fn differs(self, old: &Thread, new: &Thread) -> bool {
        match self {
            ThreadField::Board => old.board != new.board,
            ThreadField::ImageBoard => old.image_board != new.image_board,
            ThreadField::Title => old.title != new.title,
            ThreadField::PostersCount => old.posters_count != new.posters_count,
            ThreadField::ViewsCount => old.views_count != new.views_count,
            ThreadField::LastActivity => old.last_activity != new.last_activity,
            ThreadField::CreateTimestamp => old.create_timestamp != new.create_timestamp,
            ThreadField::IsDeleted => old.is_deleted != new.is_deleted,
            ThreadField::Posts => false,
        }
    }

    /// Copies this scalar field from `source`. Identity, deletion and posts are never copied.
    pub fn apply(self, target: &mut Thread, source: &Thread) {
        match self {
            ThreadField::Title => target.title = source.title.clone(),
            ThreadField::PostersCount => target.posters_count = source.posters_count,
            ThreadField::ViewsCount => target.views_count = source.views_count,
            ThreadField::LastActivity => target.last_activity = source.last_activity,
            ThreadField::CreateTimestamp => target.create_timestamp = source.create_timestamp,
            ThreadField::Board
            | ThreadField::ImageBoard
            | ThreadField::IsDeleted
            | ThreadField::Posts => {}
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    )*};
}

display_by_name!(FileField, PostField, ThreadField);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesDiff {
    pub old: File,
    pub new: File,
    pub fields: Vec<FileField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileArraysDiff {
    pub only_in_old: Vec<File>,
    pub only_in_new: Vec<File>,
    /// Matched pairs whose fields differ; identical pairs are omitted.
    pub differences: Vec<FilesDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsDiff {
    pub old: Post,
    pub new: Post,
    pub fields: Vec<PostField>,
    pub files_diff: Option<FileArraysDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostArraysDiff {
    pub only_in_old: Vec<Post>,
    pub only_in_new: Vec<Post>,
    pub differences: Vec<PostsDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadsDiff {
    pub old: Thread,
    pub new: Thread,
    pub fields: Vec<ThreadField>,
    pub posts_diff: Option<PostArraysDiff>,
}

impl FileArraysDiff {
    pub fn is_empty(&self) -> bool {
        self.only_in_old.is_empty() && self.only_in_new.is_empty() && self.differences.is_empty()
    }
}

impl PostArraysDiff {
    pub fn is_empty(&self) -> bool {
        self.only_in_old.is_empty() && self.only_in_new.is_empty() && self.differences.is_empty()
    }
}

impl FilesDiff {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PostsDiff {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: PostField) -> bool {
        self.fields.contains(&field)
    }
}

impl ThreadsDiff {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: ThreadField) -> bool {
        self.fields.contains(&field)
    }

    /// Scalar fields of the diff, without the `posts` sentinel.
    pub fn scalar_fields(&self) -> Vec<ThreadField> {
        self.fields
            .iter()
            .copied()
            .filter(|field| *field != ThreadField::Posts)
            .collect()
    }
}

pub fn diff_files(old: &File, new: &File) -> FilesDiff {
    let fields = FileField::COMPARED
        .into_iter()
        .filter(|field| field.differs(old, new))
        .collect();
    FilesDiff {
        old: old.clone(),
        new: new.clone(),
        fields,
    }
}

pub fn diff_file_arrays(old: &[File], new: &[File]) -> FileArraysDiff {
    let pairing = pair_by_key(old, new, |file| file.url.as_str());
    FileArraysDiff {
        only_in_old: pairing.unpaired_old.iter().map(|&i| old[i].clone()).collect(),
        only_in_new: pairing.unpaired_new.iter().map(|&i| new[i].clone()).collect(),
        differences: pairing
            .pairs
            .iter()
            .map(|&(i, j)| diff_files(&old[i], &new[j]))
            .filter(|diff| !diff.is_empty())
            .collect(),
    }
}

pub fn diff_posts(old: &Post, new: &Post) -> PostsDiff {
    let mut fields: Vec<PostField> = PostField::COMPARED
        .into_iter()
        .filter(|field| field.differs(old, new))
        .collect();
    let files_diff = diff_file_arrays(&old.files, &new.files);
    let files_diff = if files_diff.is_empty() {
        None
    } else {
        fields.push(PostField::Files);
        Some(files_diff)
    };
    PostsDiff {
        old: old.clone(),
        new: new.clone(),
        fields,
        files_diff,
    }
}

pub fn diff_post_arrays(old: &[Post], new: &[Post]) -> PostArraysDiff {
    let pairing = pair_by_key(old, new, |post| post.number);
    PostArraysDiff {
        only_in_old: pairing.unpaired_old.iter().map(|&i| old[i].clone()).collect(),
        only_in_new: pairing.unpaired_new.iter().map(|&i| new[i].clone()).collect(),
        differences: pairing
            .pairs
            .iter()
            .map(|&(i, j)| diff_posts(&old[i], &new[j]))
            .filter(|diff| !diff.is_empty())
            .collect(),
    }
}

/// Diffs two snapshots of a thread, skipping the `ignored` scalar fields.
pub fn diff_threads(old: &Thread, new: &Thread, ignored: &[ThreadField]) -> ThreadsDiff {
    let mut fields: Vec<ThreadField> = ThreadField::COMPARED
        .into_iter()
        .filter(|field| !ignored.contains(field))
        .filter(|field| field.differs(old, new))
        .collect();
    let posts_diff = diff_post_arrays(&old.posts, &new.posts);
    let posts_diff = if posts_diff.is_empty() {
        None
    } else {
        fields.push(ThreadField::Posts);
        Some(posts_diff)
    };
    ThreadsDiff {
        old: old.clone(),
        new: new.clone(),
        fields,
        posts_diff,
    }
}

struct Pairing {
    pairs: Vec<(usize, usize)>,
    unpaired_old: Vec<usize>,
    unpaired_new: Vec<usize>,
}

fn pair_by_key<'a, T, K, F>(old: &'a [T], new: &'a [T], key: F) -> Pairing
where
    K: PartialEq,
    F: Fn(&'a T) -> K,
{
    let mut claimed = vec![false; new.len()];
    let mut pairs = Vec::new();
    let mut unpaired_old = Vec::new();

    for (i, old_item) in old.iter().enumerate() {
        let old_key = key(old_item);
        let partner = new
            .iter()
            .enumerate()
            .position(|(j, new_item)| !claimed[j] && key(new_item) == old_key);
        match partner {
            Some(j) => {
                claimed[j] = true;
                pairs.push((i, j));
            }
            None => unpaired_old.push(i),
        }
    }

    let unpaired_new = claimed
        .iter()
        .enumerate()
        .filter_map(|(j, claimed)| (!claimed).then_some(j))
        .collect();

    Pairing {
        pairs,
        unpaired_old,
        unpaired_new,
    }
}
