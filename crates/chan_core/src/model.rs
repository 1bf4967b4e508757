use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub type ThreadNumber = u64;
pub type PostNumber = u64;

/// Upstream imageboard backend. Each one has its own URL layout and JSON shape.
///
/// Serialised as its name (`"2ch"`, `"4chan"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageBoard {
    Dvach,
    FourChan,
}

impl ImageBoard {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageBoard::Dvach => "2ch",
            ImageBoard::FourChan => "4chan",
        }
    }
}

impl fmt::Display for ImageBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown imageboard {0:?} (expected \"2ch\" or \"4chan\")")]
pub struct UnknownImageBoard(pub String);

impl FromStr for ImageBoard {
    type Err = UnknownImageBoard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2ch" => Ok(ImageBoard::Dvach),
            "4chan" => Ok(ImageBoard::FourChan),
            other => Err(UnknownImageBoard(other.to_string())),
        }
    }
}

impl Serialize for ImageBoard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImageBoard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One observed board, e.g. 2ch `/b/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoardTarget {
    pub image_board: ImageBoard,
    pub board: String,
}

impl BoardTarget {
    pub fn new(image_board: ImageBoard, board: impl Into<String>) -> Self {
        Self {
            image_board,
            board: board.into(),
        }
    }
}

impl fmt::Display for BoardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/", self.image_board, self.board)
    }
}

/// Identifies a thread in post and file events without carrying its posts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadKey {
    pub image_board: ImageBoard,
    pub board: String,
    pub number: ThreadNumber,
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/#{}", self.image_board, self.board, self.number)
    }
}

/// Thread summary as listed by the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogThread {
    pub number: ThreadNumber,
    pub create_timestamp: i64,
    pub views_count: u64,
    pub posts_count: u64,
    /// Upstream mutation marker; changes whenever the thread receives activity.
    pub last_activity: i64,
    pub board: String,
    pub image_board: ImageBoard,
    pub name: String,
    pub title: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub number: ThreadNumber,
    pub board: String,
    pub image_board: ImageBoard,
    pub title: String,
    pub posters_count: u64,
    pub views_count: u64,
    pub last_activity: i64,
    pub create_timestamp: i64,
    pub is_deleted: bool,
    /// Arrival order: posts observed later are appended.
    pub posts: Vec<Post>,
}

impl Thread {
    pub fn key(&self) -> ThreadKey {
        ThreadKey {
            image_board: self.image_board,
            board: self.board.clone(),
            number: self.number,
        }
    }

    pub fn target(&self) -> BoardTarget {
        BoardTarget::new(self.image_board, self.board.clone())
    }

    pub fn post(&self, number: PostNumber) -> Option<&Post> {
        self.posts.iter().find(|post| post.number == number)
    }

    pub fn post_mut(&mut self, number: PostNumber) -> Option<&mut Post> {
        self.posts.iter_mut().find(|post| post.number == number)
    }

    pub fn files_count(&self) -> usize {
        self.posts.iter().map(|post| post.files.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub number: PostNumber,
    /// Position in the upstream list when the post was first observed.
    pub list_index: usize,
    pub create_timestamp: i64,
    pub name: String,
    pub comment: String,
    pub is_banned: bool,
    pub is_deleted: bool,
    pub is_op: bool,
    pub files: Vec<File>,
}

impl Post {
    pub fn file(&self, url: &str) -> Option<&File> {
        self.files.iter().find(|file| file.url == url)
    }

    pub fn file_mut(&mut self, url: &str) -> Option<&mut File> {
        self.files.iter_mut().find(|file| file.url == url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Stable per upload; the matching key across diffs.
    pub url: String,
    pub thumbnail_url: String,
    pub upload_name: String,
    pub cdn_name: String,
    pub check_sum: String,
    pub is_deleted: bool,
    pub list_index: usize,
}
