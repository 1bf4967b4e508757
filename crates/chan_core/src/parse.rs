//! Normalises the 2ch and 4chan JSON payloads into the shared entity model.
//!
//! Missing required fields and wrong types fail the whole payload. Absent
//! optional text becomes `""` and absent optional counters become `0`.
//! `views_count` and `last_activity` are never derived from a thread payload;
//! the catalog pass back-fills them.

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::{BoardTarget, CatalogThread, Endpoints, File, ImageBoard, Post, PostNumber, Thread};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed {what} payload: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("thread payload contains no posts")]
    EmptyThread,
    #[error("invalid media path {path:?}: {source}")]
    MediaUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("post {number} has a file without `{field}`")]
    IncompleteFile {
        number: PostNumber,
        field: &'static str,
    },
}

pub fn parse_catalog(target: &BoardTarget, body: &[u8]) -> Result<Vec<CatalogThread>, ParseError> {
    match target.image_board {
        ImageBoard::Dvach => {
            let catalog: DvachCatalog = from_slice("2ch catalog", body)?;
            Ok(catalog
                .threads
                .into_iter()
                .map(|raw| raw.into_catalog_thread(target))
                .collect())
        }
        ImageBoard::FourChan => {
            let pages: Vec<FourChanCatalogPage> = from_slice("4chan catalog", body)?;
            Ok(pages
                .into_iter()
                .flat_map(|page| page.threads)
                .map(|raw| raw.into_catalog_thread(target))
                .collect())
        }
    }
}

pub fn parse_thread(
    endpoints: &Endpoints,
    target: &BoardTarget,
    body: &[u8],
) -> Result<Thread, ParseError> {
    match target.image_board {
        ImageBoard::Dvach => {
            let raw: DvachThread = from_slice("2ch thread", body)?;
            raw.into_thread(endpoints, target)
        }
        ImageBoard::FourChan => {
            let raw: FourChanThread = from_slice("4chan thread", body)?;
            raw.into_thread(endpoints, target)
        }
    }
}

fn from_slice<'a, T: Deserialize<'a>>(what: &'static str, body: &'a [u8]) -> Result<T, ParseError> {
    serde_json::from_slice(body).map_err(|source| ParseError::Json { what, source })
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

// ---- 2ch ----

#[derive(Debug, Deserialize)]
struct DvachCatalog {
    threads: Vec<DvachCatalogThread>,
}

#[derive(Debug, Deserialize)]
struct DvachCatalogThread {
    #[serde(deserialize_with = "flexible_u64")]
    num: u64,
    #[serde(deserialize_with = "flexible_i64")]
    timestamp: i64,
    #[serde(default, deserialize_with = "flexible_u64")]
    views: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    posts_count: u64,
    #[serde(deserialize_with = "flexible_i64")]
    lasthit: i64,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

impl DvachCatalogThread {
    fn into_catalog_thread(self, target: &BoardTarget) -> CatalogThread {
        CatalogThread {
            number: self.num,
            create_timestamp: self.timestamp,
            views_count: self.views,
            posts_count: self.posts_count,
            last_activity: self.lasthit,
            board: target.board.clone(),
            image_board: target.image_board,
            name: self.name.unwrap_or_default(),
            title: self.subject.unwrap_or_default(),
            comment: self.comment.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DvachThread {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "flexible_u64")]
    unique_posters: u64,
    threads: Vec<DvachPostList>,
}

#[derive(Debug, Deserialize)]
struct DvachPostList {
    #[serde(default)]
    posts: Option<Vec<DvachPost>>,
}

#[derive(Debug, Deserialize)]
struct DvachPost {
    #[serde(deserialize_with = "flexible_u64")]
    num: u64,
    #[serde(deserialize_with = "flexible_i64")]
    timestamp: i64,
    name: String,
    comment: String,
    #[serde(deserialize_with = "flexible_bool")]
    banned: bool,
    #[serde(deserialize_with = "flexible_bool")]
    op: bool,
    #[serde(default)]
    files: Option<Vec<DvachFile>>,
}

#[derive(Debug, Deserialize)]
struct DvachFile {
    path: String,
    thumbnail: String,
    name: String,
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default)]
    md5: Option<String>,
}

impl DvachThread {
    fn into_thread(self, endpoints: &Endpoints, target: &BoardTarget) -> Result<Thread, ParseError> {
        let raw_posts = self
            .threads
            .into_iter()
            .next()
            .and_then(|list| list.posts)
            .unwrap_or_default();

        let posts = raw_posts
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_post(endpoints, index))
            .collect::<Result<Vec<_>, _>>()?;
        let op = posts.first().ok_or(ParseError::EmptyThread)?;

        Ok(Thread {
            number: op.number,
            board: target.board.clone(),
            image_board: target.image_board,
            title: self.title.unwrap_or_default(),
            posters_count: self.unique_posters,
            views_count: 0,
            last_activity: 0,
            create_timestamp: op.create_timestamp,
            is_deleted: false,
            posts,
        })
    }
}

impl DvachPost {
    fn into_post(self, endpoints: &Endpoints, list_index: usize) -> Result<Post, ParseError> {
        let files = self
            .files
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_file(endpoints, index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Post {
            number: self.num,
            list_index,
            create_timestamp: self.timestamp,
            name: self.name,
            comment: self.comment,
            is_banned: self.banned,
            is_deleted: false,
            is_op: self.op,
            files,
        })
    }
}

impl DvachFile {
    fn into_file(self, endpoints: &Endpoints, list_index: usize) -> Result<File, ParseError> {
        let media = |path: &str| {
            endpoints
                .dvach_media(path)
                .map(String::from)
                .map_err(|source| ParseError::MediaUrl {
                    path: path.to_string(),
                    source,
                })
        };

        Ok(File {
            url: media(&self.path)?,
            thumbnail_url: media(&self.thumbnail)?,
            upload_name: strip_extension(self.fullname.as_deref().unwrap_or_default()).to_string(),
            cdn_name: strip_extension(&self.name).to_string(),
            check_sum: self.md5.unwrap_or_default(),
            is_deleted: false,
            list_index,
        })
    }
}

// ---- 4chan ----

#[derive(Debug, Deserialize)]
struct FourChanCatalogPage {
    #[serde(default)]
    threads: Vec<FourChanCatalogThread>,
}

#[derive(Debug, Deserialize)]
struct FourChanCatalogThread {
    no: u64,
    time: i64,
    #[serde(default)]
    replies: u64,
    last_modified: i64,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    com: Option<String>,
}

impl FourChanCatalogThread {
    fn into_catalog_thread(self, target: &BoardTarget) -> CatalogThread {
        CatalogThread {
            number: self.no,
            create_timestamp: self.time,
            views_count: 0,
            posts_count: self.replies,
            last_activity: self.last_modified,
            board: target.board.clone(),
            image_board: target.image_board,
            name: self.name.unwrap_or_default(),
            title: self.sub.unwrap_or_default(),
            comment: self.com.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FourChanThread {
    posts: Vec<FourChanPost>,
}

#[derive(Debug, Deserialize)]
struct FourChanPost {
    no: u64,
    time: i64,
    name: String,
    #[serde(default)]
    com: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    resto: Option<u64>,
    #[serde(default)]
    unique_ips: Option<u64>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    tim: Option<u64>,
    #[serde(default)]
    md5: Option<String>,
}

impl FourChanThread {
    fn into_thread(self, endpoints: &Endpoints, target: &BoardTarget) -> Result<Thread, ParseError> {
        let mut raw_posts = self.posts.into_iter();
        let op = raw_posts.next().ok_or(ParseError::EmptyThread)?;
        let title = op.sub.clone().unwrap_or_default();
        let posters_count = op.unique_ips.unwrap_or_default();

        let posts = std::iter::once(op)
            .chain(raw_posts)
            .enumerate()
            .map(|(index, raw)| raw.into_post(endpoints, &target.board, index))
            .collect::<Result<Vec<_>, _>>()?;
        let op = &posts[0];

        Ok(Thread {
            number: op.number,
            board: target.board.clone(),
            image_board: target.image_board,
            title,
            posters_count,
            views_count: 0,
            last_activity: 0,
            create_timestamp: op.create_timestamp,
            is_deleted: false,
            posts,
        })
    }
}

impl FourChanPost {
    fn into_post(self, endpoints: &Endpoints, board: &str, list_index: usize) -> Result<Post, ParseError> {
        let mut files = Vec::new();
        if let Some(upload_name) = self.filename {
            let tim = self.tim.ok_or(ParseError::IncompleteFile {
                number: self.no,
                field: "tim",
            })?;
            let ext = self.ext.ok_or(ParseError::IncompleteFile {
                number: self.no,
                field: "ext",
            })?;
            let media = |name: String| {
                endpoints
                    .fourchan_media(board, &name)
                    .map(String::from)
                    .map_err(|source| ParseError::MediaUrl { path: name, source })
            };
            files.push(File {
                url: media(format!("{tim}{ext}"))?,
                thumbnail_url: media(format!("{tim}s.jpg"))?,
                upload_name,
                cdn_name: tim.to_string(),
                check_sum: self.md5.unwrap_or_default(),
                is_deleted: false,
                list_index: 0,
            });
        }

        Ok(Post {
            number: self.no,
            list_index,
            create_timestamp: self.time,
            name: self.name,
            comment: self.com.unwrap_or_default(),
            is_banned: false,
            is_deleted: false,
            is_op: match self.resto {
                Some(resto) => resto == 0,
                None => list_index == 0,
            },
            files,
        })
    }
}

// ---- lenient scalars ----
//
// 2ch serialises some numbers as strings and some booleans as 0/1.

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Bool(bool),
    Str(String),
}

fn flexible_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(value) => Ok(value),
        Scalar::Str(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected an integer, found {text:?}"))),
        Scalar::Bool(_) => Err(de::Error::custom("expected an integer, found a boolean")),
    }
}

fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = flexible_i64(deserializer)?;
    u64::try_from(value).map_err(|_| de::Error::custom(format!("expected a non-negative integer, found {value}")))
}

fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(value) => Ok(value),
        Scalar::Int(value) => Ok(value != 0),
        Scalar::Str(text) => match text.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, found {other:?}"))),
        },
    }
}
