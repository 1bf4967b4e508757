use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chan_core::{
    BoardTarget, File, FileField, ObserverEvent, Post, PostField, PostNumber, Thread, ThreadField,
    ThreadKey, ThreadNumber,
};
use engine_logging::{engine_debug, engine_info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize snapshot: {0}")]
    Serialize(String),
    #[error("corrupt snapshot {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("no stored row for {0}")]
    MissingRow(String),
    #[error("stored row for {0} is deleted and stays deleted")]
    DeletedRow(String),
}

/// Persistence collaborator, addressed row by row.
///
/// Rows are flat: `insert_thread` ignores `posts` and `insert_post` ignores
/// `files`; children arrive through their own inserts.
#[async_trait::async_trait]
pub trait ThreadStore: Send + Sync {
    /// Non-deleted threads of `target`, with their posts and files.
    async fn select_tracked_threads(&self, target: &BoardTarget) -> Result<Vec<Thread>, PersistError>;
    /// Threads of `target` already marked deleted.
    async fn select_deleted_threads(&self, target: &BoardTarget) -> Result<Vec<Thread>, PersistError>;
    /// Fails with `DeletedRow` when the stored row is already deleted.
    async fn insert_thread(&self, thread: &Thread) -> Result<(), PersistError>;
    async fn insert_post(&self, thread: &ThreadKey, post: &Post) -> Result<(), PersistError>;
    async fn insert_file(
        &self,
        thread: &ThreadKey,
        post: PostNumber,
        file: &File,
    ) -> Result<(), PersistError>;
    /// Copies `fields` from `thread` into the stored row.
    async fn update_thread(&self, thread: &Thread, fields: &[ThreadField]) -> Result<(), PersistError>;
    async fn update_post(
        &self,
        thread: &ThreadKey,
        post: &Post,
        fields: &[PostField],
    ) -> Result<(), PersistError>;
    async fn update_file(
        &self,
        thread: &ThreadKey,
        post: PostNumber,
        file: &File,
        fields: &[FileField],
    ) -> Result<(), PersistError>;
    /// Makes everything written so far durable.
    async fn flush(&self) -> Result<(), PersistError>;
}

/// Mirrors one event into the store.
pub async fn persist_event(store: &dyn ThreadStore, event: &ObserverEvent) -> Result<(), PersistError> {
    match event {
        ObserverEvent::ThreadCreate { thread } => {
            let key = thread.key();
            store.insert_thread(thread).await?;
            for post in &thread.posts {
                store.insert_post(&key, post).await?;
                for file in &post.files {
                    store.insert_file(&key, post.number, file).await?;
                }
            }
            Ok(())
        }
        ObserverEvent::ThreadDelete { thread } => {
            store.update_thread(thread, &[ThreadField::IsDeleted]).await
        }
        ObserverEvent::ThreadModify { thread, diff } => {
            let fields = diff.scalar_fields();
            if fields.is_empty() {
                return Ok(());
            }
            store.update_thread(thread, &fields).await
        }
        ObserverEvent::ThreadNotFound { .. } => Ok(()),
        ObserverEvent::PostCreate { thread, post } => {
            store.insert_post(thread, post).await?;
            for file in &post.files {
                store.insert_file(thread, post.number, file).await?;
            }
            Ok(())
        }
        ObserverEvent::PostDelete { thread, post } => {
            store.update_post(thread, post, &[PostField::IsDeleted]).await
        }
        ObserverEvent::PostModify { thread, post, diff } => {
            let fields: Vec<PostField> = diff
                .fields
                .iter()
                .copied()
                .filter(|field| *field != PostField::Files)
                .collect();
            if fields.is_empty() {
                return Ok(());
            }
            store.update_post(thread, post, &fields).await
        }
        ObserverEvent::FileCreate { thread, post, file } => {
            store.insert_file(thread, *post, file).await
        }
        ObserverEvent::FileDelete { thread, post, file } => {
            store
                .update_file(thread, *post, file, &[FileField::IsDeleted])
                .await
        }
        ObserverEvent::FileModify {
            thread,
            post,
            file,
            diff,
        } => store.update_file(thread, *post, file, &diff.fields).await,
    }
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BoardSnapshot {
    threads: BTreeMap<ThreadNumber, Thread>,
    #[serde(skip)]
    dirty: bool,
}

impl BoardSnapshot {
    fn thread_mut(&mut self, key: &ThreadKey) -> Result<&mut Thread, PersistError> {
        self.threads
            .get_mut(&key.number)
            .ok_or_else(|| PersistError::MissingRow(format!("thread {key}")))
    }

    fn post_mut(&mut self, key: &ThreadKey, number: PostNumber) -> Result<&mut Post, PersistError> {
        self.thread_mut(key)?
            .post_mut(number)
            .ok_or_else(|| PersistError::MissingRow(format!("post #{number} in {key}")))
    }
}

/// File-backed store: one RON snapshot per board, rewritten atomically on `flush`.
pub struct SnapshotStore {
    writer: AtomicFileWriter,
    boards: Mutex<BTreeMap<BoardTarget, BoardSnapshot>>,
}

impl SnapshotStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        ensure_output_dir(&dir)?;
        Ok(Self {
            writer: AtomicFileWriter::new(dir),
            boards: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn snapshot_path(&self, target: &BoardTarget) -> PathBuf {
        self.writer.dir().join(snapshot_filename(target))
    }

    fn with_board<R>(
        &self,
        target: BoardTarget,
        f: impl FnOnce(&mut BoardSnapshot) -> Result<R, PersistError>,
    ) -> Result<R, PersistError> {
        let mut boards = self.boards.lock().unwrap_or_else(PoisonError::into_inner);
        if !boards.contains_key(&target) {
            let loaded = self.load(&target)?;
            boards.insert(target.clone(), loaded);
        }
        match boards.get_mut(&target) {
            Some(board) => f(board),
            None => Err(PersistError::MissingRow(format!("board {target}"))),
        }
    }

    fn load(&self, target: &BoardTarget) -> Result<BoardSnapshot, PersistError> {
        let path = self.snapshot_path(target);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(BoardSnapshot::default());
            }
            Err(err) => return Err(PersistError::Io(err)),
        };
        let snapshot: BoardSnapshot = ron::from_str(&content).map_err(|err| PersistError::Corrupt {
            path: path.clone(),
            message: err.to_string(),
        })?;
        engine_info!(
            "Loaded {} stored threads for {} from {:?}",
            snapshot.threads.len(),
            target,
            path
        );
        Ok(snapshot)
    }
}

fn snapshot_filename(target: &BoardTarget) -> String {
    let board: String = target
        .board
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}.ron", target.image_board, board)
}

fn target_of(key: &ThreadKey) -> BoardTarget {
    BoardTarget::new(key.image_board, key.board.clone())
}

#[async_trait::async_trait]
impl ThreadStore for SnapshotStore {
    async fn select_tracked_threads(&self, target: &BoardTarget) -> Result<Vec<Thread>, PersistError> {
        self.with_board(target.clone(), |board| {
            Ok(board
                .threads
                .values()
                .filter(|thread| !thread.is_deleted)
                .cloned()
                .collect())
        })
    }

    async fn select_deleted_threads(&self, target: &BoardTarget) -> Result<Vec<Thread>, PersistError> {
        self.with_board(target.clone(), |board| {
            Ok(board
                .threads
                .values()
                .filter(|thread| thread.is_deleted)
                .cloned()
                .collect())
        })
    }

    async fn insert_thread(&self, thread: &Thread) -> Result<(), PersistError> {
        self.with_board(thread.target(), |board| {
            if board.threads.get(&thread.number).is_some_and(|row| row.is_deleted) {
                return Err(PersistError::DeletedRow(format!("thread {}", thread.key())));
            }
            let posts = board
                .threads
                .remove(&thread.number)
                .map(|existing| existing.posts)
                .unwrap_or_default();
            let mut row = thread.clone();
            row.posts = posts;
            board.threads.insert(row.number, row);
            board.dirty = true;
            Ok(())
        })
    }

    async fn insert_post(&self, thread: &ThreadKey, post: &Post) -> Result<(), PersistError> {
        self.with_board(target_of(thread), |board| {
            let row = board.thread_mut(thread)?;
            match row.post_mut(post.number) {
                Some(existing) => {
                    let files = std::mem::take(&mut existing.files);
                    *existing = Post {
                        files,
                        ..post.clone()
                    };
                }
                None => row.posts.push(Post {
                    files: Vec::new(),
                    ..post.clone()
                }),
            }
            board.dirty = true;
            Ok(())
        })
    }

    async fn insert_file(
        &self,
        thread: &ThreadKey,
        post: PostNumber,
        file: &File,
    ) -> Result<(), PersistError> {
        self.with_board(target_of(thread), |board| {
            let row = board.post_mut(thread, post)?;
            match row.file_mut(&file.url) {
                Some(existing) => *existing = file.clone(),
                None => row.files.push(file.clone()),
            }
            board.dirty = true;
            Ok(())
        })
    }

    async fn update_thread(&self, thread: &Thread, fields: &[ThreadField]) -> Result<(), PersistError> {
        self.with_board(thread.target(), |board| {
            let row = board.thread_mut(&thread.key())?;
            for field in fields {
                field.apply(row, thread);
                if *field == ThreadField::IsDeleted {
                    row.is_deleted = thread.is_deleted;
                }
            }
            board.dirty = true;
            Ok(())
        })
    }

    async fn update_post(
        &self,
        thread: &ThreadKey,
        post: &Post,
        fields: &[PostField],
    ) -> Result<(), PersistError> {
        self.with_board(target_of(thread), |board| {
            let row = board.post_mut(thread, post.number)?;
            for field in fields {
                field.apply(row, post);
                if *field == PostField::IsDeleted {
                    row.is_deleted = post.is_deleted;
                }
            }
            board.dirty = true;
            Ok(())
        })
    }

    async fn update_file(
        &self,
        thread: &ThreadKey,
        post: PostNumber,
        file: &File,
        fields: &[FileField],
    ) -> Result<(), PersistError> {
        self.with_board(target_of(thread), |board| {
            let row = board
                .post_mut(thread, post)?
                .file_mut(&file.url)
                .ok_or_else(|| {
                    PersistError::MissingRow(format!("file {} on post #{post} in {thread}", file.url))
                })?;
            for field in fields {
                field.apply(row, file);
                if *field == FileField::IsDeleted {
                    row.is_deleted = file.is_deleted;
                }
            }
            board.dirty = true;
            Ok(())
        })
    }

    async fn flush(&self) -> Result<(), PersistError> {
        let mut boards = self.boards.lock().unwrap_or_else(PoisonError::into_inner);
        for (target, board) in boards.iter_mut().filter(|(_, board)| board.dirty) {
            let pretty = ron::ser::PrettyConfig::new();
            let content = ron::ser::to_string_pretty(&*board, pretty)
                .map_err(|err| PersistError::Serialize(err.to_string()))?;
            let path = self.writer.write(&snapshot_filename(target), &content)?;
            board.dirty = false;
            engine_debug!("Wrote {} threads for {} to {:?}", board.threads.len(), target, path);
        }
        Ok(())
    }
}
