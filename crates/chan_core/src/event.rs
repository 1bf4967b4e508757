use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    CatalogThread, File, FilesDiff, Post, PostNumber, PostsDiff, Thread, ThreadKey, ThreadNumber,
    ThreadsDiff,
};

/// Lifecycle transition announced by the observer.
///
/// Post and file events identify their parents by key so that consumers never
/// hold a second copy of the whole thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum ObserverEvent {
    ThreadCreate {
        thread: Thread,
    },
    ThreadDelete {
        thread: Thread,
    },
    ThreadModify {
        thread: Thread,
        diff: ThreadsDiff,
    },
    /// A catalog entry vanished before its first full fetch.
    ThreadNotFound {
        summary: CatalogThread,
    },
    PostCreate {
        thread: ThreadKey,
        post: Post,
    },
    PostDelete {
        thread: ThreadKey,
        post: Post,
    },
    PostModify {
        thread: ThreadKey,
        post: Post,
        diff: PostsDiff,
    },
    FileCreate {
        thread: ThreadKey,
        post: PostNumber,
        file: File,
    },
    FileDelete {
        thread: ThreadKey,
        post: PostNumber,
        file: File,
    },
    FileModify {
        thread: ThreadKey,
        post: PostNumber,
        file: File,
        diff: FilesDiff,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ThreadCreate,
    ThreadDelete,
    ThreadModify,
    ThreadNotFound,
    PostCreate,
    PostDelete,
    PostModify,
    FileCreate,
    FileDelete,
    FileModify,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ThreadCreate,
        EventKind::ThreadDelete,
        EventKind::ThreadModify,
        EventKind::ThreadNotFound,
        EventKind::PostCreate,
        EventKind::PostDelete,
        EventKind::PostModify,
        EventKind::FileCreate,
        EventKind::FileDelete,
        EventKind::FileModify,
    ];

    /// Channel name consumers subscribe to.
    pub fn channel(self) -> &'static str {
        match self {
            EventKind::ThreadCreate => "thread-create",
            EventKind::ThreadDelete => "thread-delete",
            EventKind::ThreadModify => "thread-modify",
            EventKind::ThreadNotFound => "thread-not-found",
            EventKind::PostCreate => "post-create",
            EventKind::PostDelete => "post-delete",
            EventKind::PostModify => "post-modify",
            EventKind::FileCreate => "file-create",
            EventKind::FileDelete => "file-delete",
            EventKind::FileModify => "file-modify",
        }
    }

    pub fn is_thread_level(self) -> bool {
        matches!(
            self,
            EventKind::ThreadCreate
                | EventKind::ThreadDelete
                | EventKind::ThreadModify
                | EventKind::ThreadNotFound
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel())
    }
}

impl ObserverEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ObserverEvent::ThreadCreate { .. } => EventKind::ThreadCreate,
            ObserverEvent::ThreadDelete { .. } => EventKind::ThreadDelete,
            ObserverEvent::ThreadModify { .. } => EventKind::ThreadModify,
            ObserverEvent::ThreadNotFound { .. } => EventKind::ThreadNotFound,
            ObserverEvent::PostCreate { .. } => EventKind::PostCreate,
            ObserverEvent::PostDelete { .. } => EventKind::PostDelete,
            ObserverEvent::PostModify { .. } => EventKind::PostModify,
            ObserverEvent::FileCreate { .. } => EventKind::FileCreate,
            ObserverEvent::FileDelete { .. } => EventKind::FileDelete,
            ObserverEvent::FileModify { .. } => EventKind::FileModify,
        }
    }

    pub fn channel(&self) -> &'static str {
        self.kind().channel()
    }

    pub fn thread_number(&self) -> ThreadNumber {
        match self {
            ObserverEvent::ThreadCreate { thread }
            | ObserverEvent::ThreadDelete { thread }
            | ObserverEvent::ThreadModify { thread, .. } => thread.number,
            ObserverEvent::ThreadNotFound { summary } => summary.number,
            ObserverEvent::PostCreate { thread, .. }
            | ObserverEvent::PostDelete { thread, .. }
            | ObserverEvent::PostModify { thread, .. }
            | ObserverEvent::FileCreate { thread, .. }
            | ObserverEvent::FileDelete { thread, .. }
            | ObserverEvent::FileModify { thread, .. } => thread.number,
        }
    }
}

impl fmt::Display for ObserverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverEvent::ThreadCreate { thread } => write!(
                f,
                "New thread {} created with {} posts and {} files",
                thread.key(),
                thread.posts.len(),
                thread.files_count()
            ),
            ObserverEvent::ThreadDelete { thread } => {
                write!(f, "Thread {} deleted", thread.key())
            }
            ObserverEvent::ThreadModify { thread, diff } => {
                write!(f, "Thread {} modified:", thread.key())?;
                for field in &diff.fields {
                    write!(f, " {field}")?;
                }
                Ok(())
            }
            ObserverEvent::ThreadNotFound { summary } => write!(
                f,
                "Thread {}/{}/#{} not found before first fetch",
                summary.image_board, summary.board, summary.number
            ),
            ObserverEvent::PostCreate { thread, post } => write!(
                f,
                "New post #{} in {} with {} files",
                post.number,
                thread,
                post.files.len()
            ),
            ObserverEvent::PostDelete { thread, post } => {
                write!(f, "Post #{} in {} deleted", post.number, thread)
            }
            ObserverEvent::PostModify { thread, post, diff } => {
                write!(f, "Post #{} in {} modified:", post.number, thread)?;
                for field in &diff.fields {
                    write!(f, " {field}")?;
                }
                Ok(())
            }
            ObserverEvent::FileCreate { thread, post, file } => {
                write!(f, "New file {} on post #{} in {}", file.url, post, thread)
            }
            ObserverEvent::FileDelete { thread, post, file } => {
                write!(f, "File {} on post #{} in {} deleted", file.url, post, thread)
            }
            ObserverEvent::FileModify {
                thread,
                post,
                file,
                diff,
            } => {
                write!(f, "File {} on post #{} in {} modified:", file.url, post, thread)?;
                for field in &diff.fields {
                    write!(f, " {field}")?;
                }
                Ok(())
            }
        }
    }
}
