use std::fmt;

use crate::{Lifecycle, ObserverEvent, PostNumber, ThreadKey, ThreadNumber};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Announce a transition; the runtime persists it and then publishes it.
    Emit(ObserverEvent),
    /// Fetch one thread in full and feed the result back as `Msg::ThreadFetched`.
    FetchThread {
        number: ThreadNumber,
        reason: FetchReason,
    },
    /// Invariant violation observed upstream. State was left as it was.
    Anomaly(Anomaly),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// First sighting in the catalog, or a previous first fetch failed.
    Discovered,
    /// The catalog reported a new `lastActivity`.
    Activity,
    /// Tracked thread absent from the catalog; confirm before deleting.
    MissingFromCatalog,
}

impl FetchReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchReason::Discovered => "discovered",
            FetchReason::Activity => "activity",
            FetchReason::MissingFromCatalog => "missing-from-catalog",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    PostResurrected {
        thread: ThreadKey,
        post: PostNumber,
    },
    FileResurrected {
        thread: ThreadKey,
        post: PostNumber,
        url: String,
    },
    /// A fetch result arrived for a thread that is unknown or already terminal.
    UnexpectedFetch {
        number: ThreadNumber,
        lifecycle: Option<Lifecycle>,
    },
    NumberMismatch {
        requested: ThreadNumber,
        returned: ThreadNumber,
    },
    /// Restored thread belongs to another board.
    ForeignThread { thread: ThreadKey },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::PostResurrected { thread, post } => {
                write!(f, "deleted post #{post} in {thread} reappeared upstream")
            }
            Anomaly::FileResurrected { thread, post, url } => write!(
                f,
                "deleted file {url} on post #{post} in {thread} reappeared upstream"
            ),
            Anomaly::UnexpectedFetch {
                number,
                lifecycle: Some(lifecycle),
            } => write!(f, "fetch result for thread #{number} in state {lifecycle:?} ignored"),
            Anomaly::UnexpectedFetch {
                number,
                lifecycle: None,
            } => write!(f, "fetch result for unknown thread #{number} ignored"),
            Anomaly::NumberMismatch {
                requested,
                returned,
            } => write!(f, "requested thread #{requested} but upstream returned #{returned}"),
            Anomaly::ForeignThread { thread } => {
                write!(f, "restored thread {thread} belongs to another board")
            }
        }
    }
}
