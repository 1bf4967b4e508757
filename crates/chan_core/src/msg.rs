use crate::{CatalogThread, Thread, ThreadNumber};

/// Outcome of a remote read that reached the upstream. Errors travel separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    Found(T),
    /// Upstream answered 404.
    NotFound,
}

impl<T> Fetched<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Fetched::Found(value) => Some(value),
            Fetched::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Fetched::Found(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Threads reloaded from the store at startup.
    RestoreTracked(Vec<Thread>),
    /// A catalog listing arrived.
    CatalogFetched(Vec<CatalogThread>),
    /// A single-thread fetch finished with a definite answer.
    ThreadFetched {
        number: ThreadNumber,
        result: Fetched<Thread>,
    },
}
