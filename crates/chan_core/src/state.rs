use std::collections::{BTreeMap, BTreeSet};

use crate::{BoardTarget, CatalogThread, PostNumber, Thread, ThreadNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Discovered,
    Tracked,
    Deleted,
    NotFoundBeforeFirstFetch,
}

impl Lifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Deleted | Lifecycle::NotFoundBeforeFirstFetch)
    }
}

/// What the observer knows about one thread number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadEntry {
    /// Seen in the catalog, never fetched in full.
    Discovered(CatalogThread),
    Tracked(Thread),
    Deleted(Thread),
    NotFoundBeforeFirstFetch(CatalogThread),
}

impl ThreadEntry {
    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            ThreadEntry::Discovered(_) => Lifecycle::Discovered,
            ThreadEntry::Tracked(_) => Lifecycle::Tracked,
            ThreadEntry::Deleted(_) => Lifecycle::Deleted,
            ThreadEntry::NotFoundBeforeFirstFetch(_) => Lifecycle::NotFoundBeforeFirstFetch,
        }
    }

    pub fn number(&self) -> ThreadNumber {
        match self {
            ThreadEntry::Discovered(summary) | ThreadEntry::NotFoundBeforeFirstFetch(summary) => {
                summary.number
            }
            ThreadEntry::Tracked(thread) | ThreadEntry::Deleted(thread) => thread.number,
        }
    }

    /// Full thread, once one has been fetched.
    pub fn thread(&self) -> Option<&Thread> {
        match self {
            ThreadEntry::Tracked(thread) | ThreadEntry::Deleted(thread) => Some(thread),
            ThreadEntry::Discovered(_) | ThreadEntry::NotFoundBeforeFirstFetch(_) => None,
        }
    }
}

/// A deleted post or file that upstream still shows, already reported once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Resurrection {
    Post {
        thread: ThreadNumber,
        post: PostNumber,
    },
    File {
        thread: ThreadNumber,
        post: PostNumber,
        url: String,
    },
}

/// In-memory working set of one board observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverState {
    target: BoardTarget,
    whitelist: Option<BTreeSet<ThreadNumber>>,
    pub(crate) threads: BTreeMap<ThreadNumber, ThreadEntry>,
    pub(crate) resurrections: BTreeSet<Resurrection>,
}

impl ObserverState {
    pub fn new(target: BoardTarget) -> Self {
        Self {
            target,
            whitelist: None,
            threads: BTreeMap::new(),
            resurrections: BTreeSet::new(),
        }
    }

    /// Restricts observation to the given thread numbers.
    pub fn with_whitelist(mut self, numbers: impl IntoIterator<Item = ThreadNumber>) -> Self {
        self.whitelist = Some(numbers.into_iter().collect());
        self
    }

    pub fn target(&self) -> &BoardTarget {
        &self.target
    }

    pub fn whitelist(&self) -> Option<&BTreeSet<ThreadNumber>> {
        self.whitelist.as_ref()
    }

    pub fn is_observed(&self, number: ThreadNumber) -> bool {
        self.whitelist
            .as_ref()
            .map_or(true, |whitelist| whitelist.contains(&number))
    }

    pub fn entry(&self, number: ThreadNumber) -> Option<&ThreadEntry> {
        self.threads.get(&number)
    }

    pub fn lifecycle(&self, number: ThreadNumber) -> Option<Lifecycle> {
        self.threads.get(&number).map(ThreadEntry::lifecycle)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ThreadEntry> {
        self.threads.values()
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values().filter_map(|entry| match entry {
            ThreadEntry::Tracked(thread) => Some(thread),
            _ => None,
        })
    }

    pub fn tracked_thread(&self, number: ThreadNumber) -> Option<&Thread> {
        match self.threads.get(&number) {
            Some(ThreadEntry::Tracked(thread)) => Some(thread),
            _ => None,
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked().count()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
