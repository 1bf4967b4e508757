//! Chan engine: remote access, event sinks, persistence and the async observer loop.
mod fetch;
mod observer;
mod persist;
mod sink;
mod types;

pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use observer::{BoardObserver, CycleReport, ObserverConfig, ObserverHandle};
pub use persist::{
    ensure_output_dir, persist_event, AtomicFileWriter, PersistError, SnapshotStore, ThreadStore,
};
pub use sink::{ChannelEventSink, EventBus, EventSink};
pub use types::{FailureKind, FetchError};
