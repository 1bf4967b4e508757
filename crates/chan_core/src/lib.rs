//! Chan core: entity model, upstream parsing, diff engine and the pure observer state machine.
mod diff;
mod effect;
mod endpoints;
mod event;
mod model;
mod msg;
mod parse;
mod state;
mod update;

pub use diff::{
    diff_file_arrays, diff_files, diff_post_arrays, diff_posts, diff_threads, FileArraysDiff,
    FileField, FilesDiff, PostArraysDiff, PostField, PostsDiff, ThreadField, ThreadsDiff,
};
pub use effect::{Anomaly, Effect, FetchReason};
pub use endpoints::Endpoints;
pub use event::{EventKind, ObserverEvent};
pub use model::{
    BoardTarget, CatalogThread, File, ImageBoard, Post, PostNumber, Thread, ThreadKey,
    ThreadNumber, UnknownImageBoard,
};
pub use msg::{Fetched, Msg};
pub use parse::{parse_catalog, parse_thread, ParseError};
pub use state::{Lifecycle, ObserverState, ThreadEntry};
pub use update::update;
