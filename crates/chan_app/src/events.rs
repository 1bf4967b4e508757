use std::sync::mpsc;
use std::thread;

use chan_core::ObserverEvent;
use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info};

/// Drains `rx` on a dedicated thread, logging one line per event.
///
/// The thread ends once every sender is dropped and returns the number of events seen.
pub fn spawn_event_log(rx: mpsc::Receiver<ObserverEvent>) -> thread::JoinHandle<u64> {
    thread::spawn(move || {
        let mut seen = 0u64;
        for event in rx {
            seen += 1;
            engine_info!("{}", describe(&event));
            engine_debug!("{} payload: {:?}", event.channel(), event);
        }
        seen
    })
}

pub fn describe(event: &ObserverEvent) -> String {
    match event {
        ObserverEvent::ThreadCreate { thread } => {
            format!("{} (opened {})", event, format_timestamp(thread.create_timestamp))
        }
        ObserverEvent::ThreadNotFound { summary } => format!(
            "{} (opened {}, {} posts)",
            event,
            format_timestamp(summary.create_timestamp),
            summary.posts_count
        ),
        _ => event.to_string(),
    }
}

fn format_timestamp(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("@{secs}"),
    }
}
