//! Async polling loop around the pure observer state machine.
//!
//! One `BoardObserver` owns the working set of one board. Requests are strictly
//! sequential: the catalog first, then every thread fetch the catalog pass asked
//! for, each preceded by `thread_delay`. Follow-up effects of a thread fetch run
//! before the next queued fetch, so one thread's events stay contiguous.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chan_core::{
    update, BoardTarget, Effect, Fetched, Msg, ObserverEvent, ObserverState, ThreadNumber,
};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{persist_event, EventSink, Fetcher, ThreadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverConfig {
    pub target: BoardTarget,
    /// `Some` restricts observation to these thread numbers.
    pub whitelist: Option<Vec<ThreadNumber>>,
    pub catalog_delay: Duration,
    pub thread_delay: Duration,
}

impl ObserverConfig {
    pub fn new(target: BoardTarget) -> Self {
        Self {
            target,
            whitelist: None,
            catalog_delay: Duration::from_millis(5000),
            thread_delay: Duration::from_millis(5000),
        }
    }
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub catalog_threads: usize,
    pub thread_fetches: usize,
    pub failed_fetches: usize,
    pub skipped_fetches: usize,
    pub events: usize,
    pub anomalies: usize,
    pub persist_failures: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "catalog={} fetched={} failed={} skipped={} events={} anomalies={} persist_failures={}",
            self.catalog_threads,
            self.thread_fetches,
            self.failed_fetches,
            self.skipped_fetches,
            self.events,
            self.anomalies,
            self.persist_failures
        )
    }
}

pub struct BoardObserver {
    config: ObserverConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ThreadStore>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    state: ObserverState,
}

impl BoardObserver {
    pub fn new(
        config: ObserverConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn ThreadStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let mut state = ObserverState::new(config.target.clone());
        if let Some(whitelist) = &config.whitelist {
            state = state.with_whitelist(whitelist.iter().copied());
        }
        Self {
            config,
            fetcher,
            store,
            sink,
            cancel: CancellationToken::new(),
            state,
        }
    }

    /// Shares an external token, e.g. one process-wide shutdown signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn target(&self) -> &BoardTarget {
        &self.config.target
    }

    pub fn state(&self) -> &ObserverState {
        &self.state
    }

    pub fn into_state(self) -> ObserverState {
        self.state
    }

    /// Reloads the working set from the store. Returns the number of threads tracked afterwards.
    ///
    /// Deleted threads come back as terminal entries so their numbers are never observed again.
    pub async fn restore(&mut self) -> usize {
        let target = self.config.target.clone();
        let mut threads = match self.store.select_tracked_threads(&target).await {
            Ok(threads) => threads,
            Err(err) => {
                engine_error!("{}: failed to restore tracked threads: {}", target, err);
                Vec::new()
            }
        };
        match self.store.select_deleted_threads(&target).await {
            Ok(deleted) => threads.extend(deleted),
            Err(err) => {
                engine_error!("{}: failed to restore deleted threads: {}", target, err);
            }
        }
        if !threads.is_empty() {
            let effects = self.apply(Msg::RestoreTracked(threads));
            let mut report = CycleReport::default();
            self.execute(effects, &mut report).await;
        }
        let tracked = self.state.tracked_count();
        engine_info!(
            "{}: resuming with {} tracked and {} known threads",
            target,
            tracked,
            self.state.len()
        );
        tracked
    }

    /// Polls until cancelled, then flushes the store and returns the final state.
    pub async fn run(mut self) -> ObserverState {
        engine_info!("{}: observer started", self.config.target);
        self.restore().await;
        let mut cycle = 0u64;
        while !self.cancel.is_cancelled() {
            cycle += 1;
            let report = self.run_cycle().await;
            engine_info!("{}: cycle {} done: {}", self.config.target, cycle, report);
            if !self.pause(self.config.catalog_delay).await {
                break;
            }
        }
        if let Err(err) = self.store.flush().await {
            engine_error!("{}: final flush failed: {}", self.config.target, err);
        }
        engine_info!("{}: observer stopped", self.config.target);
        self.state
    }

    /// One catalog pass and every thread pass it triggers.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let target = self.config.target.clone();

        match self.fetcher.fetch_catalog(&target).await {
            Ok(Fetched::Found(summaries)) => {
                report.catalog_threads = summaries.len();
                let effects = self.apply(Msg::CatalogFetched(summaries));
                self.execute(effects, &mut report).await;
            }
            Ok(Fetched::NotFound) => {
                engine_warn!("{}: catalog not found", target);
                report.failed_fetches += 1;
            }
            Err(err) => {
                engine_warn!("{}: catalog fetch failed: {}", target, err);
                report.failed_fetches += 1;
            }
        }

        if let Err(err) = self.store.flush().await {
            engine_error!("{}: store flush failed: {}", target, err);
            report.persist_failures += 1;
        }
        report
    }

    fn apply(&mut self, msg: Msg) -> Vec<Effect> {
        let placeholder = ObserverState::new(self.config.target.clone());
        let state = std::mem::replace(&mut self.state, placeholder);
        let (state, effects) = update(state, msg);
        self.state = state;
        effects
    }

    async fn execute(&mut self, effects: Vec<Effect>, report: &mut CycleReport) {
        let target = self.config.target.clone();
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Emit(event) => self.publish(event, report).await,
                Effect::Anomaly(anomaly) => {
                    engine_warn!("{}: anomaly: {}", target, anomaly);
                    report.anomalies += 1;
                }
                Effect::FetchThread { number, reason } => {
                    // Queued events still go out after a stop; only new requests are skipped.
                    if self.cancel.is_cancelled() || !self.pause(self.config.thread_delay).await {
                        report.skipped_fetches += 1;
                        continue;
                    }
                    engine_debug!("{}: fetching #{} ({})", target, number, reason.as_str());
                    report.thread_fetches += 1;
                    match self.fetcher.fetch_thread(&target, number).await {
                        Ok(result) => {
                            let follow_up = self.apply(Msg::ThreadFetched { number, result });
                            for effect in follow_up.into_iter().rev() {
                                queue.push_front(effect);
                            }
                        }
                        Err(err) => {
                            engine_warn!("{}: fetching #{} failed: {}", target, number, err);
                            report.failed_fetches += 1;
                        }
                    }
                }
            }
        }
    }

    /// Persists first so consumers reading the store see the transition.
    async fn publish(&self, event: ObserverEvent, report: &mut CycleReport) {
        engine_debug!("{}: {} {}", self.config.target, event.channel(), event);
        if let Err(err) = persist_event(self.store.as_ref(), &event).await {
            engine_error!(
                "{}: failed to persist {} for #{}: {}",
                self.config.target,
                event.channel(),
                event.thread_number(),
                err
            );
            report.persist_failures += 1;
        }
        report.events += 1;
        self.sink.emit(event);
    }

    /// Sleeps unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// A `BoardObserver` running on the tokio runtime.
pub struct ObserverHandle {
    target: BoardTarget,
    cancel: CancellationToken,
    task: JoinHandle<ObserverState>,
}

impl ObserverHandle {
    pub fn spawn(observer: BoardObserver) -> Self {
        let target = observer.target().clone();
        let cancel = observer.cancellation_token();
        let task = tokio::spawn(observer.run());
        Self {
            target,
            cancel,
            task,
        }
    }

    pub fn target(&self) -> &BoardTarget {
        &self.target
    }

    /// Requests a cooperative stop. An in-flight request is allowed to finish.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<ObserverState, tokio::task::JoinError> {
        self.task.await
    }
}
