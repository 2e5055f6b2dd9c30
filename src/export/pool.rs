//! Fixed worker pool fed through a handoff channel
//!
//! The dispatcher offers tracks one at a time into a capacity-1 channel and
//! the workers race to take them, so the producer never runs ahead of the
//! pool. Tracks are offered in fetch order; completion order across workers
//! is unspecified. One top-level cancellation token fans out to a child
//! token per worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::export::invoke::{Invoke, InvokeError, Outcome};
use crate::openwhyd::Track;

/// Number of concurrent downloader invocations
pub const DEFAULT_POOL_SIZE: usize = 5;

/// What the run did, summed across workers
#[derive(Debug, Default, Clone, Copy)]
pub struct ExportStats {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Pool of workers that each loop on "take next track or stop"
pub struct WorkerPool {
    tx: mpsc::Sender<Track>,
    workers: JoinSet<ExportStats>,
    cancel: CancellationToken,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing one handoff channel
    pub fn start(invoker: Arc<dyn Invoke>, size: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Track>(1);
        let rx = Arc::new(Mutex::new(rx));
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for id in 0..size {
            workers.spawn(worker_loop(
                id,
                invoker.clone(),
                rx.clone(),
                cancel.child_token(),
                in_flight.clone(),
            ));
        }

        Self {
            tx,
            workers,
            cancel,
            in_flight,
        }
    }

    /// Token that stops every worker and kills in-flight subprocesses
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Offer tracks to the pool in order, skipping unnamed ones, then wait
    /// until every in-flight invocation has finished.
    pub async fn run(self, tracks: Vec<Track>) -> ExportStats {
        for track in tracks {
            if track.name.is_empty() {
                continue;
            }
            if self.tx.send(track).await.is_err() {
                // Every worker is gone, which only happens on cancellation
                break;
            }
        }
        self.shutdown().await
    }

    /// Close the channel and block until all workers have drained
    async fn shutdown(self) -> ExportStats {
        let Self {
            tx,
            mut workers,
            in_flight,
            ..
        } = self;
        drop(tx);

        let mut totals = ExportStats::default();
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(stats) => {
                    totals.downloaded += stats.downloaded;
                    totals.skipped += stats.skipped;
                    totals.failed += stats.failed;
                }
                Err(e) => error!("Worker panicked: {}", e),
            }
        }

        debug_assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        totals
    }
}

async fn worker_loop(
    id: usize,
    invoker: Arc<dyn Invoke>,
    rx: Arc<Mutex<mpsc::Receiver<Track>>>,
    cancel: CancellationToken,
    in_flight: Arc<AtomicUsize>,
) -> ExportStats {
    let mut stats = ExportStats::default();

    loop {
        let track = tokio::select! {
            track = async { rx.lock().await.recv().await } => match track {
                Some(track) => track,
                // Dispatcher is done and the channel has drained
                None => break,
            },
            _ = cancel.cancelled() => {
                debug!("Worker {} stopping on cancellation", id);
                break;
            }
        };

        in_flight.fetch_add(1, Ordering::SeqCst);
        let result = invoker.invoke(&track, &cancel).await;
        in_flight.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(Outcome::Downloaded) => stats.downloaded += 1,
            Ok(Outcome::UnsupportedSource | Outcome::AlreadyDownloaded) => stats.skipped += 1,
            Err(e) if e.is_fatal() => {
                // Same containment as a failed fetch: without a readable
                // ledger the run cannot continue
                error!("{}", e);
                std::process::exit(1);
            }
            Err(InvokeError::Cancelled) => {
                stats.failed += 1;
                break;
            }
            Err(e) => {
                warn!("Download failed for {}: {}", track.name, e);
                stats.failed += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    /// Records every invocation and its concurrency, never touches the
    /// filesystem.
    struct RecordingInvoker {
        delay: Duration,
        current: AtomicUsize,
        peak: AtomicUsize,
        invoked: StdMutex<Vec<String>>,
    }

    impl RecordingInvoker {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                invoked: StdMutex::new(Vec::new()),
            }
        }

        fn invoked_names(&self) -> Vec<String> {
            self.invoked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Invoke for RecordingInvoker {
        async fn invoke(
            &self,
            track: &Track,
            _cancel: &CancellationToken,
        ) -> Result<Outcome, InvokeError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.invoked.lock().unwrap().push(track.name.clone());

            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Outcome::Downloaded)
        }
    }

    fn tracks(names: &[&str]) -> Vec<Track> {
        names
            .iter()
            .map(|name| Track {
                external_id: format!("src/yt/{name}"),
                name: name.to_string(),
                playlist: None,
                owner: "alice".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unnamed_tracks_never_dispatched() {
        let invoker = Arc::new(RecordingInvoker::new(Duration::ZERO));
        let pool = WorkerPool::start(invoker.clone(), 2);

        let mut input = tracks(&["one", "two"]);
        input.insert(1, Track {
            external_id: "src/yt/ghost".to_string(),
            name: String::new(),
            playlist: None,
            owner: "alice".to_string(),
        });

        let stats = pool.run(input).await;
        assert_eq!(stats.downloaded, 2);

        let mut names = invoker.invoked_names();
        names.sort();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_pool_size_bounds_concurrency() {
        let invoker = Arc::new(RecordingInvoker::new(Duration::from_millis(20)));
        let pool = WorkerPool::start(invoker.clone(), 5);

        let stats = pool
            .run(tracks(&["t1", "t2", "t3", "t4", "t5", "t6", "t7"]))
            .await;

        assert_eq!(stats.downloaded, 7);
        assert_eq!(invoker.invoked_names().len(), 7);
        assert!(invoker.peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_run_waits_for_in_flight_invocations() {
        let invoker = Arc::new(RecordingInvoker::new(Duration::from_millis(50)));
        let pool = WorkerPool::start(invoker.clone(), 3);

        let stats = pool.run(tracks(&["slow1", "slow2", "slow3"])).await;

        // run() must not return until every slow invocation has finished
        assert_eq!(stats.downloaded, 3);
        assert_eq!(invoker.invoked_names().len(), 3);
        assert_eq!(invoker.current.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_workers_without_draining() {
        let invoker = Arc::new(RecordingInvoker::new(Duration::from_secs(5)));
        let pool = WorkerPool::start(invoker.clone(), 2);
        pool.cancel_token().cancel();

        // Give the workers a moment to observe the token
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = pool.run(tracks(&["a", "b", "c", "d"])).await;
        assert_eq!(stats.downloaded, 0);
        assert!(invoker.invoked_names().is_empty());
    }

    struct FailingInvoker;

    #[async_trait]
    impl Invoke for FailingInvoker {
        async fn invoke(
            &self,
            _track: &Track,
            _cancel: &CancellationToken,
        ) -> Result<Outcome, InvokeError> {
            Err(InvokeError::Spawn(std::io::Error::other("boom")))
        }
    }

    #[tokio::test]
    async fn test_worker_survives_invocation_failures() {
        let pool = WorkerPool::start(Arc::new(FailingInvoker), 2);
        let stats = pool.run(tracks(&["a", "b", "c"])).await;

        assert_eq!(stats.failed, 3);
        assert_eq!(stats.downloaded, 0);
    }
}
