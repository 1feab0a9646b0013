//! Wires the collaborator feed to the lifecycle handler and event router.
//!
//! The feed is read on the async runtime and fanned out over bounded
//! channels: one for lifecycle notifications and one per event source.
//! Each channel is drained by its own blocking thread, so the four
//! producers and the lifecycle consumer run in parallel against the
//! shared sink table, as the real tracer callbacks would.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use podtrace_common::config::AgentConfig;
use podtrace_common::constants::FEED_CHANNEL_CAPACITY;
use podtrace_core::{EventRouter, LifecycleHandler, RouterStats, SinkTable};
use podtrace_events::container::ContainerNotification;
use podtrace_events::feed::{self, Dispatch};
use podtrace_events::snapshot::{RecordedSnapshots, SyscallSnapshotSource};
use podtrace_events::{EventSource, KernelEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Counters for the feed itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Records dispatched.
    pub records: u64,
    /// Lines that failed to parse.
    pub malformed: u64,
    /// Records of unknown kind.
    pub ignored: u64,
}

/// What a finished run did.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    /// Feed counters.
    pub feed: FeedStats,
    /// Routing counters.
    pub router: RouterStats,
    /// Sinks still open at shutdown and closed by it.
    pub closed_sinks: usize,
}

/// The assembled agent core.
pub struct Agent {
    table: Arc<SinkTable>,
    router: Arc<EventRouter>,
    lifecycle: Arc<LifecycleHandler>,
    snapshots: Arc<RecordedSnapshots>,
}

impl Agent {
    /// Builds the core from a validated configuration.
    pub fn new(config: &AgentConfig) -> Self {
        let table = Arc::new(SinkTable::new());
        let snapshots = Arc::new(RecordedSnapshots::new());
        let source: Arc<dyn SyscallSnapshotSource> = Arc::clone(&snapshots) as _;

        let mut lifecycle = LifecycleHandler::new(Arc::clone(&table), &config.log_dir)
            .with_selector(config.selector())
            .with_snapshots(source);
        if let Some(node) = config.node_name.as_deref() {
            lifecycle = lifecycle.with_node_name(node);
        }

        Self {
            router: Arc::new(EventRouter::with_miss_log_interval(
                Arc::clone(&table),
                config.miss_log_interval,
            )),
            table,
            lifecycle: Arc::new(lifecycle),
            snapshots,
        }
    }

    /// Lifecycle handler fed by this agent.
    #[cfg(test)]
    pub fn lifecycle(&self) -> &LifecycleHandler {
        &self.lifecycle
    }

    /// Consumes `feed` until it ends or `shutdown` resolves, then closes
    /// every sink still open.
    ///
    /// Records already queued when the feed stops are still processed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the feed fails. Sinks are closed first.
    pub async fn run<R, S>(&self, feed: R, shutdown: S) -> anyhow::Result<Summary>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        let (dispatcher, consumers) = self.spawn_consumers();

        let mut stats = FeedStats::default();
        let ingested = tokio::select! {
            result = ingest(feed, dispatcher, &self.snapshots, &mut stats) => result,
            () = shutdown => Ok(()),
        };

        for consumer in consumers {
            if let Err(e) = consumer.await {
                tracing::warn!(error = %e, "consumer task failed");
            }
        }
        let closed_sinks = self.table.finalize_all();

        ingested?;
        Ok(Summary {
            feed: stats,
            router: self.router.stats(),
            closed_sinks,
        })
    }

    fn spawn_consumers(&self) -> (Dispatcher, Vec<JoinHandle<()>>) {
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let lifecycle = Arc::clone(&self.lifecycle);
        let mut consumers = vec![spawn_consumer(
            lifecycle_rx,
            move |notification: ContainerNotification| {
                let _ = lifecycle.handle(&notification);
            },
        )];

        let mut senders = Vec::with_capacity(EventSource::ALL.len());
        for source in EventSource::ALL {
            let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
            let router = Arc::clone(&self.router);
            consumers.push(spawn_consumer(rx, move |event: KernelEvent| {
                let _ = router.route(&event);
            }));
            senders.push((source, tx));
        }

        let dispatcher = Dispatcher {
            lifecycle: lifecycle_tx,
            events: senders,
        };
        (dispatcher, consumers)
    }
}

fn spawn_consumer<T, F>(mut rx: mpsc::Receiver<T>, mut handle: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        while let Some(item) = rx.blocking_recv() {
            handle(item);
        }
    })
}

struct Dispatcher {
    lifecycle: mpsc::Sender<ContainerNotification>,
    events: Vec<(EventSource, mpsc::Sender<KernelEvent>)>,
}

impl Dispatcher {
    async fn send_event(&self, event: KernelEvent) -> anyhow::Result<()> {
        let source = event.source();
        let tx = self
            .events
            .iter()
            .find_map(|(s, tx)| (*s == source).then_some(tx))
            .with_context(|| format!("no producer for {}", source.tracer_name()))?;
        tx.send(event)
            .await
            .map_err(|_| anyhow::anyhow!("{} producer stopped", source.tracer_name()))
    }

    async fn send_notification(&self, notification: ContainerNotification) -> anyhow::Result<()> {
        self.lifecycle
            .send(notification)
            .await
            .map_err(|_| anyhow::anyhow!("lifecycle consumer stopped"))
    }
}

async fn ingest<R>(
    feed: R,
    dispatcher: Dispatcher,
    snapshots: &RecordedSnapshots,
    stats: &mut FeedStats,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = feed.lines();
    while let Some(line) = lines.next_line().await.context("failed to read feed")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = match feed::parse_record(line) {
            Ok(record) => record,
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(error = %e, "skipping malformed feed record");
                continue;
            }
        };
        match record.into_dispatch() {
            Dispatch::Lifecycle(notification) => dispatcher.send_notification(notification).await?,
            Dispatch::Event(event) => dispatcher.send_event(event).await?,
            Dispatch::History { mntns, syscalls } => snapshots.record(mntns, syscalls),
            Dispatch::Ignore => {
                stats.ignored += 1;
                tracing::debug!("ignoring feed record of unknown kind");
                continue;
            }
        }
        stats.records += 1;
    }
    tracing::info!("feed closed");
    Ok(())
}
