//! Change Notifier
//!
//! Watches one document and turns bursts of raw filesystem events into
//! payload-less "re-render now" signals.
//!
//! Architecture:
//! ```text
//! notify callback --raw events--> NotifierTask (Debouncer) --signal, cap 1--> SignalSource
//! ```
//!
//! The subscription is placed on the document's directory, so editors that
//! save by delete-and-recreate or rename-over keep being observed. Removal
//! of the directory itself re-establishes the subscription; if that fails the
//! notifier ends with an error and closes its signal source.
//!
//! Lifecycle: the notifier runs until its `CancellationToken` is cancelled
//! (clean), the consumer drops the `SignalSource` (clean), or the OS watch
//! fails (error). The OS watch handle is owned by the task and released on
//! every one of these paths.

mod debouncer;


use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::WatchTarget;
use debouncer::Debouncer;

pub use debouncer::DEFAULT_DEBOUNCE;

/// Errors that end a notifier
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("failed to initialize file watcher")]
    Init(#[source] notify::Error),

    #[error("failed to watch `{path}`")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to re-watch `{path}` after removal")]
    Resubscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("file watcher error")]
    Watch(#[source] notify::Error),

    #[error("file event stream closed")]
    StreamClosed,

    #[error("notifier task panicked")]
    Panicked,
}

/// Receiving end of a notifier.
///
/// `recv` yields one `()` per coalesced signal and `None` once the notifier
/// stopped. `finish` tells a clean stop apart from a failure.
pub struct SignalSource {
    rx: mpsc::Receiver<()>,
    task: Option<JoinHandle<Result<(), NotifierError>>>,
}

impl SignalSource {
    /// Wait for the next coalesced signal.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Wait for the notifier task to end and report how it ended.
    ///
    /// Safe to call more than once; later calls return `Ok(())`.
    pub async fn finish(&mut self) -> Result<(), NotifierError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(_) => Err(NotifierError::Panicked),
        }
    }
}

/// Subscribe to changes of `target` and start the notifier task.
///
/// A priming signal is queued before this returns, so the consumer renders
/// once without waiting for an edit. Must be called inside a tokio runtime.
pub fn open(
    target: &WatchTarget,
    cancel: CancellationToken,
    debounce: Duration,
) -> Result<SignalSource, NotifierError> {
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let subscription = Subscription::establish(target.dir(), raw_tx)?;

    let (signal_tx, signal_rx) = mpsc::channel(1);
    let _ = signal_tx.try_send(());

    crate::debug!("watch"; "watching {}", target);

    let task = NotifierTask {
        target: target.clone(),
        subscription,
        raw_rx,
        signal_tx,
        debouncer: Debouncer::new(debounce),
        cancel,
    };

    Ok(SignalSource {
        rx: signal_rx,
        task: Some(tokio::spawn(task.run())),
    })
}

// ============================================================================
// Subscription
// ============================================================================

/// OS-level watch on the target's directory.
struct Subscription {
    watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl Subscription {
    fn establish(
        dir: &Path,
        raw_tx: mpsc::UnboundedSender<notify::Result<Event>>,
    ) -> Result<Self, NotifierError> {
        // Unbounded: the notify thread must never block (`rebind` waits on it)
        // and no event may be dropped, removals included.
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = raw_tx.send(res);
        })
        .map_err(NotifierError::Init)?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| NotifierError::Subscribe {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(Self {
            watcher,
            dir: dir.to_path_buf(),
        })
    }

    /// Drop and re-create the watch on the same directory.
    fn rebind(&mut self) -> Result<(), NotifierError> {
        let _ = self.watcher.unwatch(&self.dir);
        self.watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|source| NotifierError::Resubscribe {
                path: self.dir.clone(),
                source,
            })
    }
}

// ============================================================================
// Event classification
// ============================================================================

/// What a raw event means for the watched document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawChange {
    /// Content may have changed
    Touched,
    /// Document was removed; a recreate will follow as `Touched`
    Removed,
    /// The watched directory itself was removed
    DirRemoved,
    /// Unrelated file, access or metadata-only noise
    Ignored,
}

fn classify(event: &Event, target: &WatchTarget) -> RawChange {
    use notify::event::ModifyKind;

    let is_remove = matches!(event.kind, EventKind::Remove(_));
    if is_remove && event.paths.iter().any(|p| p == target.dir()) {
        return RawChange::DirRemoved;
    }

    if !event.paths.iter().any(|p| target.matches(p)) {
        return RawChange::Ignored;
    }

    match event.kind {
        EventKind::Access(_) => RawChange::Ignored,
        // mtime/atime/chmod noise
        EventKind::Modify(ModifyKind::Metadata(_)) => RawChange::Ignored,
        EventKind::Remove(_) => RawChange::Removed,
        _ => RawChange::Touched,
    }
}

// ============================================================================
// Notifier task
// ============================================================================

struct NotifierTask {
    target: WatchTarget,
    subscription: Subscription,
    raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    signal_tx: mpsc::Sender<()>,
    debouncer: Debouncer,
    cancel: CancellationToken,
}

impl NotifierTask {
    async fn run(mut self) -> Result<(), NotifierError> {
        let result = self.event_loop().await;
        match &result {
            Ok(()) => crate::debug!("watch"; "stopped watching {}", self.target),
            Err(e) => crate::log!("watch"; "{}: {}", self.target, e),
        }
        result
    }

    async fn event_loop(&mut self) -> Result<(), NotifierError> {
        loop {
            let wake = self.debouncer.deadline().unwrap_or_else(Instant::now);
            let wake = tokio::time::Instant::from_std(wake);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep_until(wake), if self.debouncer.is_pending() => {
                    if self.debouncer.fire(Instant::now()) && !self.emit() {
                        // Consumer dropped its SignalSource
                        return Ok(());
                    }
                }
                raw = self.raw_rx.recv() => match raw {
                    Some(Ok(event)) => self.handle(&event)?,
                    Some(Err(e)) => return Err(NotifierError::Watch(e)),
                    None => return Err(NotifierError::StreamClosed),
                },
            }
        }
    }

    fn handle(&mut self, event: &Event) -> Result<(), NotifierError> {
        match classify(event, &self.target) {
            RawChange::Ignored => {}
            RawChange::Touched => {
                crate::debug!("watch"; "raw {:?}: {}", event.kind, self.target);
                self.debouncer.record(Instant::now());
            }
            RawChange::Removed => {
                crate::debug!("watch"; "removed: {}", self.target);
                // Some backends report only the children of a deleted directory
                if !self.target.dir().exists() {
                    self.subscription.rebind()?;
                }
                self.debouncer.record(Instant::now());
            }
            RawChange::DirRemoved => {
                crate::debug!("watch"; "directory removed, re-watching: {}", self.target);
                self.subscription.rebind()?;
                self.debouncer.record(Instant::now());
            }
        }
        Ok(())
    }

    /// Queue a signal. Returns false once the consumer is gone.
    fn emit(&self) -> bool {
        match self.signal_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        }
    }
}
