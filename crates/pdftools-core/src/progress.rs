//! Progress events, cooperative yielding and cancellation
//!
//! Every orchestrated operation reports `(percent, label)` updates through a
//! [`ProgressReporter`]. Updates are clamped to `[0, 100]` and never go
//! backwards, and every successful operation ends with exactly one update at
//! 100. Consumers either pull updates from a [`ProgressStream`] or receive
//! them through a callback.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::OperationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub percent: u8,
    pub label: String,
}

/// Finite stream of progress updates; it ends when the reporter is dropped
pub type ProgressStream = UnboundedReceiver<Progress>;

enum Sink {
    Silent,
    Channel(UnboundedSender<Progress>),
    Callback(Box<dyn Fn(&Progress)>),
}

pub struct ProgressReporter {
    sink: Sink,
    last: Cell<Option<u8>>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sink = match self.sink {
            Sink::Silent => "silent",
            Sink::Channel(_) => "channel",
            Sink::Callback(_) => "callback",
        };
        f.debug_struct("ProgressReporter")
            .field("sink", &sink)
            .field("last", &self.last.get())
            .finish()
    }
}

impl ProgressReporter {
    pub fn silent() -> Self {
        Self::with_sink(Sink::Silent)
    }

    pub fn channel() -> (Self, ProgressStream) {
        let (tx, rx) = unbounded();
        (Self::with_sink(Sink::Channel(tx)), rx)
    }

    pub fn callback(f: impl Fn(&Progress) + 'static) -> Self {
        Self::with_sink(Sink::Callback(Box::new(f)))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            sink,
            last: Cell::new(None),
        }
    }

    /// Emit an update. Values below the last reported percentage are raised
    /// to it, values above 100 are lowered to 100.
    pub fn report(&self, percent: u8, label: &str) {
        let floor = self.last.get().unwrap_or(0);
        let percent = percent.clamp(floor, 100);
        self.last.set(Some(percent));
        tracing::debug!(percent, label, "Progress");
        self.emit(Progress {
            percent,
            label: label.to_string(),
        });
    }

    pub fn finish(&self, label: &str) {
        self.report(100, label);
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last.get()
    }

    fn emit(&self, progress: Progress) {
        match &self.sink {
            Sink::Silent => {}
            // A dropped receiver only means nobody is watching
            Sink::Channel(tx) => {
                let _ = tx.unbounded_send(progress);
            }
            Sink::Callback(f) => f(&progress),
        }
    }
}

/// Map `done / total` of a phase onto `[floor, ceiling]`
pub fn scaled(done: usize, total: usize, floor: u8, ceiling: u8) -> u8 {
    if total == 0 || done >= total {
        return ceiling;
    }
    let span = u64::from(ceiling.saturating_sub(floor));
    let step = span * done as u64 / total as u64;
    floor + step as u8
}

/// Future that returns `Pending` once, giving the executor a chance to run
/// other tasks and repaint
#[derive(Debug, Default)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

pub fn yield_now() -> YieldNow {
    YieldNow::default()
}

/// Progress sink and cancellation token for one operation
#[derive(Debug)]
pub struct OperationContext {
    pub progress: ProgressReporter,
    pub cancel: CancellationToken,
}

impl OperationContext {
    pub fn new(progress: ProgressReporter) -> Self {
        Self {
            progress,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(progress: ProgressReporter, cancel: CancellationToken) -> Self {
        Self { progress, cancel }
    }

    pub fn silent() -> Self {
        Self::new(ProgressReporter::silent())
    }

    /// Batch boundary: abort if cancellation was requested
    pub fn checkpoint(&self) -> Result<(), OperationError> {
        if self.cancel.is_cancelled() {
            tracing::info!("Operation cancelled at batch boundary");
            return Err(OperationError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::StreamExt;
    use std::rc::Rc;
    use std::cell::RefCell;

    #[test]
    fn test_report_is_monotonic_and_clamped() {
        let (reporter, stream) = ProgressReporter::channel();
        reporter.report(10, "a");
        reporter.report(5, "b");
        reporter.report(150, "c");
        drop(reporter);

        let updates: Vec<Progress> = block_on(stream.collect());
        let percents: Vec<u8> = updates.iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![10, 10, 100]);
        assert_eq!(updates[1].label, "b");
    }

    #[test]
    fn test_callback_sink() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let reporter = ProgressReporter::callback(move |p| sink.borrow_mut().push(p.percent));
        reporter.report(40, "Working");
        reporter.finish("Done");
        assert_eq!(*seen.borrow(), vec![40, 100]);
        assert_eq!(reporter.last_percent(), Some(100));
    }

    #[test]
    fn test_channel_survives_dropped_receiver() {
        let (reporter, stream) = ProgressReporter::channel();
        drop(stream);
        reporter.report(50, "still fine");
        assert_eq!(reporter.last_percent(), Some(50));
    }

    #[test]
    fn test_scaled() {
        assert_eq!(scaled(0, 10, 0, 90), 0);
        assert_eq!(scaled(5, 10, 0, 90), 45);
        assert_eq!(scaled(10, 10, 0, 90), 90);
        assert_eq!(scaled(1, 3, 30, 60), 40);
        assert_eq!(scaled(0, 0, 0, 90), 90);
    }

    #[test]
    fn test_yield_now_completes() {
        block_on(async {
            yield_now().await;
            yield_now().await;
        });
    }

    #[test]
    fn test_checkpoint_honors_cancellation() {
        let ctx = OperationContext::silent();
        assert!(ctx.checkpoint().is_ok());
        ctx.cancel.cancel();
        assert_eq!(ctx.checkpoint(), Err(OperationError::Cancelled));
    }
}
