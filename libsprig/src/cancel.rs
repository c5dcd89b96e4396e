//! Bridge from a shared interrupt channel to per-evaluation cancellation tokens
use crate::interrupt::InterruptSource;
use crate::{Error, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancellation token scoped to one evaluation.
///
/// Cancellation is cooperative: engines poll [CancelToken::check] at points where
/// aborting is safe, e.g. loop iterations and function calls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Fails with [Error::Cancelled] once cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Cancel the evaluation holding this token
    pub fn cancel(&self) {
        self.0.cancel()
    }
}

/// Turns interrupts into cancellation of whichever evaluation is active.
///
/// The watcher task for an evaluation runs on the runtime behind `handle`, which must be a
/// multi-threaded runtime since the evaluation itself blocks the calling thread.
#[derive(Debug)]
pub struct CancellationBridge {
    interrupts: InterruptSource,
    handle: Handle,
}

impl CancellationBridge {
    pub fn new(interrupts: InterruptSource, handle: Handle) -> Self {
        Self { interrupts, handle }
    }

    /// Take an interrupt that arrived while no evaluation was active
    pub fn take_stale(&self) -> bool {
        let stale = self.interrupts.try_take();
        if stale {
            debug!("took interrupt delivered between evaluations");
        }
        stale
    }

    /// Start watching for interrupts on behalf of a new evaluation
    pub fn begin(&self) -> Evaluation {
        let token = CancelToken::new();
        let done = CancellationToken::new();
        let watcher = self.handle.spawn(watch(
            self.interrupts.clone(),
            token.clone(),
            done.clone(),
        ));
        Evaluation {
            token,
            done,
            watcher: Some(watcher),
        }
    }
}

/// Race completion of an evaluation against the next interrupt.
/// Returns whether the interrupt won.
async fn watch(interrupts: InterruptSource, token: CancelToken, done: CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = done.cancelled() => false,
        Some(()) = interrupts.recv() => {
            debug!("interrupt received - cancelling evaluation");
            token.cancel();
            true
        }
    }
}

/// An evaluation in flight, watched for interrupts until [Evaluation::finish]
#[derive(Debug)]
pub struct Evaluation {
    token: CancelToken,
    done: CancellationToken,
    watcher: Option<JoinHandle<bool>>,
}

impl Evaluation {
    /// Token to hand to the engine for this evaluation
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Mark the evaluation complete and wait for its watcher to exit.
    /// Returns whether the evaluation was interrupted.
    pub fn finish(mut self) -> bool {
        self.done.cancel();
        let Some(watcher) = self.watcher.take() else {
            return false;
        };
        match futures::executor::block_on(watcher) {
            Ok(interrupted) => interrupted,
            Err(e) => {
                warn!("interrupt watcher failed - {e}");
                false
            }
        }
    }
}

impl Drop for Evaluation {
    fn drop(&mut self) {
        // watcher exits on its own once done is signalled
        self.done.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt;
    use assert_matches::assert_matches;
    use std::time::Duration;
    use tokio::runtime::{Builder, Runtime};

    fn runtime() -> Runtime {
        Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    /// Spin until token is cancelled, like an engine polling in a loop
    fn spin(token: &CancelToken) -> Result<()> {
        loop {
            token.check()?;
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn token_check() {
        let token = CancelToken::new();
        assert_matches!(token.check(), Ok(()));
        token.cancel();
        assert!(token.is_cancelled());
        assert_matches!(token.check(), Err(Error::Cancelled));
    }

    #[test]
    fn interrupt_cancels_active_evaluation() {
        let rt = runtime();
        let (tx, rx) = interrupt::channel();
        let bridge = CancellationBridge::new(rx, rt.handle().clone());

        let eval = bridge.begin();
        let token = eval.token();
        let interrupter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.interrupt();
        });

        assert_matches!(spin(&token), Err(Error::Cancelled));
        assert!(eval.finish());
        interrupter.join().unwrap();
    }

    #[test]
    fn completed_evaluation_ignores_late_interrupt() {
        let rt = runtime();
        let (tx, rx) = interrupt::channel();
        let bridge = CancellationBridge::new(rx, rt.handle().clone());

        let first = bridge.begin();
        let first_token = first.token();
        assert!(!first.finish());

        tx.interrupt();
        std::thread::sleep(Duration::from_millis(10));
        assert!(!first_token.is_cancelled(), "finished token is inert");

        // late interrupt is surfaced, not handed to the next evaluation
        assert!(bridge.take_stale());

        let second = bridge.begin();
        let second_token = second.token();
        std::thread::sleep(Duration::from_millis(10));
        assert!(!second_token.is_cancelled());
        assert!(!second.finish());
    }

    #[test]
    fn dropped_evaluation_releases_interrupts() {
        let rt = runtime();
        let (tx, rx) = interrupt::channel();
        let bridge = CancellationBridge::new(rx, rt.handle().clone());

        drop(bridge.begin());
        std::thread::sleep(Duration::from_millis(10));

        tx.interrupt();
        std::thread::sleep(Duration::from_millis(10));
        assert!(bridge.take_stale());
    }
}
