//! Interrupt channel between the process (e.g. a SIGINT handler) and a session
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Mutex;
use tracing::debug;

/// Create a connected interrupt channel.
///
/// At most one interrupt is held at a time; interrupts delivered while one is already
/// pending coalesce into it.
pub fn channel() -> (Interrupter, InterruptSource) {
    let (tx, rx) = mpsc::channel(1);
    (
        Interrupter { tx },
        InterruptSource {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Sending half, held by whatever observes the interrupt
#[derive(Debug, Clone)]
pub struct Interrupter {
    tx: mpsc::Sender<()>,
}

impl Interrupter {
    /// Deliver an interrupt
    pub fn interrupt(&self) {
        match self.tx.try_send(()) {
            Ok(()) => debug!("interrupt delivered"),
            Err(TrySendError::Full(_)) => debug!("interrupt already pending"),
            Err(TrySendError::Closed(_)) => debug!("interrupt dropped - source is gone"),
        }
    }
}

/// Receiving half, owned by a [CancellationBridge]
///
/// [CancellationBridge]: crate::CancellationBridge
#[derive(Debug, Clone)]
pub struct InterruptSource {
    rx: Arc<Mutex<mpsc::Receiver<()>>>,
}

impl InterruptSource {
    /// Wait for the next interrupt. Returns `None` once every [Interrupter] is dropped.
    pub(crate) async fn recv(&self) -> Option<()> {
        self.rx.lock().await.recv().await
    }

    /// Take a pending interrupt without waiting
    pub(crate) fn try_take(&self) -> bool {
        let Ok(mut rx) = self.rx.try_lock() else {
            return false;
        };
        match rx.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }
}
