//! One-shot cancellation signalling for dicefeed.
//!
//! The feed loop must stop promptly when the process is interrupted and
//! nothing else in the program shares mutable state with it, so the whole
//! coordination surface is this pair: a `Broadcaster` that raises the
//! cancellation signal at most once and a `Watcher` that waits for it.
//!
//! There is only one `Broadcaster` and potentially many `Watcher` instances.
//! Raising the signal consumes the `Broadcaster`, so a second raise is not
//! representable; every live `Watcher` observes the one raise, no matter
//! when it starts waiting.

use tokio::sync::broadcast::{self, error};

/// Construct a `Watcher` and `Broadcaster` pair.
#[must_use]
pub fn signal() -> (Watcher, Broadcaster) {
    // A capacity-1 broadcast channel carries the signal. Closing the channel
    // is the signal itself: receivers treat `Closed` the same as a delivered
    // `()`, which keeps the raise idempotent even if the `Broadcaster` is
    // dropped without an explicit call.
    let (sender, receiver) = broadcast::channel(1);

    let w = Watcher {
        receiver,
        signal_received: false,
    };
    let b = Broadcaster { sender };

    (w, b)
}

#[derive(Debug)]
/// Raises the cancellation signal for every `Watcher`.
pub struct Broadcaster {
    /// Transmission point for the signal to `Watcher` instances.
    sender: broadcast::Sender<()>,
}

impl Broadcaster {
    /// Raise the signal through to any `Watcher` instances.
    ///
    /// Consumes the broadcaster: the signal can be raised at most once.
    /// Function does not block and does not wait for watchers to observe
    /// the signal.
    pub fn signal(self) {
        drop(self.sender);
    }
}

/// Errors for `Watcher::try_recv`.
#[derive(thiserror::Error, Debug, Clone, Copy)]
pub enum TryRecvError {
    /// The signal has been received and yet `try_recv` was called.
    #[error("signal has been received")]
    SignalReceived,
}

#[derive(Debug)]
/// Waits for the cancellation signal raised by the `Broadcaster`.
pub struct Watcher {
    /// Transmission point for the signal from `Broadcaster`.
    receiver: broadcast::Receiver<()>,
    /// Used to track if the signal has been received without synchronization.
    signal_received: bool,
}

impl Watcher {
    /// Receive the cancellation notice. This function will block if a notice
    /// has not already been raised.
    ///
    /// If the signal was raised before this call the function returns
    /// immediately.
    ///
    /// # Panics
    ///
    /// Panics if the broadcast receiver has lagged behind, indicating a
    /// catastrophic programming error in the signal coordination.
    pub async fn recv(mut self) {
        if self.signal_received {
            return;
        }

        match self.receiver.recv().await {
            Ok(()) | Err(error::RecvError::Closed) => {
                self.signal_received = true;
            }
            Err(error::RecvError::Lagged(_)) => {
                panic!("Catastrophic programming error: lagged behind");
            }
        }
    }

    /// Check if the cancellation notice has been raised, without blocking.
    ///
    /// Returns `Ok(false)` while the signal is outstanding and `Ok(true)` the
    /// first time the signal is observed. Every call after that returns
    /// `TryRecvError::SignalReceived`.
    ///
    /// # Errors
    ///
    /// Returns `TryRecvError::SignalReceived` if the signal has already been
    /// observed by this watcher.
    ///
    /// # Panics
    ///
    /// Panics if the broadcast receiver has lagged behind, indicating a
    /// catastrophic programming error in the signal coordination.
    pub fn try_recv(&mut self) -> Result<bool, TryRecvError> {
        if self.signal_received {
            return Err(TryRecvError::SignalReceived);
        }

        match self.receiver.try_recv() {
            Ok(()) | Err(error::TryRecvError::Closed) => {
                self.signal_received = true;
                Ok(true)
            }
            Err(error::TryRecvError::Empty) => Ok(false),
            Err(error::TryRecvError::Lagged(_)) => {
                panic!("Catastrophic programming error: lagged behind")
            }
        }
    }
}

impl Clone for Watcher {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.resubscribe(),
            signal_received: self.signal_received,
        }
    }
}
