//! Cooperative cancellation for in-flight resolutions
//!
//! A [`CancelToken`] is handed into every resolution request and propagated
//! to the tasks it spawns. Fan-out phases derive a fresh child token so the
//! winner of a first-success race (or the first error of a wait-all phase)
//! can stop its peers without touching the caller's token.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation handle.
///
/// All clones observe the same state: once any clone calls [`cancel`],
/// every pending [`cancelled`] future completes and [`is_cancelled`]
/// returns true forever.
///
/// [`cancel`]: CancelToken::cancel
/// [`cancelled`]: CancelToken::cancelled
/// [`is_cancelled`]: CancelToken::is_cancelled
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates a new, uncancelled token.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns true once the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Every clone holds the sender, so this is unreachable while
                // anyone can still cancel; park forever rather than report a
                // cancellation that never happened.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
