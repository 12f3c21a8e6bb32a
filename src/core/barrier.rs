//! One-time readiness gate

use tokio::sync::watch;

/// A gate that starts closed and can be opened exactly once.
///
/// Waiters queue behind [`Barrier::wait`] until [`Barrier::open`] is called; once open
/// it never closes again.
#[derive(Debug)]
pub struct Barrier {
    sender: watch::Sender<bool>,
}

impl Barrier {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Open the gate, releasing every current and future waiter
    pub fn open(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.sender.borrow()
    }

    /// Wait until the gate has been opened
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|open| *open).await;
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}
