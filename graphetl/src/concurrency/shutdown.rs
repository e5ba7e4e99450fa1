use tokio::sync::watch;

/// Result of a unit of work that may be interrupted by a shutdown signal.
#[derive(Debug, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    Ok(T),
    Shutdown(I),
}

/// Transmitter of a one-way shutdown signal.
///
/// Once signaled the flag stays set, so receivers subscribed later still observe it.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Signals every receiver. Signaling twice is a no-op.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    /// Returns whether the signal was already sent.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver of a shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns whether shutdown was requested, without waiting.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Completes once shutdown is requested.
    ///
    /// If every transmitter is dropped without signaling the future never completes.
    pub async fn wait(&mut self) {
        if self.0.wait_for(|shutdown| *shutdown).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a new, unsignaled shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}
