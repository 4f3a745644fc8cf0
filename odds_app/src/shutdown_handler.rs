use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide stop flag that async code can await
#[derive(Clone)]
pub struct ShutdownSignal {
    stopped: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self { stopped: Arc::new(watch::Sender::new(false)) }
    }

    pub fn trigger(&self) {
        self.stopped.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolves once the signal has been triggered, immediately if it already was
    pub async fn wait(&self) {
        let mut stopped = self.stopped.subscribe();
        // the sender lives in self, so the channel cannot close under us
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets up a Ctrl+C handler that triggers the returned signal
pub fn install() -> Result<ShutdownSignal, ctrlc::Error> {
    let signal = ShutdownSignal::new();
    let handler = signal.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        handler.trigger();
    })?;
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_wait_returns_after_trigger() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_is_immediate() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.wait()).await.unwrap();
    }
}
