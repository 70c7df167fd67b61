use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Holds running tasks and shutdown channel for the node.
/// Call `shutdown()` to gracefully stop services.
pub struct ServiceHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handles: Vec<(&'static str, JoinHandle<anyhow::Result<()>>)>,
}

impl ServiceHandle {
    /// Create a new ServiceHandle and return it together with a Receiver clonable by tasks.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let handle = ServiceHandle { shutdown_tx: tx, join_handles: vec![] };
        (handle, rx)
    }

    /// Attach a named background task so shutdown waits on it.
    pub fn attach(&mut self, name: &'static str, h: JoinHandle<anyhow::Result<()>>) {
        self.join_handles.push((name, h));
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signal shutdown to all tasks and await them in attach order.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        for (name, h) in self.join_handles {
            match h.await {
                Ok(Ok(())) => tracing::debug!("{} stopped", name),
                Ok(Err(e)) => tracing::error!("{} returned error: {:?}", name, e),
                Err(e) => tracing::error!("{} join error: {:?}", name, e),
            }
        }
        Ok(())
    }

    /// Return a cloneable shutdown receiver for tasks that need to observe shutdown state.
    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}
