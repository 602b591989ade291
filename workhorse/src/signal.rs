use std::io;

use flume::{Receiver, Sender};
use thiserror::Error;
use tracing::info;

/// Errors raised while waiting for a termination signal.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Failed to start signal runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("Failed to listen for termination signal: {0}")]
    Listen(#[source] io::Error),

    #[error("Signal source dropped without firing")]
    SourceDropped,
}

/// Something that blocks until the process is asked to terminate.
pub trait TerminationSignal: Send + 'static {
    /// Block the current thread until the signal fires.
    fn wait(self: Box<Self>) -> Result<(), SignalError>;
}

/// Ctrl+C, and SIGTERM on Unix.
#[derive(Debug, Default, Clone, Copy)]
pub struct CtrlC;

impl TerminationSignal for CtrlC {
    fn wait(self: Box<Self>) -> Result<(), SignalError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SignalError::Runtime)?;
        runtime.block_on(termination())
    }
}

#[cfg(unix)]
async fn termination() -> Result<(), SignalError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).map_err(SignalError::Listen)?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(SignalError::Listen)?;
            info!("Received Ctrl+C");
        }
        _ = terminate.recv() => {
            info!("Received SIGTERM");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn termination() -> Result<(), SignalError> {
    tokio::signal::ctrl_c().await.map_err(SignalError::Listen)?;
    info!("Received Ctrl+C");
    Ok(())
}

/// A signal fired from code, for embedding and tests.
pub struct ManualSignal {
    receiver: Receiver<()>,
}

/// Fires the paired [`ManualSignal`].
#[derive(Clone)]
pub struct SignalTrigger {
    sender: Sender<()>,
}

impl SignalTrigger {
    pub fn fire(&self) {
        let _ = self.sender.try_send(());
    }
}

/// Create a connected trigger and signal.
pub fn manual() -> (SignalTrigger, ManualSignal) {
    let (sender, receiver) = flume::bounded(1);
    (SignalTrigger { sender }, ManualSignal { receiver })
}

impl TerminationSignal for ManualSignal {
    fn wait(self: Box<Self>) -> Result<(), SignalError> {
        self.receiver.recv().map_err(|_| SignalError::SourceDropped)
    }
}
