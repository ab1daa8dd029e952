use spark_model::BatchId;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Turns SIGINT or SIGTERM into a cooperative stop of the batch run.
///
/// The pipeline being streamed, if any, is remembered so the interrupt can be
/// reported against it; disposing of the remote job stays with the run.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
    interrupted: Arc<AtomicBool>,
    active_batch: Arc<Mutex<Option<BatchId>>>,
}

impl ShutdownCoordinator {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            interrupted: Arc::new(AtomicBool::new(false)),
            active_batch: Arc::new(Mutex::new(None)),
        }
    }

    pub fn register_handlers(&self) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            coordinator.interrupt(signal);
        });
    }

    /// Records the pipeline a run is streaming into.
    pub fn track_batch(&self, batch_id: &BatchId) {
        if let Ok(mut active) = self.active_batch.lock() {
            *active = Some(batch_id.clone());
        }
    }

    pub fn active_batch(&self) -> Option<BatchId> {
        self.active_batch.lock().ok().and_then(|active| active.clone())
    }

    /// Flags the shutdown and cancels the run.
    pub fn interrupt(&self, signal: &str) {
        match self.active_batch() {
            Some(batch_id) => {
                warn!(%batch_id, signal, "Interrupted, stopping the batch run and cancelling the pipeline")
            }
            None => info!(signal, "Interrupted, no batch pipeline is running"),
        }
        self.interrupted.store(true, Ordering::SeqCst);
        self.cancel_token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

/// Resolves with the name of the first termination signal received. A handler
/// that cannot be installed never fires.
async fn wait_for_signal() -> &'static str {
    let sigint = async {
        match signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(err) => {
                error!(error = %err, "Failed to install SIGINT handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&'static str>();

    tokio::select! {
        name = sigint => name,
        name = sigterm => name,
    }
}

/// Process exit status of the `spark` binary.
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// 128 + SIGINT
    ShutdownRequested = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
