// services/sweep.rs
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::services::lending_service::LendingService;

/// Handle to the background disbursement sweep.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task_handle: JoinHandle<()>,
}

impl SweepHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task_handle.await {
            warn!("⚠️ Disbursement sweep ended abnormally: {}", e);
        }
    }
}

/// Runs `LendingService::sweep` every `every`, starting immediately.
pub fn spawn_disbursement_sweep(lending: Arc<LendingService>, every: Duration) -> SweepHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task_handle = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("⏱️ Disbursement sweep started, every {}s", every.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match lending.sweep(Utc::now()).await {
                        Ok(report) if report.failures > 0 => warn!(
                            "⚠️ Sweep checked {} campaign(s): {} transition(s), {} disbursement(s), {} failure(s)",
                            report.campaigns_checked,
                            report.transitions_applied,
                            report.disbursements_completed,
                            report.failures
                        ),
                        Ok(report) => debug!(
                            "Sweep checked {} campaign(s): {} transition(s), {} disbursement(s)",
                            report.campaigns_checked,
                            report.transitions_applied,
                            report.disbursements_completed
                        ),
                        Err(e) => error!("❌ Disbursement sweep failed: {}", e),
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("🛑 Disbursement sweep stopping");
                    break;
                }
            }
        }
    });

    SweepHandle {
        shutdown_tx,
        task_handle,
    }
}
