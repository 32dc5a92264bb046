//! services/scheduler_service.rs
//! Barrido periódico de campañas programadas vencidas.

use std::time::Duration;

use chrono::Utc;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::services::{campaign_service::CampaignService, dispatch_service::Dispatcher};

/// `tokio::time::interval` no admite periodos nulos.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct CampaignScheduler {
    dispatcher: Dispatcher,
    campaigns: CampaignService,
    interval: Duration,
}

impl CampaignScheduler {
    pub fn new(
        dispatcher: Dispatcher,
        campaigns: CampaignService,
        interval: Duration,
    ) -> Self {
        let interval = if interval.is_zero() {
            log::warn!("(scheduler) zero interval requested, using {:?}", MIN_INTERVAL);
            MIN_INTERVAL
        } else {
            interval
        };
        Self {
            dispatcher,
            campaigns,
            interval,
        }
    }

    /// Despacha las campañas vencidas, una tras otra. Devuelve cuántas se
    /// despacharon. Si otro barrido ya reclamó una campaña, `dispatch` la
    /// rechaza y se sigue con la siguiente.
    pub async fn sweep(&self) -> usize {
        let due = match self.campaigns.due_scheduled(Utc::now()).await {
            Ok(ids) => ids,
            Err(e) => {
                log::error!("(scheduler) could not list scheduled campaigns: {:?}", e);
                return 0;
            }
        };

        let mut dispatched = 0;
        for campaign_id in due {
            log::info!("(scheduler) processing scheduled campaign {}", campaign_id);
            match self.dispatcher.dispatch(campaign_id).await {
                Ok(report) => {
                    dispatched += 1;
                    log::info!(
                        "(scheduler) campaign {} dispatched: {:?}",
                        campaign_id,
                        report
                    );
                }
                Err(e) => log::error!("(scheduler) campaign {} failed: {}", campaign_id, e),
            }
        }
        dispatched
    }

    /// Lanza el barrido en segundo plano hasta que `shutdown` pase a `true`.
    /// Un despacho en curso termina antes de salir.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::info!("(scheduler) started, interval={:?}", self.interval);

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
            log::info!("(scheduler) stopped");
        })
    }
}
