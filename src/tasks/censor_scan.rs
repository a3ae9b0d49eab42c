use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::SharedConfig;
use crate::modules::censor::CensorScanner;

/// 周期性执行合规扫描
pub struct CensorScanTask {
    config: SharedConfig,
    scanner: CensorScanner,
}

impl CensorScanTask {
    pub fn new(config: SharedConfig, scanner: CensorScanner) -> Self {
        Self { config, scanner }
    }

    pub async fn start_background_task(self: Arc<Self>) {
        let (enabled, minutes) = {
            let config = self.config.load();
            (config.censor.enabled, config.censor.scan_interval_minutes.max(1))
        };
        if !enabled {
            info!("Censor scan task is disabled");
            return;
        }
        info!("Starting censor scan task with interval: {} minutes", minutes);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match self.scanner.scan().await {
                    Ok(files) => info!("Censor scan completed, {} files censored", files.len()),
                    Err(e) => error!("Censor scan failed: {}", e),
                }
            }
        });
    }
}
