pub mod censor_scan;
pub mod daily_stats;
pub mod patch_updater;

pub use censor_scan::CensorScanTask;
pub use daily_stats::DailyStatsTask;
pub use patch_updater::PatchUpdater;
