pub mod issue_service;
pub mod localization_service;
pub mod patch_service;
pub mod strategy_service;
pub mod wallpaper_service;

pub use issue_service::IssueService;
pub use localization_service::LocalizationService;
pub use patch_service::PatchService;
pub use strategy_service::{StrategyChannel, StrategyService};
pub use wallpaper_service::WallpaperService;
