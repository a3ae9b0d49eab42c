pub mod crowdin;
pub mod strategy_sources;
pub mod uigf;
