use arc_swap::Guard;
use tracing::warn;

use crate::{
    config::{AppConfig, SharedConfig},
    metrics::Metrics,
    modules::censor::CensorScanner,
    modules::client_gate::ClientGate,
    modules::mailer::{SharedMailer, create_mailer},
    modules::redirect_rules::RedirectRuleService,
    modules::stats::StatsService,
    modules::storage::{DataStore, create_data_store},
    services::{IssueService, LocalizationService, PatchService, StrategyService, WallpaperService},
};

use std::sync::Arc;
use std::time::Duration;

lazy_static::lazy_static! {
    pub static ref REQWEST_CLIENT: reqwest::Client = reqwest::Client::builder()
        .user_agent(concat!("Hutao-Generic-API/", env!("CARGO_PKG_VERSION")))
        .read_timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build reqwest client, using defaults: {}", e);
            reqwest::Client::new()
        });
}

#[derive(Clone)]
pub struct AppContext {
    pub shared_config: SharedConfig,
    pub data_store: DataStore,
    pub metrics: Arc<Metrics>,
    pub mailer: SharedMailer,
    pub redirect_rules: RedirectRuleService,
    pub client_gate: ClientGate,
    pub stats: StatsService,
    pub patch_service: PatchService,
    pub wallpaper_service: WallpaperService,
    pub issue_service: IssueService,
    pub strategy_service: StrategyService,
    pub localization_service: LocalizationService,
}

impl AppContext {
    /// 无锁获取配置
    pub fn get_config(&self) -> Guard<Arc<AppConfig>> {
        self.shared_config.load()
    }

    /// 从配置文件热重载
    pub async fn reload_config(&self) -> anyhow::Result<()> {
        self.shared_config.reload_from_file().await
    }

    pub fn censor_scanner(&self) -> CensorScanner {
        CensorScanner::new(
            self.data_store.clone(),
            self.shared_config.clone(),
            self.mailer.clone(),
        )
    }
}

pub struct AppContainer {
    pub data_store: DataStore,
    pub shared_config: SharedConfig,
    pub metrics: Arc<Metrics>,
    pub mailer: SharedMailer,
}

impl AppContainer {
    pub async fn new() -> anyhow::Result<Self> {
        // 1. 加载配置并创建共享配置
        let initial_config = AppConfig::load().await?;

        // 2. 初始化存储
        let data_store = create_data_store()
            .await
            .map_err(|e| anyhow::anyhow!("Data store initialization failed: {e}"))?;

        // 3. 初始化其他组件
        let mailer = create_mailer(&initial_config.mail);
        Self::from_parts(initial_config, data_store, mailer)
    }

    pub fn from_parts(
        config: AppConfig,
        data_store: DataStore,
        mailer: SharedMailer,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        Ok(Self {
            data_store,
            shared_config: SharedConfig::new(config),
            metrics,
            mailer,
        })
    }

    pub fn create_app_context(&self) -> AppContext {
        let store = self.data_store.clone();
        let config = self.shared_config.clone();

        let client_gate = ClientGate::new(store.clone(), config.clone());
        let patch_service = PatchService::new(
            store.clone(),
            config.clone(),
            client_gate.clone(),
            self.metrics.clone(),
        );

        AppContext {
            redirect_rules: RedirectRuleService::new(store.clone(), config.clone()),
            stats: StatsService::new(store.clone()),
            wallpaper_service: WallpaperService::new(store.clone()),
            issue_service: IssueService::new(store.clone(), config.clone()),
            strategy_service: StrategyService::new(store.clone(), config.clone()),
            localization_service: LocalizationService::new(store.clone(), config.clone()),
            client_gate,
            patch_service,
            metrics: self.metrics.clone(),
            mailer: self.mailer.clone(),
            shared_config: config,
            data_store: store,
        }
    }
}
