use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hutao_api::commands::{ComposeArgs, handle_compose};
use hutao_api::container::{AppContainer, AppContext};
use hutao_api::docs::is_openapi_docs_enabled;
use hutao_api::routes::create_router;
use hutao_api::tasks::{CensorScanTask, DailyStatsTask, PatchUpdater};

#[derive(Parser)]
#[command(name = "hutao-api", about = "Hutao Generic API gateway", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default when no subcommand is provided)
    Serve,
    /// Run the scheduled tasks without the HTTP server
    Tasks,
    /// Generate docker-compose.yml from docker-compose.yml.base
    Compose(ComposeArgs),
}

fn init_tracing() -> WorkerGuard {
    // DEBUG=1 强制输出调试日志
    let default_level = if std::env::var("DEBUG").is_ok_and(|v| v == "1" || v == "true") {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    };

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "log".to_string());
    let file_appender = tracing_appender::rolling::hourly(log_dir, "app.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&default_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("Tracing initialized successfully");
    guard
}

async fn build_context() -> anyhow::Result<AppContext> {
    let container = AppContainer::new().await?;
    let ctx = container.create_app_context();

    // 写入缺失的默认重定向规则
    if let Err(e) = ctx.redirect_rules.seed_defaults().await {
        error!("Failed to seed redirect rules: {}", e);
    }
    Ok(ctx)
}

async fn serve() -> anyhow::Result<()> {
    info!("Starting Hutao Generic API server...");
    let ctx = build_context().await?;
    info!(
        "Configuration loaded, image: {}, server type: {}, debug: {}",
        ctx.get_config().image_name,
        ctx.get_config().server_type,
        ctx.get_config().is_debug()
    );

    let updater = Arc::new(PatchUpdater::new(
        ctx.shared_config.clone(),
        ctx.patch_service.clone(),
    ));
    updater.update_all().await;
    updater.start_background_task().await;
    info!("Patch updater started");

    let app = create_router(ctx);

    let bind_addr = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let addr: SocketAddr = bind_addr.parse()?;

    if is_openapi_docs_enabled() {
        info!("OpenAPI documentation enabled at /docs and /api-docs/openapi.json");
    } else {
        info!("OpenAPI documentation disabled (set ENABLE_OPENAPI_DOCS=true to enable)");
    }

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    info!("Server shutdown gracefully");
    Ok(())
}

async fn run_tasks() -> anyhow::Result<()> {
    info!("Starting scheduled tasks...");
    let ctx = build_context().await?;

    Arc::new(CensorScanTask::new(
        ctx.shared_config.clone(),
        ctx.censor_scanner(),
    ))
    .start_background_task()
    .await;
    Arc::new(DailyStatsTask::new(ctx.stats.clone()))
        .start_background_task()
        .await;

    tokio::signal::ctrl_c().await?;
    info!("Scheduled tasks stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guard = init_tracing();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Tasks => run_tasks().await,
        Commands::Compose(args) => handle_compose(args).await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
