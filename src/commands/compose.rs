use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

pub const REQUIRED_VARIABLES: [&str; 3] = ["IMAGE_NAME", "SERVER_TYPE", "EXTERNAL_PORT"];

#[derive(Args)]
pub struct ComposeArgs {
    /// Template file with %placeholder% markers
    #[arg(long, default_value = "docker-compose.yml.base")]
    pub template: PathBuf,

    /// Output path
    #[arg(short = 'o', long, default_value = "docker-compose.yml")]
    pub output: PathBuf,
}

/// 各服务名称的占位符与取值
pub fn service_names(image_name: &str, server_type: &str) -> Vec<(&'static str, String)> {
    vec![
        ("fastapi_service_name", format!("{image_name}-{server_type}-server")),
        ("redis_service_name", format!("{image_name}-{server_type}-redis")),
        (
            "scheduled_tasks_service_name",
            format!("{image_name}-{server_type}-scheduled-tasks"),
        ),
        ("tunnel_service_name", format!("{image_name}-{server_type}-tunnel")),
    ]
}

pub fn render_compose(template: &str, image_name: &str, server_type: &str) -> String {
    service_names(image_name, server_type)
        .into_iter()
        .fold(template.to_string(), |content, (placeholder, value)| {
            content.replace(&format!("%{placeholder}%"), &value)
        })
}

/// 读取必需的环境变量，缺失时列出全部缺失项
pub fn required_variables<F>(lookup: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = REQUIRED_VARIABLES
        .iter()
        .map(|name| lookup(name).filter(|v| !v.is_empty()))
        .collect();

    let missing: Vec<&str> = REQUIRED_VARIABLES
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        bail!("{} variables are missing: {}", missing.len(), missing.join(", "));
    }

    Ok(values.into_iter().flatten().collect())
}

pub async fn handle_compose(args: ComposeArgs) -> Result<()> {
    let values = required_variables(|name| std::env::var(name).ok())?;
    let (image_name, server_type) = (&values[0], &values[1]);

    let template = tokio::fs::read_to_string(&args.template).await?;
    let content = render_compose(&template, image_name, server_type);
    tokio::fs::write(&args.output, content).await?;

    info!("{} generated successfully.", args.output.display());
    Ok(())
}
