use anyhow::{Context, bail};
use clap::Parser;
use dotenvy::dotenv;
use material_uploader::services::progress::TracingProgressSink;
use material_uploader::services::session::TokenSession;
use material_uploader::utils::format::format_file_size;
use material_uploader::{UploadFile, UploadOrchestrator, UploaderConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files to upload, processed one at a time in the given order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Bearer token issued at login
    #[arg(short, long, env = "AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Backend API base URL (overrides API_BASE_URL)
    #[arg(long)]
    api_base_url: Option<String>,

    /// Content type to declare for every file instead of sniffing it
    #[arg(long)]
    content_type: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "material_uploader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = UploaderConfig::from_env();
    if let Some(url) = args.api_base_url {
        config.api_base_url = url;
    }
    info!(
        "☁️  Backend: {}, part size {}",
        config.api_base_url,
        format_file_size(config.part_size as u64)
    );

    let session = Arc::new(TokenSession::new(args.token, config.login_url.clone()));
    let Some(claims) = session.check_login_status() else {
        bail!("Not logged in, please log in at {}", session.login_url());
    };
    info!("👤 Uploading as {} (id {})", claims.username, claims.user_id);

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let mut file = UploadFile::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if let Some(content_type) = &args.content_type {
            file.content_type = Some(content_type.clone());
        }
        files.push(file);
    }

    let orchestrator =
        UploadOrchestrator::from_config(&config, session.clone(), Arc::new(TracingProgressSink))?;
    let mut report = orchestrator.submit(files).await;
    report.wait_for_refresh().await;

    if report.session_expired {
        bail!(
            "Session expired, please log in again at {} ({} upload(s) not started)",
            config.login_url,
            report.abandoned()
        );
    }
    if report.failed() > 0 {
        bail!(
            "{} of {} upload(s) failed",
            report.failed(),
            report.tasks().len()
        );
    }

    info!("🎉 All {} upload(s) recorded", report.succeeded());
    Ok(())
}
