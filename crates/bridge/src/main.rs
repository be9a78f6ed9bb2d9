use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use alert_triage_bridge::{
    agent::{create_provider, DiagnosisProvider, MockProvider},
    config::Config,
    logs::LogContextReader,
    server::Server,
    sinks::{DingTalkSink, Notifier},
    template::MessageTemplates,
    triage::TriageDispatcher,
};

#[derive(Parser)]
#[command(author, version, about = "Diagnose Alertmanager alerts with an LLM and report them to DingTalk", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Listen address, overrides SERVER_ADDR
    #[arg(long)]
    addr: Option<String>,

    /// YAML service log table, overrides LOG_CATALOG_PATH
    #[arg(long)]
    log_catalog: Option<PathBuf>,

    /// Format of notifications printed to stdout (text, json), overrides STDOUT_FORMAT
    #[arg(long)]
    stdout_format: Option<String>,

    /// Use the mock diagnosis provider and print notifications instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }
    if let Some(format) = cli.stdout_format {
        config.notifier.stdout_format = format.to_lowercase();
    }
    if let Some(path) = cli.log_catalog {
        config.logs.catalog_path = Some(path);
    }

    let catalog = config.logs.catalog().context("failed to load log catalog")?;
    info!(
        "Known log services: {}",
        catalog.services().collect::<Vec<_>>().join(", ")
    );

    let templates = MessageTemplates::new().context("failed to compile message templates")?;

    let diagnoser: Arc<dyn DiagnosisProvider> = if cli.dry_run {
        Arc::new(MockProvider)
    } else {
        create_provider(&config.diagnosis).context("failed to create diagnosis provider")?
    };

    let notifier: Arc<dyn Notifier> = match (&config.notifier.webhook_url, cli.dry_run) {
        (Some(url), false) => Arc::new(
            DingTalkSink::new(url, config.notifier.timeout(), templates.clone())
                .context("failed to create DingTalk notifier")?,
        ),
        _ => {
            warn!(
                "Notifications will be printed to stdout as {}",
                config.notifier.stdout_format
            );
            Arc::new(
                config
                    .notifier
                    .stdout_sink()
                    .context("invalid stdout notification format")?,
            )
        }
    };

    info!(
        "Diagnosis provider: {} (model {}), notifier: {}",
        if cli.dry_run { "mock" } else { config.diagnosis.provider.as_str() },
        config.diagnosis.model,
        notifier.name()
    );

    let dispatcher = TriageDispatcher::new(
        Arc::new(LogContextReader::new(catalog)),
        diagnoser,
        notifier,
        templates,
    )
    .with_title(config.notifier.title.clone());

    // Start server
    info!("Starting server on {}", config.server.addr);
    Server::new(Arc::new(dispatcher))
        .start(&config.server.addr)
        .await
        .context("server failed")?;

    Ok(())
}
