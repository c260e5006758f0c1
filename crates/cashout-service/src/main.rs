use anyhow::{Context, Result};
use cashout_config::{Config, ConfigLoader};
use cashout_core::RecoveryOutcome;
use cashout_types::{TraceId, TransactionId, TransferEvent, TransferReason};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod service;

use service::CashoutService;

#[derive(Parser)]
#[command(name = "cashout")]
#[command(about = "Transfer-out orchestration service", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	/// Overrides `service.log_level` from the configuration file.
	#[arg(long, env = "CASHOUT_LOG_LEVEL")]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Recover interrupted transfers and log events until shutdown
	Start,
	/// Validate the configuration file
	Validate,
	/// Cash out the whole balance and wait for the outcome
	Cashout {
		#[arg(long)]
		trace_id: Option<String>,
	},
	/// Resume a transfer left suspended by a crash or provider fault
	Recover {
		#[arg(long)]
		transaction_id: Option<TransactionId>,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

	setup_tracing(log_level(cli.log_level.as_deref(), &config))?;
	info!("Loaded configuration from: {:?}", cli.config);

	match cli.command {
		Some(Commands::Start) | None => start_service(config).await,
		Some(Commands::Validate) => {
			validate_config(&config);
			Ok(())
		}
		Some(Commands::Cashout { trace_id }) => {
			let trace_id = trace_id
				.as_deref()
				.map(TraceId::from)
				.unwrap_or_else(TraceId::generate);
			cash_out(config, trace_id).await
		}
		Some(Commands::Recover { transaction_id }) => recover(config, transaction_id).await,
	}
}

/// The command line wins over the configuration file.
fn log_level<'a>(cli: Option<&'a str>, config: &'a Config) -> &'a str {
	cli.unwrap_or(&config.service.log_level)
}

async fn start_service(config: Config) -> Result<()> {
	info!("Starting {}", config.service.name);

	let service = CashoutService::build(config).await?;
	let logger = tokio::spawn(service::log_events(service.orchestrator.subscribe()));
	service.startup().await?;

	info!("Cash-out service started");
	shutdown_signal().await;
	info!("Shutdown signal received");

	let dropped = service.orchestrator.shutdown().await;
	if dropped > 0 {
		warn!("Dropped {} queued transfer requests", dropped);
	}
	if let Some(trace_id) = service.orchestrator.current_trace_id().await {
		info!("Transfer {} left for recovery at next start", trace_id);
	}
	logger.abort();

	info!("Cash-out service stopped");
	Ok(())
}

fn validate_config(config: &Config) {
	info!("Configuration is valid");
	info!("Service name: {}", config.service.name);
	info!("Storage backend: {}", config.storage.backend);
	info!("Settlement providers in order:");
	for provider in &config.providers {
		info!(
			"  {} ({}){}",
			provider.provider_type,
			provider.implementation,
			if provider.permitted { "" } else { " [not permitted]" }
		);
	}
}

async fn cash_out(config: Config, trace_id: TraceId) -> Result<()> {
	let service = CashoutService::build(config).await?;
	service.startup().await?;

	let mut events = service.orchestrator.subscribe();
	let admission = service
		.orchestrator
		.transfer_out(TransferReason::CashOut, trace_id.clone())
		.await
		.context("Cash-out rejected")?;
	info!("Cash-out {} accepted: {:?}", trace_id, admission);

	report(service.wait_for_outcome(&mut events, &trace_id).await?);
	Ok(())
}

async fn recover(config: Config, transaction_id: Option<TransactionId>) -> Result<()> {
	let service = CashoutService::build(config).await?;
	let mut events = service.orchestrator.subscribe();
	service.startup().await?;

	// startup may already have resumed a self-initiated transfer
	let trace_id = match service.recovery.recover(transaction_id).await? {
		RecoveryOutcome::Started(trace_id) | RecoveryOutcome::AlreadyRunning(trace_id) => trace_id,
		RecoveryOutcome::NothingToRecover => {
			info!("Nothing to recover");
			return Ok(());
		}
	};

	report(service.wait_for_outcome(&mut events, &trace_id).await?);
	Ok(())
}

fn report(outcome: Option<TransferEvent>) {
	match outcome {
		Some(TransferEvent::Completed {
			transferred,
			trace_id,
			..
		}) => info!("Transfer {} completed: moved {}", trace_id, transferred),
		Some(TransferEvent::Failed {
			remaining,
			trace_id,
		}) => warn!("Transfer {} failed, {} not transferred", trace_id, remaining),
		Some(TransferEvent::Started { .. }) => {}
		None => warn!("Transfer suspended; run `cashout recover` to resume it"),
	}
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to install Ctrl+C handler: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!("Failed to install signal handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
