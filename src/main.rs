mod config;
mod confirm;
mod db;
mod engine;
mod models;
mod remote;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use console::style;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
	config::PoolSyncConfig,
	confirm::{ConfirmationGate, TerminalPrompt},
	db::LazyCatalog,
	engine::{RunSummary, SyncError},
	remote::LocalFs,
};

/// Inventory audio files on a mounted day/pool tree into the track catalog
#[derive(Parser)]
#[command(name = "poolsync")]
#[command(version)]
struct Cli {
	#[arg(short, long, env = "POOLSYNC_CONFIG", help = "TOML config file")]
	config: Option<PathBuf>,

	#[arg(long, env = "POOLSYNC_MOUNT_ROOT", help = "Local mount point of the storage tree")]
	mount_root: Option<PathBuf>,

	#[arg(long, env = "POOLSYNC_BASE_PATH", help = "Tree root below the mount, e.g. DJPOOLS/JAN")]
	base_path: Option<String>,

	#[arg(long, help = "Records per catalog upsert")]
	batch_size: Option<usize>,

	#[arg(long = "database", env = "POOLSYNC_DATABASE_PATH", help = "Catalog database path")]
	database_path: Option<PathBuf>,

	#[arg(short, long, help = "Upload without asking")]
	yes: bool,

	#[arg(long, help = "Print the run summary as JSON")]
	json: bool,

	#[arg(long, help = "Also write logs to this file")]
	log_file: Option<PathBuf>,
}

impl Cli {
	fn resolve_config(&self) -> anyhow::Result<PoolSyncConfig> {
		let mut config = match &self.config {
			Some(path) => PoolSyncConfig::load(path)?,
			None => PoolSyncConfig::default(),
		};
		if let Some(root) = &self.mount_root {
			config.mount_root = root.clone();
		}
		if let Some(base) = &self.base_path {
			config.base_path = base.clone();
		}
		if let Some(size) = self.batch_size {
			config.batch_size = size;
		}
		if let Some(path) = &self.database_path {
			config.database_path = path.clone();
		}
		config.validate()?;
		Ok(config)
	}
}

fn init_logging(log_file: Option<&std::path::Path>) {
	let file_layer = log_file.map(|path| {
		let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
		let name = path.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("poolsync.log"));
		let file_appender = tracing_appender::rolling::never(dir, name);
		fmt::layer().with_ansi(false).with_writer(file_appender)
	});

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(fmt::layer().with_writer(std::io::stderr))
		.with(file_layer)
		.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();
	init_logging(cli.log_file.as_deref());

	let config = cli.resolve_config()?;
	let remote = LocalFs::new(&config.mount_root);
	info!(root = %remote.root().display(), base_path = %config.base_path, "starting crawl");

	let crawl = engine::crawl(&remote, &config.crawl_options()).await?;
	eprintln!(
		"{} {} records in {} pools across {} days",
		style("found").green().bold(),
		crawl.records.len(),
		crawl.pools_seen,
		crawl.days_seen
	);
	for skipped in crawl.days_skipped.iter().chain(&crawl.pools_skipped) {
		eprintln!("{} {} ({})", style("skipped").yellow(), skipped.path, skipped.reason);
	}

	let catalog = LazyCatalog::new(&config.database_path, config.namespace.clone(), config.database.clone());

	let gate: Box<dyn ConfirmationGate> = if cli.yes {
		Box::new(true)
	} else {
		Box::new(TerminalPrompt::new())
	};
	let sync = match engine::synchronize(&catalog, &crawl.records, gate.as_ref(), &config.sync_options()).await {
		Ok(sync) => sync,
		Err(SyncError::StoreUnavailable { report, last }) => {
			println!("{}", RunSummary::new(&crawl, &report).render(cli.json)?);
			anyhow::bail!("catalog store unavailable for every batch: {last}");
		}
		Err(err) => return Err(err.into()),
	};

	if let Some(handle) = catalog.opened().filter(|_| sync.batches_succeeded > 0) {
		let rows = handle.count_tracks().await?;
		info!(written = sync.records_written, rows, "catalog updated");
	}

	let summary = RunSummary::new(&crawl, &sync);
	println!("{}", summary.render(cli.json)?);

	Ok(if summary.is_failure() {
		ExitCode::FAILURE
	} else {
		ExitCode::SUCCESS
	})
}
