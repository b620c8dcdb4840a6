use clap::{Parser, Subcommand};
use cruise_exporter::collector::CollectorEngine;
use cruise_exporter::config::ConfigLoader;
use cruise_exporter::fetcher::HttpFetcher;
use cruise_exporter::metrics::{CollectorStats, MetricSet};
use cruise_exporter::server::{self, ServerState};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "cruise-exporter")]
#[command(version = "0.1.0")]
#[command(about = "Exports cruise search prices and request timings as Prometheus gauges", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured targets and serve /metrics
    Run {
        /// Path to the configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the listen address from the config
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info"); }
    }
    let cli = Cli::parse();
    env_logger::Builder::from_default_env().init();

    match cli.command {
        Commands::Run { config, listen } => {
            log::info!("Loading config from {:?}", config);
            let config_data = ConfigLoader::load(&config)?;
            let listen_addr = listen.unwrap_or_else(|| config_data.listen_addr.clone());

            let metrics = MetricSet::new(&config_data.namespace)?;
            let stats = CollectorStats::new();
            let fetcher = Arc::new(HttpFetcher::new(
                &config_data.user_agent,
                config_data.request_timeout(),
            )?);
            let engine = Arc::new(CollectorEngine::new(fetcher, metrics.clone(), Some(stats.clone())));
            let cancel = CancellationToken::new();

            let listener = TcpListener::bind(&listen_addr).await?;
            let server_task = tokio::spawn(server::serve(
                listener,
                ServerState::new(metrics, stats, engine.watch_state()),
                cancel.clone(),
            ));

            let collector_task = tokio::spawn({
                let engine = engine.clone();
                let cancel = cancel.clone();
                let interval = config_data.interval();
                let targets = config_data.targets.clone();
                async move { engine.run(cancel, interval, &targets).await }
            });

            supervise(tokio::signal::ctrl_c(), server_task, collector_task, cancel).await?;

            let final_stats = engine.get_stats();
            println!("\n✅ Exporter stopped:");
            println!("   Cycles: {}", final_stats.cycles_completed);
            println!("   Pages Fetched: {}", final_stats.pages_fetched);
            println!("   Rows Recorded: {}", final_stats.rows_recorded);
            println!("   Fetch Failures: {}", final_stats.fetch_failures);
            println!("   Uptime: {:.1}s", final_stats.uptime_seconds);
        }
        Commands::Check { config } => {
            match ConfigLoader::load(&config) {
                Ok(cfg) => {
                    println!("✅ Config is valid:");
                    println!("   Targets: {:?}", cfg.targets);
                    println!("   Interval: {}s", cfg.interval_secs);
                    println!("   Namespace: {}", cfg.namespace);
                    println!("   Listen: {}", cfg.listen_addr);
                }
                Err(e) => {
                    eprintln!("❌ Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Waits for `shutdown` or for the metrics server to stop, whichever comes
/// first. Either way the collector is cancelled and joined.
async fn supervise(
    shutdown: impl Future<Output = std::io::Result<()>>,
    mut server_task: JoinHandle<cruise_exporter::Result<()>>,
    collector_task: JoinHandle<()>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tokio::select! {
        signal = shutdown => {
            signal?;
            log::info!("Shutting down...");
            cancel.cancel();
            collector_task.await?;
            server_task.await??;
            Ok(())
        }
        served = &mut server_task => {
            log::error!("Metrics endpoint stopped, stopping collector");
            cancel.cancel();
            collector_task.await?;
            served??;
            anyhow::bail!("metrics endpoint exited before shutdown was requested")
        }
    }
}
