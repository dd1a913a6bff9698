use clap::Parser;
use labnet_sim::{
    cli::{Cli, Commands},
    run, SimConfig,
};
use tracing::{error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { out } => {
            SimConfig::default().save_to_file(&out)?;
            println!("wrote {}", out.display());
            Ok(())
        }
        Commands::Run(args) => {
            // The guard must outlive the workload or buffered lines are lost.
            let (file_layer, _guard) = match &args.log_file {
                Some(path) => {
                    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
                    let name = path.file_name().unwrap_or(path.as_os_str());
                    let appender = tracing_appender::rolling::never(dir, name);
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
                    (Some(layer), Some(guard))
                }
                None => (None, None),
            };

            let stdout_layer = tracing_subscriber::fmt::layer();
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info,labnet_sim=debug".into()),
                )
                .with(file_layer)
                .with(stdout_layer)
                .init();

            let mut cfg = SimConfig::load_or_create(&args.config)?;
            args.apply(&mut cfg);

            info!("config: {}", args.config.display());
            info!(
                "{} clients x {} ops, unreliable={}, long_reordering={}, long_delays={}",
                cfg.clients, cfg.ops_per_client, cfg.unreliable, cfg.long_reordering, cfg.long_delays
            );

            match run(&cfg).await {
                Ok(report) => {
                    info!("all counters verified, server handled {} rpcs", report.server_rpcs);
                    Ok(())
                }
                Err(e) => {
                    error!("workload failed: {}", e);
                    Err(e.into())
                }
            }
        }
    }
}
