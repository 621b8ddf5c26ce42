//! Treeline CLI - Main entry point.

use treeline::cli::{Cli, Commands};
use treeline::config::TreelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Serve {
            node_id,
            hostname,
            log_port,
            metrics_addr,
        } => {
            let mut config = match &cli.config {
                Some(path) => TreelineConfig::from_file(path)?,
                None => TreelineConfig::default(),
            };

            if let Some(node_id) = node_id {
                config.node.id = node_id;
            }
            if let Some(hostname) = hostname {
                config.node.hostname = hostname;
            }
            if let Some(log_port) = log_port {
                config.node.log_port = log_port;
            }
            if let Some(metrics_addr) = metrics_addr {
                config.observability.metrics_addr = metrics_addr.parse()?;
            }
            config.observability.log_level = cli.log_level;
            config.validate()?;

            treeline::run(config).await?;
        }

        Commands::Version => {
            println!("Treeline v{}", env!("CARGO_PKG_VERSION"));
            println!("Cluster serving coordination for Certificate Transparency log nodes");
        }
    }

    Ok(())
}
