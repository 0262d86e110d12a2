use clap::Parser;
use simple_ssh_ca::config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "/etc/simple-ssh-ca/ca.json";

#[derive(Parser)]
#[command(name = "simple-ssh-ca")]
#[command(about = "Validate and normalize an SSH CA configuration", long_about = None)]
struct Cli {
    /// Path to config file (JSON)
    #[arg(short = 'c', long, env = "SSH_CA_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write the validated configuration, with defaults filled in, to this path
    #[arg(short = 'w', long)]
    write: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simple_ssh_ca=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from {}", cli.config.display());
    let mut config = Config::load(&cli.config)?;

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    tracing::info!("Configuration is valid");
    tracing::info!("Address: {}", config.address);
    tracing::info!("DNS names: {}", config.dns_names.join(", "));
    if let Some(tls) = &config.tls {
        tracing::info!(
            "TLS: versions {}-{}, {} cipher suites, renegotiation={}",
            tls.min_version,
            tls.max_version,
            tls.cipher_suites.len(),
            tls.renegotiation
        );
    }
    if let Some(authority) = &config.authority {
        tracing::info!("Provisioners: {}", authority.provisioners.len());
        tracing::info!(
            "Certificate duration: min {}s, max {}s",
            authority.min_cert_duration().num_seconds(),
            authority.max_cert_duration().num_seconds()
        );
    }

    if let Some(path) = cli.write {
        config.save(&path)?;
        tracing::info!("Normalized configuration written to {}", path.display());
    }

    Ok(())
}
