//! ec2ping
//!
//! Command line driver for EC2 peer discovery: prints the local identity,
//! resolves candidate endpoints once, or keeps resolving them on an interval.

mod version;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ec2ping::observability::{init_tracing, TracingConfig};
use ec2ping::{BuiltinProvider, CandidateEndpoint, DiscoveryLifecycle, IdentityProbe, PingConfig, RetryPolicy};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ec2ping")]
#[command(about = "Resolve cluster peers from the EC2 inventory")]
struct Cli {
    /// Log output format: text or json
    #[arg(long, global = true, env = "EC2PING_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the local instance identity document
    Identity {
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },
    /// Run one discovery round and print the candidate endpoints
    Resolve {
        #[command(flatten)]
        discovery: DiscoveryArgs,
        /// Print endpoints as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Run discovery rounds periodically until interrupted
    Watch {
        #[command(flatten)]
        discovery: DiscoveryArgs,
        /// Seconds between rounds
        #[arg(long, env = "EC2PING_INTERVAL", default_value_t = 30)]
        interval: u64,
        /// Seconds a single round may take before it is abandoned
        #[arg(long, env = "EC2PING_ROUND_TIMEOUT", default_value_t = 20)]
        round_timeout: u64,
    },
    /// Print build information
    Version {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct DiscoveryArgs {
    /// Comma separated tag names shared by every cluster member
    #[arg(long, env = "EC2PING_TAGS")]
    tags: Option<String>,

    /// Filters, e.g. "instance-state-name=running;instance-type=m5.large"
    #[arg(long, env = "EC2PING_FILTERS")]
    filters: Option<String>,

    #[arg(long, env = "EC2PING_ACCESS_KEY")]
    access_key: Option<String>,

    #[arg(long, env = "EC2PING_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Named credentials strategy (default, environment, profile, instance_profile, ecs)
    #[arg(long, env = "EC2PING_CREDENTIALS_PROVIDER")]
    credentials_provider: Option<String>,

    /// Older name of --credentials-provider; the value is still a registry name
    #[arg(long, env = "EC2PING_CREDENTIALS_PROVIDER_CLASS", hide = true)]
    credentials_provider_class: Option<String>,

    #[arg(long, env = "EC2PING_PORT_NUMBER", default_value_t = 7800)]
    port_number: u16,

    /// Additional ports probed after the base port
    #[arg(long, env = "EC2PING_PORT_RANGE", default_value_t = 50)]
    port_range: u16,

    /// Log request and fault body of failed inventory calls
    #[arg(long, env = "EC2PING_LOG_AWS_ERROR_MESSAGES")]
    log_aws_error_messages: bool,

    #[arg(long, env = "EC2PING_METADATA_ENDPOINT", default_value = "http://169.254.169.254")]
    metadata_endpoint: String,

    /// Overrides the regional EC2 endpoint
    #[arg(long, env = "EC2PING_INVENTORY_ENDPOINT")]
    inventory_endpoint: Option<String>,

    /// Per-request timeout for inventory calls, in seconds
    #[arg(long, env = "EC2PING_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,
}

impl DiscoveryArgs {
    fn into_config(self) -> PingConfig {
        PingConfig {
            access_key: self.access_key,
            secret_key: self.secret_key,
            credentials_provider: self
                .credentials_provider
                .or(self.credentials_provider_class)
                .unwrap_or_else(|| BuiltinProvider::Default.to_string()),
            filters: self.filters,
            tags: self.tags,
            port_number: self.port_number,
            port_range: self.port_range,
            log_aws_error_messages: self.log_aws_error_messages,
            metadata_endpoint: self.metadata_endpoint,
            inventory_endpoint: self.inventory_endpoint,
            request_timeout: Duration::from_secs(self.request_timeout),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(TracingConfig {
        log_format: cli.log_format.clone(),
        ..Default::default()
    })
    .map_err(|e| anyhow::anyhow!(e))
    .context("failed to initialize tracing")?;

    match cli.command {
        Commands::Identity { discovery } => print_identity(discovery.into_config()).await,
        Commands::Resolve { discovery, json } => resolve_once(discovery.into_config(), json).await,
        Commands::Watch {
            discovery,
            interval,
            round_timeout,
        } => {
            watch(
                discovery.into_config(),
                Duration::from_secs(interval.max(1)),
                Duration::from_secs(round_timeout.max(1)),
            )
            .await
        }
        Commands::Version { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&version::build_info_json())?);
            } else {
                println!("{}", version::build_info());
            }
            Ok(())
        }
    }
}

async fn print_identity(config: PingConfig) -> anyhow::Result<()> {
    let probe = IdentityProbe::from_config(&config)?;
    let identity = probe
        .fetch_with_retry(&RetryPolicy::from_config(&config))
        .await
        .context("could not read the instance identity")?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

async fn start(config: PingConfig) -> anyhow::Result<DiscoveryLifecycle> {
    info!(version = %version::full_version(), "Starting ec2ping");
    let mut lifecycle = DiscoveryLifecycle::new(config);
    lifecycle.init().await.context("discovery initialization failed")?;
    Ok(lifecycle)
}

fn print_endpoints(endpoints: &[CandidateEndpoint], json: bool) -> anyhow::Result<()> {
    if json {
        let rendered: Vec<String> = endpoints.iter().map(ToString::to_string).collect();
        println!("{}", serde_json::to_string(&rendered)?);
    } else {
        for endpoint in endpoints {
            println!("{endpoint}");
        }
    }
    Ok(())
}

async fn resolve_once(config: PingConfig, json: bool) -> anyhow::Result<()> {
    let mut lifecycle = start(config).await?;
    let result = lifecycle.try_round().await;
    lifecycle.stop();

    let endpoints = result.context("discovery round failed")?;
    print_endpoints(&endpoints, json)
}

async fn watch(config: PingConfig, interval: Duration, round_timeout: Duration) -> anyhow::Result<()> {
    let mut lifecycle = start(config).await?;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                match tokio::time::timeout(round_timeout, lifecycle.try_round()).await {
                    Ok(Ok(endpoints)) => print_endpoints(&endpoints, false)?,
                    Ok(Err(e)) => warn!(error = %e, "Round failed, no candidates this round"),
                    Err(_) => warn!(timeout_secs = round_timeout.as_secs(), "Round timed out"),
                }
            }
        }
    }

    lifecycle.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_args_map_to_config() {
        let cli = Cli::try_parse_from([
            "ec2ping",
            "resolve",
            "--tags",
            "Type,Environment",
            "--filters",
            "instance-state-name=running",
            "--port-range",
            "3",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve { discovery, json } => {
                assert!(json);
                let config = discovery.into_config();
                assert_eq!(config.tags.as_deref(), Some("Type,Environment"));
                assert_eq!(config.filters.as_deref(), Some("instance-state-name=running"));
                assert_eq!(config.port_number, 7800);
                assert_eq!(config.port_range, 3);
                assert_eq!(config.credentials_provider, "default");
                assert!(config.validate().is_ok());
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_credentials_provider_class_is_accepted() {
        let cli = Cli::try_parse_from([
            "ec2ping",
            "resolve",
            "--credentials-provider-class",
            "instance_profile",
        ])
        .unwrap();
        let Commands::Resolve { discovery, .. } = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(discovery.into_config().credentials_provider, "instance_profile");

        let cli = Cli::try_parse_from([
            "ec2ping",
            "resolve",
            "--credentials-provider",
            "ecs",
            "--credentials-provider-class",
            "instance_profile",
        ])
        .unwrap();
        let Commands::Resolve { discovery, .. } = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(discovery.into_config().credentials_provider, "ecs");
    }

    #[test]
    fn test_print_endpoints_json() {
        let endpoints = vec![CandidateEndpoint::new("10.0.0.1".parse().unwrap(), 7800)];
        assert!(print_endpoints(&endpoints, true).is_ok());
    }
}
