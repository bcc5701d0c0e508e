use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use cloudprep::api::{Cloud, PortSpec, PrepareInput};
use cloudprep::auth::{self, AuthStorage, oauth, storage::Credential};
use cloudprep::config::{Config, INFRA_ID_KEY, PROJECT_ID_KEY, REGION_KEY};
use cloudprep::consts::{GCP_PROVIDER, default_db_path, default_internal_ports};
use cloudprep::gcp::client::rest::RestComputeClient;
use cloudprep::gcp::{CloudInfo, GcpCloud};
use cloudprep::reporter::StdoutReporter;

#[derive(Debug, Clone, ValueEnum)]
enum Provider {
    Gcp,
}

#[derive(Parser)]
#[command(
    name = "cloudprep",
    version,
    about = "Open the ports a multi-cluster overlay needs, and close them again."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database for credentials and config (default: ~/.cloudprep/cloudprep.db)
    #[arg(short, long, global = true)]
    db: Option<String>,
}

/// Which cluster to act on. Unset flags fall back to `cloudprep config`.
#[derive(Args)]
struct Target {
    /// Cloud provider
    #[arg(short, long, value_enum, default_value_t = Provider::Gcp)]
    provider: Provider,

    /// Project that owns the cluster network
    #[arg(long)]
    project_id: Option<String>,

    /// Cluster infrastructure ID
    #[arg(long)]
    infra_id: Option<String>,

    /// Cluster region, only used for log context
    #[arg(long)]
    region: Option<String>,

    /// Override the Compute API endpoint
    #[arg(long, value_name = "URL")]
    compute_url: Option<String>,

    /// Return as soon as the API accepts a change
    #[arg(long, default_value_t = false)]
    no_wait: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Open internal ports between cluster nodes
    Prepare {
        #[command(flatten)]
        target: Target,

        /// Port to open, as PORT/PROTOCOL (repeatable; default: 4800/udp, 8080/tcp, 8081/tcp)
        #[arg(long = "port", value_name = "PORT/PROTOCOL")]
        ports: Vec<PortSpec>,
    },
    /// Remove what `prepare` created
    Cleanup {
        #[command(flatten)]
        target: Target,
    },
    /// Read or write stored defaults
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Store GCP credentials
    Login {
        /// Use this access token as-is
        #[arg(long, conflicts_with = "adc")]
        token: Option<String>,

        /// Import an application default credentials file (default: gcloud's)
        #[arg(long, value_name = "PATH")]
        adc: Option<PathBuf>,
    },
    /// Forget stored GCP credentials
    Logout,
}

#[derive(Subcommand)]
enum ConfigAction {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = open_db_path(cli.db)?;

    match cli.command {
        Command::Prepare { target, ports } => {
            let internal_ports = if ports.is_empty() {
                default_internal_ports()
            } else {
                ports
            };
            let cloud = build_cloud(&db, target)?;
            cloud
                .prepare(&PrepareInput { internal_ports }, &StdoutReporter)
                .await
        }
        Command::Cleanup { target } => {
            let cloud = build_cloud(&db, target)?;
            cloud.cleanup(&StdoutReporter).await
        }
        Command::Config { action } => handle_config(&db, action),
        Command::Login { token, adc } => handle_login(&db, token, adc),
        Command::Logout => {
            auth::logout(&db, GCP_PROVIDER)?;
            println!("✓ Logged out from GCP.");
            Ok(())
        }
    }
}

/// Resolve the database path and make sure its directory exists.
fn open_db_path(flag: Option<String>) -> Result<String> {
    let path = match flag {
        Some(path) => return Ok(path),
        None => default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("database path is not valid UTF-8: {}", path.display()))
}

fn build_cloud(db: &str, target: Target) -> Result<Box<dyn Cloud>> {
    let config = Config::open(db)?;

    match target.provider {
        Provider::Gcp => {
            let project_id = config.resolve(target.project_id, "project-id", PROJECT_ID_KEY)?;
            let infra_id = config.resolve(target.infra_id, "infra-id", INFRA_ID_KEY)?;
            let region = config.resolve_optional(target.region, REGION_KEY)?;

            let tokens = Arc::new(AuthStorage::open(db)?);
            let mut client = RestComputeClient::new(tokens).wait_for_operations(!target.no_wait);
            if let Some(url) = target.compute_url {
                client = client.with_base_url(url);
            }

            Ok(Box::new(GcpCloud::new(CloudInfo {
                infra_id,
                region,
                project_id,
                client: Arc::new(client),
            })))
        }
    }
}

fn handle_config(db: &str, action: ConfigAction) -> Result<()> {
    let config = Config::open(db)?;
    match action {
        ConfigAction::Get { key } => match config.get(&key)? {
            Some(value) => println!("{value}"),
            None => eprintln!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            println!("✓ {key} = {value}");
        }
        ConfigAction::Unset { key } => {
            config.remove(&key)?;
            println!("✓ {key} unset");
        }
        ConfigAction::List => {
            for (key, value) in config.list()? {
                println!("{key} = {value}");
            }
        }
    }
    Ok(())
}

fn handle_login(db: &str, token: Option<String>, adc: Option<PathBuf>) -> Result<()> {
    let credential = match token {
        Some(token) => Credential::AccessToken { token },
        None => {
            let path = adc
                .or_else(oauth::default_adc_path)
                .ok_or_else(|| anyhow!("cannot locate application default credentials"))?;
            println!("Importing credentials from {}", path.display());
            Credential::AuthorizedUser(oauth::load_application_default(&path)?)
        }
    };

    auth::login(db, GCP_PROVIDER, credential)?;
    println!("✓ Logged in to GCP.");
    println!("  Credentials saved to {db}");
    Ok(())
}
