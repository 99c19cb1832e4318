//! DRA GPU Kubelet Plugin
//!
//! Prepares simulated GPUs for `ResourceClaim`s on this node and keeps the
//! prepared state in a checkpoint across restarts.

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use dra_gpu_api::{default_gpu_config, v1alpha1};
use dra_gpu_plugin::{
    observability::{init_tracing, TracingConfig},
    version, ClaimUid, DeviceRequest, DeviceState, PluginConfig,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dra-gpu-plugin")]
#[command(about = "DRA kubelet plugin for shared GPUs", version = version::VERSION)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the config file and environment.
#[derive(Args)]
struct SettingsArgs {
    /// Plugin config file (YAML)
    #[arg(long, global = true, env = "PLUGIN_CONFIG")]
    config: Option<PathBuf>,

    /// Node name
    #[arg(long, global = true)]
    node_name: Option<String>,

    /// Number of simulated GPUs
    #[arg(long, global = true)]
    num_devices: Option<u32>,

    /// Space partitions per GPU
    #[arg(long, global = true)]
    partitions_per_device: Option<u32>,

    /// Directory holding the checkpoint
    #[arg(long, global = true)]
    plugin_data_dir: Option<PathBuf>,
}

impl SettingsArgs {
    fn load(&self) -> anyhow::Result<PluginConfig> {
        let mut config =
            PluginConfig::load(self.config.as_deref()).context("Failed to load plugin config")?;

        if let Some(node_name) = &self.node_name {
            config.node_name = node_name.clone();
        }
        if let Some(num_devices) = self.num_devices {
            config.num_devices = num_devices;
        }
        if let Some(partitions) = self.partitions_per_device {
            config.partitions_per_device = partitions;
        }
        if let Some(dir) = &self.plugin_data_dir {
            config.plugin_data_dir = dir.clone();
        }

        config.validate().context("Invalid plugin config")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Recover state and serve until interrupted
    Run,
    /// Prepare devices for a claim and print their descriptors (plugin stopped)
    Prepare {
        /// UID of the ResourceClaim
        #[arg(long)]
        claim_uid: String,
        /// GpuConfig file (YAML or JSON); the default config when omitted
        #[arg(long)]
        config_file: Option<PathBuf>,
        /// Devices to time-share
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Release the devices prepared for a claim (plugin stopped)
    Unprepare {
        /// UID of the ResourceClaim
        #[arg(long)]
        claim_uid: String,
    },
    /// Print prepared claims and device usage (plugin stopped)
    Status,
    /// Print the GpuConfig applied to claims without one
    DefaultConfig,
    /// Print build information
    Version,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    checkpoint: PathBuf,
    claims: dra_gpu_plugin::state::Claims,
    devices: Vec<dra_gpu_plugin::device::DeviceUsage>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::DefaultConfig => {
            print!("{}", serde_yaml::to_string(&default_gpu_config())?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", version::build_info());
            Ok(())
        }
        command => {
            init_tracing(TracingConfig::from_env())
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
            let config = cli.settings.load()?;
            run_command(command, config).await
        }
    }
}

async fn open_state(config: &PluginConfig) -> anyhow::Result<DeviceState> {
    let (state, report) = DeviceState::open(config)
        .await
        .with_context(|| format!("Failed to open state in {}", config.plugin_data_dir.display()))?;

    for conflict in &report.dropped {
        warn!(error = %conflict, "Dropped checkpointed claim");
    }
    Ok(state)
}

async fn run_command(command: Commands, config: PluginConfig) -> anyhow::Result<()> {
    let state = open_state(&config).await?;

    match command {
        Commands::Run => {
            info!(
                version = %version::full_version(),
                driver = version::DRIVER_NAME,
                node = %config.node_name,
                "Starting dra-gpu-plugin"
            );
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Shutting down");
            state.flush().await.context("Failed to flush checkpoint")?;
        }
        Commands::Prepare {
            claim_uid,
            config_file,
            count,
        } => {
            let gpu_config = match config_file {
                Some(path) => {
                    let raw = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    Some(v1alpha1::decode(&raw)?)
                }
                None => None,
            };

            let uid = ClaimUid::from(claim_uid);
            state
                .prepare(&uid, DeviceRequest::new(gpu_config, count))
                .await
                .with_context(|| format!("Failed to prepare claim {uid}"))?;
            let claim = state
                .get(&uid)
                .await
                .with_context(|| format!("Claim {uid} missing after prepare"))?;
            println!("{}", serde_json::to_string_pretty(&claim.descriptors())?);
        }
        Commands::Unprepare { claim_uid } => {
            let uid = ClaimUid::from(claim_uid);
            state
                .unprepare(&uid)
                .await
                .with_context(|| format!("Failed to unprepare claim {uid}"))?;
        }
        Commands::Status => {
            let status = Status {
                checkpoint: state.checkpoint_path().await,
                claims: state.prepared_claims().await,
                devices: state.pool_snapshot().await,
            };
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::DefaultConfig | Commands::Version => {}
    }

    Ok(())
}
