mod intent;

use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser};
use intent::CliIntent;
use log::info;
use poa_rs::relay::RelayApi;
use poa_rs::tee::TdxMode;
use poa_rs::{AttestationProvider, ClaimWorkflow, PoaConfig, RelayClient};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum ClaimCommand {
    /// Print the assets the relay can issue and their explorers.
    #[command(name = "assets")]
    Assets(CommonOptions),
    /// Claim assets to a recipient address.
    #[command(name = "run")]
    Run(RunOptions),
}

#[derive(Parser, Debug, Clone)]
struct CommonOptions {
    /// Relay base URL. Defaults to `PROOF_OF_AGENT_RELAY` or the public relay.
    #[arg(long)]
    relay: Option<String>,

    /// TDX mode (OFF, LOCAL, DOCKER, PRODUCTION). Overrides `TEE_MODE`.
    #[arg(long)]
    tee_mode: Option<String>,

    /// Whether to attest with SGX. Overrides `SGX`.
    #[arg(
        long,
        default_missing_value("true"),
        num_args(0..=1),
        require_equals(true),
        action = ArgAction::Set,
    )]
    sgx: Option<bool>,
}

#[derive(Parser, Debug, Clone)]
struct RunOptions {
    #[command(flatten)]
    common: CommonOptions,

    /// The address to send the claimed assets to.
    #[arg(long)]
    recipient: Option<String>,

    /// Asset to claim, may be repeated.
    #[arg(long = "asset")]
    assets: Vec<String>,
}

fn load_config(opts: &CommonOptions) -> Result<PoaConfig> {
    let mut config = PoaConfig::from_env()?;
    if let Some(relay) = &opts.relay {
        config.relay_url = relay.clone();
    }
    if let Some(tee_mode) = &opts.tee_mode {
        config.tee_mode = TdxMode::from_id_str(tee_mode)?;
    }
    if let Some(sgx) = opts.sgx {
        config.sgx = sgx;
    }
    Ok(config)
}

async fn print_assets(opts: CommonOptions) -> Result<()> {
    let config = load_config(&opts)?;
    let relay = RelayClient::new(&config)?;
    let catalog = relay.query_asset_catalog().await?;
    for (asset, explorer) in catalog.assets().iter().zip(catalog.explorers()) {
        println!("{asset}\t{explorer}");
    }
    Ok(())
}

async fn run_claim(opts: RunOptions) -> Result<bool> {
    let config = load_config(&opts.common)?;
    if !config.tee_enabled() {
        info!("No TEE enabled, the claim will be refused");
    }

    let provider = Arc::new(AttestationProvider::new(&config)?);
    let relay = Arc::new(RelayClient::new(&config)?);
    let extractor = Arc::new(CliIntent::new(opts.recipient, opts.assets));
    let workflow = ClaimWorkflow::new(provider, relay, extractor);

    let outcome = workflow.run("").await;
    println!("{}", outcome.message);
    Ok(outcome.success)
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("POA_RS_LOG_LEVEL", "info")
        .write_style_or("POA_RS_LOG_STYLE", "always");
    env_logger::Builder::from_env(env).init();

    let command = ClaimCommand::parse();
    match command {
        ClaimCommand::Assets(opts) => print_assets(opts).await?,
        ClaimCommand::Run(opts) => {
            if !run_claim(opts).await? {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
