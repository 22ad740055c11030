use crate::{
    controller::ControllerSettings,
    deployment::{
        DeploymentEnv,
        DeploymentStore,
    },
    wallets,
};
use alloy_primitives::{
    Address,
    address,
};
use clap::{
    ArgGroup,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};
use tracing::info;
use url::Url;

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet-rpc.monad.xyz";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_TESTNET_EXPLORER_URL: &str = "https://testnet.monadexplorer.com";
pub const TESTNET_CHAIN_ID: u64 = 10143;
pub const DEFAULT_TESTNET_CONTRACT: Address =
    address!("0xB6B9918C5880f7a1A4C65c4C4B6297956B4c39AD");

#[derive(Parser, Debug)]
#[command(
    name = "seven-up-down",
    about = "Play Seven Up Seven Down against the on-chain game contract",
    version,
    group(ArgGroup::new("network").args(["testnet", "local"]))
)]
pub struct Cli {
    /// Play on Monad testnet (default)
    #[arg(long)]
    pub testnet: bool,

    /// Play against a local node (anvil)
    #[arg(long)]
    pub local: bool,

    /// Override the RPC URL of the selected network
    #[arg(long, env = "SEVEN_UP_DOWN_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Game contract address (defaults to the latest recorded deployment)
    #[arg(long, env = "SEVEN_UP_DOWN_CONTRACT")]
    pub contract: Option<Address>,

    /// Block explorer base URL used for transaction links
    #[arg(long, env = "SEVEN_UP_DOWN_EXPLORER_URL")]
    pub explorer_url: Option<String>,

    /// Foundry keystore name to sign with
    #[arg(long, env = "SEVEN_UP_DOWN_KEYSTORE", conflicts_with = "private_key")]
    pub keystore: Option<String>,

    /// Override the keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long, env = "SEVEN_UP_DOWN_KEYSTORE_DIR")]
    pub keystore_dir: Option<String>,

    /// Raw private key, for local development
    #[arg(long, env = "SEVEN_UP_DOWN_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Wait after a resolution before reading the bet back
    #[arg(long, env = "SEVEN_UP_DOWN_SETTLE_DELAY_MS", default_value_t = 2000)]
    pub settle_delay_ms: u64,

    /// Reads after a resolution before giving up on seeing it resolved
    #[arg(long, env = "SEVEN_UP_DOWN_SETTLE_ATTEMPTS", default_value_t = 5)]
    pub settle_attempts: u32,

    /// Dice animation frame interval
    #[arg(long, env = "SEVEN_UP_DOWN_ROLL_INTERVAL_MS", default_value_t = 100)]
    pub roll_interval_ms: u64,

    /// Directory for log files
    #[arg(long, env = "SEVEN_UP_DOWN_LOG_DIR", default_value = ".logs")]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive game (default)
    Play,
    /// Print the account, active bet and house balance, then exit
    Status,
    /// Remember a deployed game contract for the selected network
    RecordDeployment {
        #[arg(long)]
        address: Address,
        #[arg(long)]
        tx_hash: Option<String>,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkTarget {
    Testnet { url: Url },
    Local { url: Url },
}

impl NetworkTarget {
    pub fn url(&self) -> &Url {
        match self {
            NetworkTarget::Testnet { url } | NetworkTarget::Local { url } => url,
        }
    }

    pub fn env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Testnet { .. } => DeploymentEnv::Testnet,
            NetworkTarget::Local { .. } => DeploymentEnv::Local,
        }
    }

    pub fn default_explorer_url(&self) -> Option<&'static str> {
        match self {
            NetworkTarget::Testnet { .. } => Some(DEFAULT_TESTNET_EXPLORER_URL),
            NetworkTarget::Local { .. } => None,
        }
    }

    pub fn default_contract(&self) -> Option<Address> {
        match self {
            NetworkTarget::Testnet { .. } => Some(DEFAULT_TESTNET_CONTRACT),
            NetworkTarget::Local { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignerSource {
    Keystore { name: String, dir: PathBuf },
    PrivateKey(String),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub contract: Option<Address>,
    pub explorer_url: Option<String>,
    pub signer: Option<SignerSource>,
    pub settings: ControllerSettings,
    pub log_dir: PathBuf,
    pub command: Command,
}

impl Cli {
    pub fn into_config(self) -> Result<AppConfig> {
        let network = if self.local {
            NetworkTarget::Local {
                url: match self.rpc_url {
                    Some(url) => url,
                    None => parse_default_url(DEFAULT_LOCAL_RPC_URL)?,
                },
            }
        } else {
            NetworkTarget::Testnet {
                url: match self.rpc_url {
                    Some(url) => url,
                    None => parse_default_url(DEFAULT_TESTNET_RPC_URL)?,
                },
            }
        };

        let explorer_url = self
            .explorer_url
            .or_else(|| network.default_explorer_url().map(str::to_string));

        let signer = match (self.keystore, self.private_key) {
            (Some(name), _) => Some(SignerSource::Keystore {
                name,
                dir: wallets::resolve_keystore_dir(self.keystore_dir.as_deref())?,
            }),
            (None, Some(key)) => Some(SignerSource::PrivateKey(key)),
            (None, None) => None,
        };

        let settings = ControllerSettings {
            roll_interval: Duration::from_millis(self.roll_interval_ms.max(1)),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            settle_attempts: self.settle_attempts.max(1),
        };

        Ok(AppConfig {
            network,
            contract: self.contract,
            explorer_url,
            signer,
            settings,
            log_dir: self.log_dir,
            command: self.command.unwrap_or(Command::Play),
        })
    }
}

impl AppConfig {
    /// The game contract to talk to, looking at recorded deployments when no address was given.
    pub fn resolve_contract(&self) -> Result<Option<Address>> {
        if self.contract.is_some() {
            return Ok(self.contract);
        }
        let store = DeploymentStore::new(self.network.env())
            .wrap_err("opening deployment store")?;
        let recorded = store.latest()?.map(|record| record.contract_address);
        let contract = pick_contract(None, recorded, &self.network);
        info!(?contract, network = %self.network.env(), "resolved game contract");
        Ok(contract)
    }
}

pub fn pick_contract(
    explicit: Option<Address>,
    recorded: Option<Address>,
    network: &NetworkTarget,
) -> Option<Address> {
    explicit
        .or(recorded)
        .or_else(|| network.default_contract())
}

fn parse_default_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| eyre!("invalid built-in RPC URL {raw}: {e}"))
}
