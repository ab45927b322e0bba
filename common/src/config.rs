// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
    pub toolkit: ToolkitConfig,
    pub datastore: DatastoreConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

/// Wallet login and admin PIN settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Dedicated bearer-token signing secret (`AUTH_SECRET`)
    pub secret: Option<String>,
    /// Admin PIN (`ADMIN_PIN`); also the second choice for token signing
    pub admin_pin: Option<String>,
    /// First line of the challenge message
    pub challenge_label: String,
    pub nonce_ttl_secs: i64,
    /// Explicit dev-fallback override (`AUTH_DEV_FALLBACK`)
    pub dev_fallback: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Path segment under `/mein/`
    pub path: String,
}

/// How the external deployment toolkit is invoked
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub program: String,
    /// Arguments placed before `<script> --network <network>`
    pub base_args: Vec<String>,
    pub network: String,
    pub working_dir: Option<String>,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
    pub rpc_api_key: Option<String>,
    pub rpc_url: Option<String>,
    pub deployer_pk: Option<String>,
    pub escrow_asset: Option<String>,
    /// Market factory; when set, deployments go through `createMarket`
    pub factory_addr: Option<String>,
    /// Market owner for factory deployments, defaults to the deployer
    pub resolver: Option<String>,
    pub fee_recipient: Option<String>,
    pub default_fee_bps: u32,
    pub default_name_prefix: String,
}

/// External datastore (PostgREST-style) the reconciler writes into
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    pub url: Option<String>,
    pub key: Option<String>,
    pub table: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub paths: Vec<String>,
    pub max_requests: usize,
    pub window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            admin_pin: None,
            challenge_label: "Picks Operations Gateway".to_string(),
            nonce_ttl_secs: 600,
            dev_fallback: None,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            path: "konsole".to_string(),
        }
    }
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            base_args: vec!["hardhat".to_string(), "run".to_string()],
            network: "bscMainnet".to_string(),
            working_dir: None,
            timeout_secs: 600,
            max_output_bytes: 256 * 1024,
            rpc_api_key: None,
            rpc_url: None,
            deployer_pk: None,
            escrow_asset: None,
            factory_addr: None,
            resolver: None,
            fee_recipient: None,
            default_fee_bps: 300,
            default_name_prefix: "Pick".to_string(),
        }
    }
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            table: "picks".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            paths: vec![
                "/auth-nonce".to_string(),
                "/auth-verify".to_string(),
                "/mein/".to_string(),
            ],
            max_requests: 20,
            window_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP", e.g. APP__AUTH__SECRET
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Layered configuration, then the plain deployment variables on top.
    pub fn from_env() -> Self {
        let mut config = match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to defaults and plain environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| env::var(key).ok());
        config
    }

    /// Fill settings from the plain variable names the toolkit and hosting
    /// platforms use (`ADMIN_PIN`, `DEPLOYER_PK`, `SUPABASE_URL`, ...).
    /// Empty values count as unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("WEB_SERVER_ADDR") {
            self.server.addr = addr;
        } else if let Some(port) = get("PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.addr = format!("0.0.0.0:{}", port);
        }

        if let Some(secret) = get("AUTH_SECRET") {
            self.auth.secret = Some(secret);
        }
        if let Some(pin) = get("ADMIN_PIN") {
            self.auth.admin_pin = Some(pin);
        }
        if let Some(flag) = get("AUTH_DEV_FALLBACK").and_then(|v| parse_flag(&v)) {
            self.auth.dev_fallback = Some(flag);
        }

        if let Some(key) = get("ANKR_API_KEY") {
            self.toolkit.rpc_api_key = Some(key);
        }
        if let Some(url) = get("RPC_URL") {
            self.toolkit.rpc_url = Some(url);
        }
        if let Some(pk) = get("DEPLOYER_PK") {
            self.toolkit.deployer_pk = Some(pk);
        }
        if let Some(asset) = get("ESCROW_ASSET") {
            self.toolkit.escrow_asset = Some(asset);
        }
        if let Some(factory) = get("FACTORY_ADDR") {
            self.toolkit.factory_addr = Some(factory);
        }
        if let Some(resolver) = get("RESOLVER") {
            self.toolkit.resolver = Some(resolver);
        }
        if let Some(recipient) = get("FEE_RECIPIENT") {
            self.toolkit.fee_recipient = Some(recipient);
        }
        if let Some(fee) = get("FEE_BPS").and_then(|v| v.trim().parse::<u32>().ok()) {
            self.toolkit.default_fee_bps = fee;
        }

        if let Some(url) = get("SUPABASE_URL") {
            self.datastore.url = Some(url);
        }
        if let Some(key) = get("SUPABASE_SERVICE_ROLE_KEY").or_else(|| get("SUPABASE_KEY")) {
            self.datastore.key = Some(key);
        }
    }

    /// Admin gate mount point, e.g. `/mein/konsole`.
    pub fn admin_base_path(&self) -> String {
        format!("/mein/{}", self.admin.path.trim_matches('/'))
    }
}

/// Lenient boolean used for environment toggles.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
