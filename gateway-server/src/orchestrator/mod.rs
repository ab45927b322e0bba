// gateway-server/src/orchestrator/mod.rs
//! Runs the external deployment toolkit as a child process.
//!
//! One invocation moves through Validating -> Spawning -> Running ->
//! Completed. Output from both pipes is merged in arrival order into a
//! bounded buffer and the run has a deadline. The child leads its own
//! process group, which is killed if the deadline passes or the request is
//! dropped.
pub mod group;
pub mod lock;
pub mod output;
pub mod params;

use crate::error::{tail_chars, GatewayError, OUTPUT_TAIL_CHARS};
use common::ToolkitConfig;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use group::ProcessGroup;
pub use lock::{DeploymentGuard, InFlightDeployments};
pub use output::{OutputBuffer, SuccessRule};
pub use params::ToolkitEnv;

const READ_CHUNK: usize = 4096;

/// Toolkit scripts the gateway knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolkitScript {
    DeployMarket,
    /// Deployment through the configured market factory
    CreateMarket,
    ResolveMarket,
    ClaimMarket,
    /// Operator refund paid from the deployer wallet
    ManualRefund,
}

impl ToolkitScript {
    pub fn path(&self) -> &'static str {
        match self {
            ToolkitScript::DeployMarket => "scripts/deploy-market.js",
            ToolkitScript::CreateMarket => "scripts/create-market.js",
            ToolkitScript::ResolveMarket => "scripts/resolve-market.js",
            ToolkitScript::ClaimMarket => "scripts/claim-market.js",
            ToolkitScript::ManualRefund => "scripts/manual-refund.js",
        }
    }

    fn success_rule(&self) -> SuccessRule {
        match self {
            ToolkitScript::DeployMarket | ToolkitScript::CreateMarket => SuccessRule::FlagOrMarketAddress,
            _ => SuccessRule::ExplicitFlag,
        }
    }

    /// Keys this script needs on top of an RPC source and `DEPLOYER_PK`
    fn required_keys(&self) -> &'static [&'static str] {
        match self {
            ToolkitScript::DeployMarket => &["ESCROW_ASSET"],
            ToolkitScript::CreateMarket => &["FACTORY_ADDR", "ESCROW_ASSET"],
            ToolkitScript::ManualRefund => &["MARKET_ADDRESS", "CLAIM_WALLET"],
            ToolkitScript::ResolveMarket | ToolkitScript::ClaimMarket => &[],
        }
    }
}

/// Lifecycle of one toolkit invocation, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Validating,
    Spawning,
    Running,
    Completed { success: bool },
}

/// Check the environment for everything the toolkit cannot run without,
/// listing each missing key.
pub fn validate_required_config(env: &ToolkitEnv, script: ToolkitScript) -> Result<(), GatewayError> {
    let present = |key: &str| env.get(key).map_or(false, |v| !v.trim().is_empty());
    let mut missing = Vec::new();

    if !present("ANKR_API_KEY") && !present("RPC_URL") {
        missing.push("ANKR_API_KEY or RPC_URL".to_string());
    }
    if !present("DEPLOYER_PK") {
        missing.push("DEPLOYER_PK".to_string());
    }
    for key in script.required_keys() {
        if !present(key) {
            missing.push(key.to_string());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(GatewayError::ConfigMissing(missing))
    }
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: ToolkitConfig,
    in_flight: InFlightDeployments,
}

impl Orchestrator {
    pub fn new(config: ToolkitConfig) -> Self {
        Self {
            config,
            in_flight: InFlightDeployments::new(),
        }
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    pub fn in_flight(&self) -> &InFlightDeployments {
        &self.in_flight
    }

    /// Factory deployment when a factory is configured, else the direct script.
    pub fn deploy_script(&self) -> ToolkitScript {
        let factory = self.config.factory_addr.as_deref().map_or(false, |f| !f.trim().is_empty());
        if factory {
            ToolkitScript::CreateMarket
        } else {
            ToolkitScript::DeployMarket
        }
    }

    /// Ambient process environment plus the toolkit settings from config.
    pub fn base_env(&self) -> ToolkitEnv {
        let mut env: ToolkitEnv = std::env::vars().collect();
        let mut set = |key: &str, value: &Option<String>| {
            if let Some(value) = value.as_ref().filter(|v| !v.trim().is_empty()) {
                env.insert(key.to_string(), value.clone());
            }
        };
        set("ANKR_API_KEY", &self.config.rpc_api_key);
        set("RPC_URL", &self.config.rpc_url);
        set("DEPLOYER_PK", &self.config.deployer_pk);
        set("ESCROW_ASSET", &self.config.escrow_asset);
        set("FACTORY_ADDR", &self.config.factory_addr);
        set("RESOLVER", &self.config.resolver);
        set("FEE_RECIPIENT", &self.config.fee_recipient);
        env.entry("FEE_BPS".to_string())
            .or_insert_with(|| self.config.default_fee_bps.to_string());
        env
    }

    /// Validate, spawn and await `script` with `overrides` layered on top of
    /// the base environment.
    pub async fn run(
        &self,
        script: ToolkitScript,
        overrides: ToolkitEnv,
    ) -> Result<Map<String, Value>, GatewayError> {
        let run_id = Uuid::new_v4();
        let mut env = self.base_env();
        env.extend(overrides);

        log_state(run_id, script, RunState::Validating);
        validate_required_config(&env, script)?;

        log_state(run_id, script, RunState::Spawning);
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.base_args)
            .arg(script.path())
            .arg("--network")
            .arg(&self.config.network)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            tracing::error!(%run_id, "Failed to spawn {}: {}", self.config.program, e);
            GatewayError::Spawn(e.to_string())
        })?;
        let mut group = ProcessGroup::new(child.id());

        log_state(run_id, script, RunState::Running);
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, tx.clone()));
        }
        drop(tx);

        let mut buffer = OutputBuffer::new(self.config.max_output_bytes);
        let deadline = Duration::from_secs(self.config.timeout_secs);
        let finished = {
            let collect = async {
                while let Some(chunk) = rx.recv().await {
                    buffer.push(&chunk);
                }
            };
            let wait = async {
                let (_, status) = tokio::join!(collect, child.wait());
                status
            };
            tokio::time::timeout(deadline, wait).await
        };

        let status = match finished {
            Ok(status) => {
                group.disarm();
                status.map_err(|e| GatewayError::Internal(format!("waiting on toolkit: {}", e)))?
            },
            Err(_) => {
                tracing::warn!(%run_id, "Toolkit exceeded {}s deadline, killing its process group", self.config.timeout_secs);
                group.kill();
                if let Err(e) = child.kill().await {
                    tracing::error!(%run_id, "Failed to kill toolkit: {}", e);
                }
                log_state(run_id, script, RunState::Completed { success: false });
                return Err(GatewayError::DeployTimeout {
                    secs: self.config.timeout_secs,
                    output_tail: tail_chars(&buffer.to_text(), OUTPUT_TAIL_CHARS),
                });
            },
        };

        if buffer.is_truncated() {
            tracing::warn!(%run_id, "Toolkit output exceeded {} bytes, kept the tail", self.config.max_output_bytes);
        }

        let outcome = output::interpret_exit(status.code(), &buffer.to_text(), script.success_rule());
        log_state(run_id, script, RunState::Completed { success: outcome.is_ok() });
        if let Err(err) = &outcome {
            tracing::warn!(%run_id, exit_code = ?status.code(), "Toolkit run failed: {}", err);
        }
        outcome
    }
}

fn log_state(run_id: Uuid, script: ToolkitScript, state: RunState) {
    tracing::info!(%run_id, script = script.path(), state = ?state, "toolkit run");
}

async fn pump<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(chunk[..n].to_vec()).await.is_err() {
                    break;
                }
            },
            Err(e) => {
                tracing::warn!("Error reading toolkit output: {}", e);
                break;
            },
        }
    }
}
