use std::path::Path;
use std::sync::Arc;

use aggregator::{Aggregator, LocalLog, LogApi, SthCache, SthManager};
use anyhow::{bail, Context, Result};
use decider::build_strategy;
use tlog::{Ed25519Signer, Ed25519Verifier, FileStorage, LogCore, LogSigner};
use tracing::info;

use crate::client::HttpLogClient;
use crate::config::{AppConfig, FileConfig, LogConfig, LogMode};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// The log this process is authoritative for, if any.
    pub local: Option<LocalLog<FileStorage>>,
    pub aggregator: Aggregator<FileStorage>,
    pub submit_secret: Option<String>,
}

impl AppState {
    pub fn new(
        local: Option<LocalLog<FileStorage>>,
        aggregator: Aggregator<FileStorage>,
        submit_secret: Option<String>,
    ) -> Self {
        Self { local, aggregator, submit_secret }
    }

    pub fn sths(&self) -> &Arc<SthManager<FileStorage>> {
        self.aggregator.sths()
    }
}

/// Opens the local log and one trusted-head cache per configured log.
pub fn build(cfg: &AppConfig, file: &FileConfig) -> Result<AppState> {
    std::fs::create_dir_all(&cfg.state_dir)
        .with_context(|| format!("Failed to create state dir {}", cfg.state_dir.display()))?;

    let cache_store = FileStorage::open(cfg.state_dir.join("sth-cache.bin"))
        .context("Failed to open sth cache store")?;

    let local = match file.local() {
        Some(log) => Some(open_local(&cfg.state_dir, log)?),
        None => None,
    };

    let mut sths = SthManager::new();
    for log in &file.logs {
        let (api, verifier): (Arc<dyn LogApi>, Arc<dyn LogSigner>) = match (log.mode, &local) {
            (LogMode::Local, Some(local)) => {
                let api: Arc<dyn LogApi> = Arc::new(local.clone());
                let verifier: Arc<dyn LogSigner> =
                    Arc::new(Ed25519Verifier::from_bytes(local.core().public_key())?);
                (api, verifier)
            }
            (LogMode::Local, None) => bail!("local log {} was not opened", log.name),
            (LogMode::Remote, _) => remote(log, file, cfg)?,
        };
        let cache = SthCache::open(log.name.clone(), api, verifier, cache_store.clone())
            .with_context(|| format!("Failed to restore trusted head for {}", log.name))?
            .with_call_timeout(file.cache.call_timeout());
        sths.add(cache);
    }

    let strategy = build_strategy(&file.deciders).context("Invalid decider config")?;
    info!(strategy = strategy.name(), logs = file.logs.len(), "tlogd: state built");

    Ok(AppState::new(local, Aggregator::new(Arc::new(sths), strategy), cfg.submit_secret.clone()))
}

fn open_local(state_dir: &Path, log: &LogConfig) -> Result<LocalLog<FileStorage>> {
    let key_path = log
        .private_key_path
        .as_ref()
        .with_context(|| format!("local log {} needs private_key_path", log.name))?;
    let signer = Ed25519Signer::load(key_path)
        .with_context(|| format!("Failed to load signing key for {}", log.name))?;
    if !signer.can_sign() {
        bail!("signer for local log {} cannot sign", log.name);
    }

    let store = FileStorage::open(state_dir.join(format!("{}.log.bin", log.name)))
        .with_context(|| format!("Failed to open storage for {}", log.name))?;
    let core = LogCore::open(log.name.clone(), store, Arc::new(signer))
        .with_context(|| format!("Failed to open log {}", log.name))?;
    info!(log_name = %log.name, tree_size = core.sth()?.tree_size, "tlogd: local log open");

    Ok(LocalLog::new(Arc::new(core)))
}

fn remote(
    log: &LogConfig,
    file: &FileConfig,
    cfg: &AppConfig,
) -> Result<(Arc<dyn LogApi>, Arc<dyn LogSigner>)> {
    let url = log.url.as_deref().with_context(|| format!("remote log {} needs url", log.name))?;
    let key = log
        .public_key
        .as_deref()
        .with_context(|| format!("remote log {} needs public_key", log.name))?;

    let verifier = Ed25519Verifier::from_hex(key)
        .with_context(|| format!("Invalid public_key for {}", log.name))?;
    let client = HttpLogClient::new(url, file.cache.call_timeout())?
        .with_submit_secret(cfg.submit_secret.clone());

    let api: Arc<dyn LogApi> = Arc::new(client);
    let verifier: Arc<dyn LogSigner> = Arc::new(verifier);
    Ok((api, verifier))
}
