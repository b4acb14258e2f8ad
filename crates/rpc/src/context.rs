//! Application context - wires everything together

use anyhow::Context;
use cosign_authz::{Processor, Request, Response};
use cosign_core::{family_name, EngineConfig, SignatureAlgorithm, PERMISSION_TAG};
use cosign_gate::{AllowAll, KeyPair, PermissionRegistry, SignedEnvelope, Signer, StaticPolicy};
use cosign_ledger::SqliteStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const LEDGER_FILE: &str = "ledger.db";
pub const CONFIG_FILE: &str = "config.json";
pub const BANK_KEY_FILE: &str = "bank.key";
pub const PERMISSIONS_FILE: &str = "permissions.json";

/// Environment override for the bank signing seed
pub const BANK_KEY_ENV: &str = "COSIGN_BANK_KEY";

/// Application context - wires together all components
pub struct AppContext {
    pub processor: Processor,
    pub config: EngineConfig,
    bank: Arc<KeyPair>,
    data_path: PathBuf,
}

impl AppContext {
    /// Open (or initialize) the data directory
    ///
    /// Layout: `ledger.db`, `bank.key` (created on first use), and the
    /// optional `config.json` and `permissions.json`. Without a
    /// permissions file every signer may mutate state.
    pub fn new(data_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_path)?;

        let config_path = data_path.join(CONFIG_FILE);
        let config = if config_path.exists() {
            EngineConfig::from_file(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?
        } else {
            EngineConfig::default()
        };

        let store = SqliteStore::new(data_path.join(LEDGER_FILE))?;
        let bank = Arc::new(Self::load_bank_key(&data_path, config.signature_algorithm)?);
        let permissions = Self::permissions(&data_path.join(PERMISSIONS_FILE))?;

        let processor = Processor::new(
            Arc::new(store),
            bank.clone(),
            permissions,
            config.clone(),
        );

        tracing::debug!(data = %data_path.display(), algorithm = ?config.signature_algorithm, "context ready");
        Ok(Self {
            processor,
            config,
            bank,
            data_path,
        })
    }

    fn load_bank_key(data_path: &Path, algorithm: SignatureAlgorithm) -> Result<KeyPair, anyhow::Error> {
        if let Ok(seed) = std::env::var(BANK_KEY_ENV) {
            return Ok(KeyPair::from_hex(algorithm, seed.trim())?);
        }

        let key_path = data_path.join(BANK_KEY_FILE);
        if key_path.exists() {
            return load_key(&key_path, algorithm);
        }

        let signer = KeyPair::generate(algorithm);
        std::fs::write(&key_path, signer.seed_hex())?;
        tracing::info!(path = %key_path.display(), "generated bank key");
        Ok(signer)
    }

    /// `permissions.json` maps a source account to the keys allowed to mutate it
    fn permissions(path: &Path) -> Result<Arc<dyn PermissionRegistry>, anyhow::Error> {
        if !path.exists() {
            return Ok(Arc::new(AllowAll));
        }

        let content = std::fs::read_to_string(path)?;
        let grants: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        let policy = StaticPolicy::new();
        for (account, keys) in &grants {
            let family = family_name(account, PERMISSION_TAG);
            for key in keys {
                policy.grant(&family, key);
            }
        }
        Ok(Arc::new(policy))
    }

    /// Seal a request with `signer` and run it
    pub async fn submit(
        &self,
        account: &str,
        request: Request,
        signer: &dyn Signer,
    ) -> Result<Response, anyhow::Error> {
        let envelope = SignedEnvelope::seal(account, &request, signer)?;
        Ok(self.processor.handle(&envelope).await?)
    }

    /// Key the engine signs pending transaction bodies with
    pub fn bank_signer(&self) -> &KeyPair {
        &self.bank
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}

/// Read a key file holding a hex seed
pub fn load_key(path: &Path, algorithm: SignatureAlgorithm) -> Result<KeyPair, anyhow::Error> {
    let seed = std::fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    Ok(KeyPair::from_hex(algorithm, seed.trim())?)
}
