//! Configuration management
//!
//! Settings come from an optional `kmsgate.toml` and the process environment,
//! with the environment taking precedence. Keys are the lowercased variable
//! names (`PROJECT_ID` -> `project_id`).

use anyhow::bail;
use kmsgate_core::ResourceNames;
use serde::Deserialize;

const DEFAULT_ASYM_KEY_VERSION: &str = "1";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub key_ring: Option<String>,
    pub sym_crypto_key: Option<String>,
    pub crypto_key: Option<String>,
    pub asym_crypto_key: Option<String>,
    pub asym_key_version: Option<String>,
    pub debug: Option<String>,
    pub google_oauth_access_token: Option<String>,
    pub kms_endpoint: Option<String>,
    pub secret_manager_endpoint: Option<String>,
}

/// Empty values count as unset
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(file: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::default())
            .build()?;

        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        Ok(config.try_deserialize::<Config>()?)
    }

    /// `1`, `t` and `true` in its usual casings
    pub fn debug_enabled(&self) -> bool {
        matches!(
            self.debug.as_deref(),
            Some("1" | "t" | "T" | "true" | "TRUE" | "True")
        )
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.google_oauth_access_token)
    }

    pub fn kms_endpoint(&self) -> &str {
        non_empty(&self.kms_endpoint).unwrap_or(kmsgate_kms::DEFAULT_ENDPOINT)
    }

    pub fn secret_manager_endpoint(&self) -> &str {
        non_empty(&self.secret_manager_endpoint).unwrap_or(kmsgate_secrets::DEFAULT_ENDPOINT)
    }

    /// Build the resource names, failing when a required setting is missing
    pub fn resource_names(&self) -> anyhow::Result<ResourceNames> {
        let project_id = non_empty(&self.project_id);
        let region = non_empty(&self.region);
        let key_ring = non_empty(&self.key_ring);
        let sym_key = non_empty(&self.sym_crypto_key).or(non_empty(&self.crypto_key));

        let (Some(project_id), Some(region), Some(key_ring), Some(sym_key)) =
            (project_id, region, key_ring, sym_key)
        else {
            let missing: Vec<&str> = [
                ("PROJECT_ID", project_id.is_none()),
                ("REGION", region.is_none()),
                ("KEY_RING", key_ring.is_none()),
                ("SYM_CRYPTO_KEY", sym_key.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            bail!("missing required configuration: {}", missing.join(", "));
        };

        let mut names = ResourceNames::new(project_id, region, key_ring, sym_key);
        if let Some(asym_key) = non_empty(&self.asym_crypto_key) {
            let version = non_empty(&self.asym_key_version).unwrap_or(DEFAULT_ASYM_KEY_VERSION);
            names = names.with_asymmetric_key(asym_key, version);
        }
        Ok(names)
    }
}
