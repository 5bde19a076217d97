//! Resource names for keys and secrets
//!
//! Names are built once at startup from configuration and shared read-only
//! with every handler.

/// Fully-qualified resource names used to address KMS and Secret Manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// `projects/<project>`
    parent: String,
    /// `projects/<p>/locations/<region>/keyRings/<ring>`
    key_ring: String,
    /// `.../cryptoKeys/<key>`
    symmetric_key: String,
    /// `.../cryptoKeys/<key>/cryptoKeyVersions/<n>`
    asymmetric_key_version: Option<String>,
}

impl ResourceNames {
    pub fn new(project_id: &str, region: &str, key_ring: &str, symmetric_key: &str) -> Self {
        let parent = format!("projects/{}", project_id);
        let key_ring = format!("{}/locations/{}/keyRings/{}", parent, region, key_ring);
        let symmetric_key = format!("{}/cryptoKeys/{}", key_ring, symmetric_key);

        Self {
            parent,
            key_ring,
            symmetric_key,
            asymmetric_key_version: None,
        }
    }

    /// Address an asymmetric key version in the same key ring
    pub fn with_asymmetric_key(mut self, key: &str, version: &str) -> Self {
        self.asymmetric_key_version = Some(format!(
            "{}/cryptoKeys/{}/cryptoKeyVersions/{}",
            self.key_ring, key, version
        ));
        self
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn symmetric_key(&self) -> &str {
        &self.symmetric_key
    }

    pub fn asymmetric_key_version(&self) -> Option<&str> {
        self.asymmetric_key_version.as_deref()
    }

    /// `projects/<p>/secrets/<secret_id>`
    pub fn secret(&self, secret_id: &str) -> String {
        format!("{}/secrets/{}", self.parent, secret_id)
    }

    /// `projects/<p>/secrets/<secret_name>/versions/<version>`
    pub fn secret_version(&self, secret_name: &str, version: &str) -> String {
        format!("{}/versions/{}", self.secret(secret_name), version)
    }
}
