// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::error::{StorageError, StorageResult};

/// Transport tuning keys understood by every remote backend.
///
/// They are handed to the client library and are never part of the credentials.
pub const TRANSPORT_OPTIONS: [&str; 6] = [
    "timeout",
    "connect_timeout",
    "max_retries",
    "retry_timeout",
    "pool_idle_timeout",
    "pool_max_idle_per_host",
];

const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 600;

/// Storage provider type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Local filesystem storage
    #[serde(alias = "file")]
    Local,
    /// Process-local in-memory storage
    #[serde(alias = "inmemory")]
    Memory,
    /// AWS S3 storage
    #[serde(alias = "s3")]
    Aws,
    /// Azure Blob Storage
    Azure,
    /// Google Cloud Storage
    #[serde(alias = "gcp", alias = "google")]
    Gcs,
}

impl StorageType {
    /// Get the storage type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::Memory => "memory",
            StorageType::Aws => "aws",
            StorageType::Azure => "azure",
            StorageType::Gcs => "gcs",
        }
    }

    /// Whether the provider can mint time-limited signed URLs.
    pub fn supports_signed_urls(&self) -> bool {
        matches!(
            self,
            StorageType::Aws | StorageType::Azure | StorageType::Gcs
        )
    }
}

impl FromStr for StorageType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "file" => Ok(StorageType::Local),
            "memory" | "inmemory" => Ok(StorageType::Memory),
            "aws" | "s3" => Ok(StorageType::Aws),
            "azure" => Ok(StorageType::Azure),
            "gcs" | "gcp" | "google" => Ok(StorageType::Gcs),
            _ => Err(StorageError::ConfigError(format!(
                "Unknown storage type: {}",
                s
            ))),
        }
    }
}

impl Display for StorageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Configuration of one storage adapter.
///
/// Credentials live in a free-form `options` map which is handed to the
/// `object_store` builders, so supporting a new provider option does not
/// require a new field here.
///
/// # Examples
///
/// ## Local filesystem
/// ```
/// use blob_depot::storage::StorageConfig;
///
/// let config = StorageConfig::local()
///     .with_option("path", "/tmp/uploads")
///     .with_container("avatars");
/// ```
///
/// ## AWS S3
/// ```
/// use blob_depot::storage::StorageConfig;
///
/// let config = StorageConfig::new("s3")
///     .unwrap()
///     .with_container("my-bucket")
///     .with_option("region", "us-east-1")
///     .with_option("access_key_id", "ACCESS_KEY")
///     .with_option("secret_access_key", "SECRET_ACCESS_KEY")
///     .with_public(false);
/// ```
///
/// ## Azure
/// ```
/// use blob_depot::storage::StorageConfig;
///
/// let config = StorageConfig::azure()
///     .with_container("uploads")
///     .with_option("account_name", "myaccount")
///     .with_option("access_key", "ACCOUNT_KEY")
///     .with_custom_host("https://cdn.example.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage provider type
    #[serde(rename = "type")]
    pub storage_type: StorageType,

    /// Provider-specific credential and transport options
    ///
    /// AWS S3:
    /// - region: AWS region (e.g., "us-east-1")
    /// - access_key_id / secret_access_key / session_token
    /// - endpoint: Custom endpoint URL (for S3-compatible services)
    /// - allow_http: "true" to allow HTTP connections
    ///
    /// Azure:
    /// - account_name: Storage account name (required)
    /// - access_key: Account key
    /// - sas_token: SAS token
    /// - tenant_id / client_id / client_secret
    /// - endpoint: Custom endpoint URL
    ///
    /// GCS:
    /// - service_account_key_path / service_account_key
    ///
    /// Local:
    /// - path: Root directory, containers are created beneath it
    #[serde(default)]
    pub options: HashMap<String, String>,

    /// Bucket (S3, GCS), blob container (Azure) or directory (local)
    #[serde(default)]
    pub container: String,

    /// Host that public URLs are built on instead of the provider pattern
    #[serde(default)]
    pub custom_host: Option<String>,

    /// Default visibility of containers and objects
    #[serde(default = "default_public")]
    pub public: bool,

    /// Extra attributes merged into every write, e.g. `cache_control`
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Lifetime of signed URLs
    #[serde(default = "default_signed_url_expiry_secs")]
    pub signed_url_expiry_secs: u64,
}

fn default_public() -> bool {
    true
}

fn default_signed_url_expiry_secs() -> u64 {
    DEFAULT_SIGNED_URL_EXPIRY_SECS
}

impl StorageConfig {
    /// Create a new storage configuration from a provider name.
    ///
    /// # Arguments
    ///
    /// * `storage_type` - The provider name ("local", "memory", "aws"/"s3", "azure", "gcs"/"gcp")
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConfigError` if the provider is not recognized.
    pub fn new(storage_type: impl Into<String>) -> StorageResult<Self> {
        let storage_type: StorageType = storage_type.into().parse()?;
        Ok(Self::of_type(storage_type))
    }

    /// Create a configuration for a known provider with default options.
    pub fn of_type(storage_type: StorageType) -> Self {
        Self {
            storage_type,
            options: Self::default_options(),
            container: String::new(),
            custom_host: None,
            public: default_public(),
            attributes: HashMap::new(),
            signed_url_expiry_secs: DEFAULT_SIGNED_URL_EXPIRY_SECS,
        }
    }

    /// Create a local filesystem storage configuration.
    pub fn local() -> Self {
        Self::of_type(StorageType::Local)
    }

    /// Create an in-memory storage configuration.
    pub fn memory() -> Self {
        Self::of_type(StorageType::Memory)
    }

    /// Create an AWS S3 storage configuration.
    pub fn aws() -> Self {
        Self::of_type(StorageType::Aws)
    }

    /// Create an Azure Blob Storage configuration.
    pub fn azure() -> Self {
        Self::of_type(StorageType::Azure)
    }

    /// Create a Google Cloud Storage configuration.
    pub fn gcs() -> Self {
        Self::of_type(StorageType::Gcs)
    }

    /// Parse a configuration from a JSON document.
    ///
    /// Options given in the document are laid over [`default_options`].
    ///
    /// [`default_options`]: StorageConfig::default_options
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConfigError` if the document is malformed or
    /// names an unknown provider.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let mut config: Self = serde_json::from_str(json)
            .map_err(|e| StorageError::ConfigError(format!("Invalid storage config: {}", e)))?;
        let mut options = Self::default_options();
        options.extend(config.options);
        config.options = options;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Get default transport options shared by all storage types.
    ///
    /// # Returns
    ///
    /// A HashMap containing default timeout, retry, and connection pool settings.
    pub fn default_options() -> HashMap<String, String> {
        [
            ("timeout", "120"),
            ("connect_timeout", "30"),
            ("max_retries", "10"),
            ("retry_timeout", "180"),
            ("pool_idle_timeout", "15"),
            ("pool_max_idle_per_host", "5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Add a configuration option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Add multiple configuration options.
    pub fn with_options(mut self, options: HashMap<String, String>) -> Self {
        self.options.extend(options);
        self
    }

    /// Set the container (bucket) name.
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    /// Serve public URLs from `host` instead of the provider URL pattern.
    pub fn with_custom_host(mut self, host: impl Into<String>) -> Self {
        self.custom_host = Some(host.into());
        self
    }

    /// Set the default visibility.
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Add an attribute that is merged into every write.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the lifetime of signed URLs.
    pub fn with_signed_url_expiry(mut self, expiry: Duration) -> Self {
        self.signed_url_expiry_secs = expiry.as_secs();
        self
    }

    /// Get a configuration option.
    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }

    /// Credential options, i.e. `options` without the transport tuning keys.
    pub fn credentials(&self) -> HashMap<String, String> {
        self.options
            .iter()
            .filter(|(k, _)| !TRANSPORT_OPTIONS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn signed_url_expiry(&self) -> Duration {
        Duration::from_secs(self.signed_url_expiry_secs)
    }

    /// Get the storage type as a string.
    pub fn storage_type_str(&self) -> &str {
        self.storage_type.as_str()
    }

    /// Check the settings that every provider needs.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConfigError` if no container name is set.
    pub fn validate(&self) -> StorageResult<()> {
        if self.container.trim().is_empty() {
            return Err(StorageError::ConfigError(format!(
                "{} storage requires a container name",
                self.storage_type
            )));
        }
        Ok(())
    }
}

impl From<StorageConfig> for String {
    fn from(config: StorageConfig) -> Self {
        config.storage_type_str().to_string()
    }
}
