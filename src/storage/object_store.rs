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

use super::backend::{string_to_path, Container, ObjectRecord, StorageBackend, WriteRequest};
use super::config::{StorageConfig, StorageType, TRANSPORT_OPTIONS};
use super::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::{
    aws::AmazonS3Builder, azure::MicrosoftAzureBuilder, gcp::GoogleCloudStorageBuilder,
    local::LocalFileSystem, memory::InMemory, signer::Signer, Attribute, Attributes, ClientOptions,
    GetOptions, ObjectMeta, ObjectStore, ObjectStoreExt, PutOptions, PutPayload, RetryConfig,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Storage backend for every provider the `object_store` crate supports
pub struct ObjectStoreBackend {
    pub config: StorageConfig,
    local_root: Option<PathBuf>,
    memory_stores: Mutex<HashMap<String, Arc<InMemory>>>,
}

/// A container bound to one `object_store` instance
pub struct ObjectStoreContainer {
    name: String,
    kind: StorageType,
    public: bool,
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
}

impl ObjectStoreBackend {
    /// Create a backend from configuration.
    ///
    /// Only the credentials are validated here, no request is sent. Containers
    /// are bound later by [`StorageBackend::container`].
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * Local storage has no 'path' option, or the path is not an existing directory
    /// * Azure storage has no 'account_name' option
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let local_root = match config.storage_type {
            StorageType::Local => Some(Self::resolve_local_root(&config)?),
            StorageType::Azure => {
                if config.get_option("account_name").is_none() {
                    return Err(StorageError::ConfigError(
                        "Azure requires 'account_name' option".to_string(),
                    ));
                }
                None
            }
            StorageType::Memory | StorageType::Aws | StorageType::Gcs => None,
        };

        Ok(Self {
            config,
            local_root,
            memory_stores: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve the root directory of a local store.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The 'path' option is missing from configuration
    /// * The path cannot be canonicalized (doesn't exist or permission denied)
    /// * The path is not a directory
    fn resolve_local_root(config: &StorageConfig) -> StorageResult<PathBuf> {
        let path = config.get_option("path").ok_or_else(|| {
            StorageError::ConfigError("Local storage requires 'path' option".to_string())
        })?;

        let canonical_path = PathBuf::from(path).canonicalize().map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to resolve path '{}': {} (path must exist)",
                path, e
            ))
        })?;

        if !canonical_path.is_dir() {
            return Err(StorageError::ConfigError(format!(
                "Base path is not a directory: {}",
                canonical_path.display()
            )));
        }

        Ok(canonical_path)
    }

    /// Build connection options from configuration.
    ///
    /// `timeout` and `connect_timeout` accept "0" or "disabled" to turn the
    /// limit off. Unparseable values are ignored.
    fn build_connection_options(config: &StorageConfig) -> ClientOptions {
        let mut client_options = ClientOptions::default();
        match config.get_option("timeout").and_then(|s| parse_timeout(s)) {
            Some(Timeout::Disabled) => client_options = client_options.with_timeout_disabled(),
            Some(Timeout::After(timeout)) => client_options = client_options.with_timeout(timeout),
            None => (),
        }
        match config
            .get_option("connect_timeout")
            .and_then(|s| parse_timeout(s))
        {
            Some(Timeout::Disabled) => {
                client_options = client_options.with_connect_timeout_disabled()
            }
            Some(Timeout::After(timeout)) => {
                client_options = client_options.with_connect_timeout(timeout)
            }
            None => (),
        }
        if let Some(pool_idle_timeout_str) = config.get_option("pool_idle_timeout") {
            if let Ok(sec) = pool_idle_timeout_str.parse::<u64>() {
                client_options = client_options.with_pool_idle_timeout(Duration::from_secs(sec))
            }
        }
        if let Some(pool_max_idle_per_host_str) = config.get_option("pool_max_idle_per_host") {
            if let Ok(max_idle) = pool_max_idle_per_host_str.parse::<usize>() {
                client_options = client_options.with_pool_max_idle_per_host(max_idle)
            }
        }
        client_options
    }

    /// Build the client library's retry settings from configuration.
    fn build_retry_options(config: &StorageConfig) -> RetryConfig {
        let default_retry_config = RetryConfig::default();
        let max_retries = config
            .get_option("max_retries")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(default_retry_config.max_retries);
        let retry_timeout = config
            .get_option("retry_timeout")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default_retry_config.retry_timeout);
        RetryConfig {
            max_retries,
            retry_timeout,
            ..default_retry_config
        }
    }

    /// Bind a remote container without contacting the provider.
    fn remote_container(&self, name: &str, public: bool) -> StorageResult<ObjectStoreContainer> {
        let (store, signer) = match self.config.storage_type {
            StorageType::Aws => {
                let s3 = self.build_aws_store(name)?;
                let store: Arc<dyn ObjectStore> = s3.clone();
                let signer: Arc<dyn Signer> = s3;
                (store, signer)
            }
            StorageType::Azure => {
                let azure = self.build_azure_store(name)?;
                let store: Arc<dyn ObjectStore> = azure.clone();
                let signer: Arc<dyn Signer> = azure;
                (store, signer)
            }
            StorageType::Gcs => {
                let gcs = self.build_gcs_store(name)?;
                let store: Arc<dyn ObjectStore> = gcs.clone();
                let signer: Arc<dyn Signer> = gcs;
                (store, signer)
            }
            StorageType::Local | StorageType::Memory => {
                return Err(StorageError::ConfigError(format!(
                    "{} storage has no remote containers",
                    self.config.storage_type
                )))
            }
        };

        Ok(ObjectStoreContainer {
            name: name.to_string(),
            kind: self.config.storage_type,
            public,
            store,
            signer: Some(signer),
        })
    }

    /// Build an AWS S3 store for one bucket.
    fn build_aws_store(&self, bucket: &str) -> StorageResult<Arc<object_store::aws::AmazonS3>> {
        let mut builder = AmazonS3Builder::new()
            .with_client_options(Self::build_connection_options(&self.config))
            .with_retry(Self::build_retry_options(&self.config))
            .with_bucket_name(bucket);

        for (key, value) in &self.config.options {
            match key.as_str() {
                "region" => builder = builder.with_region(value),
                "access_key_id" => builder = builder.with_access_key_id(value),
                "secret_access_key" => builder = builder.with_secret_access_key(value),
                "session_token" | "token" => builder = builder.with_token(value),
                "endpoint" => builder = builder.with_endpoint(value),
                "allow_http" => {
                    if value.to_lowercase() == "true" {
                        builder = builder.with_allow_http(true);
                    }
                }
                k if TRANSPORT_OPTIONS.contains(&k) => (),
                _ => warn!("Unknown AWS S3 option: {}", key),
            }
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create S3 store: {}", e)))?;

        Ok(Arc::new(store))
    }

    /// Build an Azure store for one blob container.
    fn build_azure_store(
        &self,
        container: &str,
    ) -> StorageResult<Arc<object_store::azure::MicrosoftAzure>> {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_client_options(Self::build_connection_options(&self.config))
            .with_retry(Self::build_retry_options(&self.config))
            .with_container_name(container);

        for (key, value) in &self.config.options {
            match key.as_str() {
                "account_name" => builder = builder.with_account(value),
                "access_key" | "account_key" => builder = builder.with_access_key(value),
                "sas_token" => builder = builder.with_sas_authorization(parse_sas_token(value)),
                "tenant_id" => builder = builder.with_tenant_id(value),
                "client_id" => builder = builder.with_client_id(value),
                "client_secret" => builder = builder.with_client_secret(value),
                "endpoint" => builder = builder.with_endpoint(value.clone()),
                k if TRANSPORT_OPTIONS.contains(&k) => (),
                _ => warn!("Unknown Azure option: {}", key),
            }
        }

        let store = builder.build().map_err(|e| {
            StorageError::ConfigError(format!("Failed to create Azure store: {}", e))
        })?;

        Ok(Arc::new(store))
    }

    /// Build a GCS store for one bucket.
    fn build_gcs_store(
        &self,
        bucket: &str,
    ) -> StorageResult<Arc<object_store::gcp::GoogleCloudStorage>> {
        let mut builder = GoogleCloudStorageBuilder::new()
            .with_client_options(Self::build_connection_options(&self.config))
            .with_retry(Self::build_retry_options(&self.config))
            .with_bucket_name(bucket);

        for (key, value) in &self.config.options {
            match key.as_str() {
                "service_account_key_path" => builder = builder.with_service_account_path(value),
                "service_account_key" => builder = builder.with_service_account_key(value),
                k if TRANSPORT_OPTIONS.contains(&k) => (),
                _ => warn!("Unknown GCS option: {}", key),
            }
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create GCS store: {}", e)))?;

        Ok(Arc::new(store))
    }

    /// Base URL the public objects of container `name` are served from.
    ///
    /// Derived from configuration only, no request is sent. Memory
    /// containers have no public URLs.
    fn public_base(&self, name: &str) -> StorageResult<Option<Url>> {
        let base = match self.config.storage_type {
            StorageType::Aws => match self.config.get_option("endpoint") {
                Some(endpoint) => join_segments(&Url::parse(endpoint)?, [name])?,
                None => {
                    let region = self
                        .config
                        .get_option("region")
                        .map(String::as_str)
                        .unwrap_or(DEFAULT_AWS_REGION);
                    aws_public_base(name, region)?
                }
            },
            StorageType::Azure => match self.config.get_option("endpoint") {
                Some(endpoint) => join_segments(&Url::parse(endpoint)?, [name])?,
                None => {
                    let account_name = self.config.get_option("account_name").ok_or_else(|| {
                        StorageError::ConfigError("Azure requires 'account_name' option".to_string())
                    })?;
                    azure_public_base(account_name, name)?
                }
            },
            StorageType::Gcs => gcs_public_base(name)?,
            StorageType::Local => match &self.local_root {
                Some(root) => return Ok(Url::from_directory_path(root.join(name)).ok()),
                None => return Ok(None),
            },
            StorageType::Memory => return Ok(None),
        };
        Ok(Some(base))
    }

    /// Bind `<path>/<name>`, creating the directory if it is missing.
    async fn local_container(&self, name: &str, public: bool) -> StorageResult<ObjectStoreContainer> {
        let root = self.local_root.as_ref().ok_or_else(|| {
            StorageError::ConfigError("Local storage requires 'path' option".to_string())
        })?;
        let dir = root.join(name);
        if !dir.is_dir() {
            info!("Creating local container={} at path={}", name, dir.display());
            tokio::fs::create_dir_all(&dir).await?;
        }

        let store = LocalFileSystem::new_with_prefix(&dir).map_err(|e| {
            StorageError::ConfigError(format!("Failed to create local store: {}", e))
        })?;

        Ok(ObjectStoreContainer {
            name: name.to_string(),
            kind: StorageType::Local,
            public,
            store: Arc::new(store),
            signer: None,
        })
    }

    async fn memory_container(&self, name: &str, public: bool) -> ObjectStoreContainer {
        let mut stores = self.memory_stores.lock().await;
        let store = stores
            .entry(name.to_string())
            .or_insert_with(|| {
                info!("Creating in-memory container={}", name);
                Arc::new(InMemory::new())
            })
            .clone();

        ObjectStoreContainer {
            name: name.to_string(),
            kind: StorageType::Memory,
            public,
            store,
            signer: None,
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn kind(&self) -> StorageType {
        self.config.storage_type
    }

    fn public_url(&self, container: &str, key: &str) -> Option<String> {
        match self.public_base(container) {
            Ok(base) => key_url(&base?, key),
            Err(e) => {
                warn!("No public URL for container={}: {}", container, e);
                None
            }
        }
    }

    async fn container(&self, name: &str, public: bool) -> StorageResult<Arc<dyn Container>> {
        let container = match self.config.storage_type {
            StorageType::Local => self.local_container(name, public).await?,
            StorageType::Memory => self.memory_container(name, public).await,
            StorageType::Aws | StorageType::Azure | StorageType::Gcs => {
                let container = self.remote_container(name, public)?;
                // Buckets cannot be created through the client, only checked.
                container.store.list_with_delimiter(None).await?;
                container
            }
        };

        info!(
            "Resolved container={} type={} public={}",
            name, self.config.storage_type, public
        );
        Ok(Arc::new(container))
    }
}

impl Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StorageBackend(type=object_store, cloud_provider={}, container={})",
            self.config.storage_type_str(),
            self.config.container
        )
    }
}

impl ObjectStoreContainer {
    fn record(key: &str, meta: &ObjectMeta, attributes: &Attributes) -> ObjectRecord {
        let mut content_type = None;
        let mut extra = HashMap::new();

        for (attribute, value) in attributes.iter() {
            let value: &str = value.as_ref();
            let name = match attribute {
                Attribute::ContentType => {
                    content_type = Some(value.to_string());
                    continue;
                }
                Attribute::CacheControl => "cache_control".to_string(),
                Attribute::ContentDisposition => "content_disposition".to_string(),
                Attribute::ContentEncoding => "content_encoding".to_string(),
                Attribute::ContentLanguage => "content_language".to_string(),
                Attribute::Metadata(name) => name.to_string(),
                _ => continue,
            };
            extra.insert(name, value.to_string());
        }

        ObjectRecord {
            key: key.to_string(),
            size: meta.size,
            last_modified: Some(meta.last_modified),
            e_tag: meta.e_tag.clone(),
            content_type,
            attributes: extra,
        }
    }

    /// Attributes of a write, empty when the store cannot persist them.
    fn write_attributes(&self, request: &WriteRequest) -> Attributes {
        let mut attributes = Attributes::new();
        if self.kind == StorageType::Local {
            if request.content_type.is_some() || !request.attributes.is_empty() {
                debug!(
                    "Dropping attributes of key={}, local storage cannot persist them",
                    request.key
                );
            }
            return attributes;
        }

        if let Some(content_type) = &request.content_type {
            attributes.insert(Attribute::ContentType, content_type.clone().into());
        }
        for (key, value) in &request.attributes {
            attributes.insert(attribute_for(key), value.clone().into());
        }
        attributes
    }
}

#[async_trait]
impl Container for ObjectStoreContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_public(&self) -> bool {
        self.public
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectRecord> {
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = self
            .store
            .get_opts(&string_to_path(key), options)
            .await
            .map_err(|e| StorageError::from_read(key, e))?;

        Ok(Self::record(key, &result.meta, &result.attributes))
    }

    async fn read(&self, key: &str) -> StorageResult<(ObjectRecord, Bytes)> {
        let result = self
            .store
            .get(&string_to_path(key))
            .await
            .map_err(|e| StorageError::from_read(key, e))?;
        let record = Self::record(key, &result.meta, &result.attributes);
        let body = result
            .bytes()
            .await
            .map_err(|e| StorageError::from_read(key, e))?;

        Ok((record, body))
    }

    async fn create(&self, request: WriteRequest) -> StorageResult<ObjectRecord> {
        let options = PutOptions {
            attributes: self.write_attributes(&request),
            ..Default::default()
        };
        let size = request.body.len() as u64;
        let result = self
            .store
            .put_opts(
                &string_to_path(&request.key),
                PutPayload::from(request.body.clone()),
                options,
            )
            .await
            .map_err(|e| StorageError::from_write(&request.key, e))?;

        debug!(
            "Stored key={} size={} container={} e_tag={:?}",
            request.key, size, self.name, result.e_tag
        );

        Ok(ObjectRecord {
            key: request.key,
            size,
            last_modified: None,
            e_tag: result.e_tag,
            content_type: request.content_type,
            attributes: request.attributes,
        })
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        self.store
            .copy(&string_to_path(from), &string_to_path(to))
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => StorageError::NotFound(from.to_string()),
                other => StorageError::from_write(to, other),
            })
    }

    async fn destroy(&self, key: &str) -> StorageResult<()> {
        match self.store.delete(&string_to_path(key)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                debug!("Delete of absent key={} in container={}", key, self.name);
                Ok(())
            }
            Err(e) => Err(StorageError::from_write(key, e)),
        }
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<Option<String>> {
        let Some(signer) = &self.signer else {
            return Ok(None);
        };
        let url = signer
            .signed_url(Method::GET, &string_to_path(key), expires_in)
            .await?;
        Ok(Some(url.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timeout {
    Disabled,
    After(Duration),
}

/// Parse a timeout option in seconds. "0" and "disabled" turn the limit off,
/// anything unparseable yields `None`.
fn parse_timeout(value: &str) -> Option<Timeout> {
    match value {
        "0" | "disabled" => Some(Timeout::Disabled),
        _ => value
            .parse::<u64>()
            .ok()
            .map(|secs| Timeout::After(Duration::from_secs(secs))),
    }
}

/// Map an extra attribute name onto an `object_store` attribute.
fn attribute_for(key: &str) -> Attribute {
    match key.to_lowercase().replace('_', "-").as_str() {
        "cache-control" => Attribute::CacheControl,
        "content-disposition" => Attribute::ContentDisposition,
        "content-encoding" => Attribute::ContentEncoding,
        "content-language" => Attribute::ContentLanguage,
        "content-type" => Attribute::ContentType,
        _ => Attribute::Metadata(Cow::Owned(key.to_string())),
    }
}

fn parse_sas_token(token: &str) -> Vec<(String, String)> {
    token
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// URL of `key` below `base`, one escaped segment per path component.
fn key_url(base: &Url, key: &str) -> Option<String> {
    join_segments(base, key.split('/').filter(|s| !s.is_empty()))
        .ok()
        .map(String::from)
}

/// Append path segments to `base`, escaping each segment.
fn join_segments<I>(base: &Url, segments: I) -> StorageResult<Url>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| StorageError::ConfigError(format!("URL cannot be a base: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn aws_public_base(bucket: &str, region: &str) -> StorageResult<Url> {
    Ok(Url::parse(&format!("https://{}.s3.{}.amazonaws.com/", bucket, region))?)
}

fn azure_public_base(account: &str, container: &str) -> StorageResult<Url> {
    let base = Url::parse(&format!("https://{}.blob.core.windows.net/", account))?;
    join_segments(&base, [container])
}

fn gcs_public_base(bucket: &str) -> StorageResult<Url> {
    let base = Url::parse("https://storage.googleapis.com/")?;
    join_segments(&base, [bucket])
}
