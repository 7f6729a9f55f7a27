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

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::config::{StorageConfig, StorageType};
use super::error::StorageResult;

/// Backend-resident metadata of one object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRecord {
    /// Key of the object within its container
    pub key: String,

    /// Content length in bytes
    pub size: u64,

    /// Last modified timestamp (if available)
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,

    /// Entity tag (if available)
    pub e_tag: Option<String>,

    /// Content type recorded by the backend
    pub content_type: Option<String>,

    /// Every other attribute the backend returned
    pub attributes: HashMap<String, String>,
}

/// A fully buffered write of one object
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub public: bool,
    pub attributes: HashMap<String, String>,
}

impl WriteRequest {
    pub fn new(
        key: impl Into<String>,
        body: Bytes,
        content_type: Option<String>,
        public: bool,
    ) -> Self {
        Self {
            key: key.into(),
            body,
            content_type,
            public,
            attributes: HashMap::new(),
        }
    }

    /// Merge extra attributes into the request.
    ///
    /// Extra attributes win over the built-in `key`, `body`, `content_type`
    /// and `public` fields. Any other key is kept as a backend attribute.
    pub fn merge_attributes(mut self, extra: &HashMap<String, String>) -> Self {
        for (key, value) in extra {
            match key.to_lowercase().replace('-', "_").as_str() {
                "key" => {
                    warn!("Write attribute overrides key={} with key={}", self.key, value);
                    self.key = value.clone();
                }
                "body" => self.body = Bytes::from(value.clone().into_bytes()),
                "content_type" => self.content_type = Some(value.clone()),
                "public" => self.public = value.eq_ignore_ascii_case("true"),
                _ => {
                    self.attributes.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }
}

/// Creates backend handles from a configuration.
///
/// The adapter calls this at most once per successful connection, so
/// implementations may authenticate or validate eagerly.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>>;
}

/// A connected storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// The provider this backend talks to.
    fn kind(&self) -> StorageType;

    /// Whether containers of this backend can produce signed URLs.
    fn supports_signed_urls(&self) -> bool {
        self.kind().supports_signed_urls()
    }

    /// Public URL of `key` in container `container`.
    ///
    /// Built from the provider's URL pattern and configuration alone, so it
    /// neither resolves the container nor sends a request. `None` when the
    /// backend has no public URLs.
    fn public_url(&self, container: &str, key: &str) -> Option<String>;

    /// Fetch the container called `name`, creating it with the given
    /// visibility if it does not exist yet.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The container cannot be created on this backend
    /// * Credentials are rejected by the provider
    /// * Network or storage access errors occur
    async fn container(&self, name: &str, public: bool) -> StorageResult<Arc<dyn Container>>;
}

/// A bucket, blob container or directory holding objects
#[async_trait]
pub trait Container: Send + Sync {
    fn name(&self) -> &str;

    /// Visibility captured when the container was resolved.
    fn is_public(&self) -> bool;

    /// Fetch the metadata of one object without its body.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the key does not exist.
    async fn get(&self, key: &str) -> StorageResult<ObjectRecord>;

    /// Fetch the metadata and full body of one object.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the key does not exist.
    async fn read(&self, key: &str) -> StorageResult<(ObjectRecord, Bytes)>;

    /// Write one object, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::WriteError` on any transport, auth or quota failure.
    async fn create(&self, request: WriteRequest) -> StorageResult<ObjectRecord>;

    /// Copy an object within the container.
    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Remove an object. Removing an absent key succeeds.
    async fn destroy(&self, key: &str) -> StorageResult<()>;

    /// Time-limited signed URL of `key`, `None` if the backend cannot sign.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<Option<String>>;
}

impl Debug for dyn Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Container(name={}, public={})", self.name(), self.is_public())
    }
}

impl Debug for dyn StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "StorageBackend(kind={})", self.kind())
    }
}

/// Helper function to create an ObjectPath from a string
pub(crate) fn string_to_path(s: &str) -> ObjectPath {
    ObjectPath::from(s)
}
