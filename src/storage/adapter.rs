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

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::backend::{Connector, Container, StorageBackend};
use super::config::StorageConfig;
use super::error::StorageResult;
use super::factory::StorageBackendFactory;
use super::file::StoredFile;

/// An incoming upload handed to [`StorageAdapter::store`]
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub data: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl SourceFile {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Load a local file, keeping its file name.
    pub async fn from_path(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let mut file = Self::new(data);
        file.filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(file)
    }

    /// The declared content type, or one guessed from the file name.
    pub fn declared_content_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            self.filename
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.to_string())
        })
    }
}

struct AdapterInner {
    config: StorageConfig,
    connector: Arc<dyn Connector>,
    connection: OnceCell<Arc<dyn StorageBackend>>,
    directory: OnceCell<Arc<dyn Container>>,
}

/// Facade used by upload handling code to store and retrieve files.
///
/// Cloning is cheap and clones share the memoized backend connection and
/// container handle. Both are created on first use, not at construction.
///
/// # Examples
///
/// ```no_run
/// use blob_depot::{SourceFile, StorageAdapter, StorageConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let config = StorageConfig::aws()
///     .with_container("assets")
///     .with_option("region", "us-east-1");
/// let adapter = StorageAdapter::new(config)?;
///
/// let upload = SourceFile::new(b"...".to_vec()).with_content_type("image/png");
/// let mut file = adapter.store("images/a.png", upload).await?;
/// println!("{} bytes at {:?}", file.size().await?, file.url().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StorageAdapter {
    inner: Arc<AdapterInner>,
}

/// Builder for [`StorageAdapter`]
pub struct StorageAdapterBuilder {
    config: StorageConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl StorageAdapterBuilder {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            connector: None,
        }
    }

    /// Use a custom connector instead of the `object_store` backends.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the adapter. No connection is made here.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConfigError` if the configuration has no container name.
    pub fn build(self) -> StorageResult<StorageAdapter> {
        self.config.validate()?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(StorageBackendFactory));

        Ok(StorageAdapter {
            inner: Arc::new(AdapterInner {
                config: self.config,
                connector,
                connection: OnceCell::new(),
                directory: OnceCell::new(),
            }),
        })
    }
}

impl StorageAdapter {
    /// Create an adapter backed by the `object_store` backends.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: StorageConfig) -> StorageAdapterBuilder {
        StorageAdapterBuilder::new(config)
    }

    /// Store `file` under `path`, returning the handle of the stored object.
    ///
    /// The content type is taken from the upload, or guessed from its file
    /// name, or from `path`.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The backend cannot be connected or the container cannot be resolved
    /// * The backend rejects the write (`StorageError::WriteError`)
    pub async fn store(&self, path: impl Into<String>, file: SourceFile) -> StorageResult<StoredFile> {
        let declared = file.declared_content_type();
        let mut stored = StoredFile::new(self.clone(), path);
        stored.store(file.data, declared.as_deref()).await?;
        Ok(stored)
    }

    /// Handle of an existing object. Nothing is fetched until it is read.
    pub fn retrieve(&self, identifier: impl Into<String>) -> StoredFile {
        StoredFile::new(self.clone(), identifier)
    }

    /// Delete the object stored under `identifier`.
    pub async fn delete(&self, identifier: impl Into<String>) -> StorageResult<()> {
        self.retrieve(identifier).delete().await
    }

    /// The memoized backend connection, created on first call.
    ///
    /// Concurrent first callers wait for a single construction. A failed
    /// construction is not cached, so the next call tries again.
    pub async fn connection(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        let inner = &self.inner;
        let backend = inner
            .connection
            .get_or_try_init(|| async {
                info!(
                    "Connecting storage backend type={}",
                    inner.config.storage_type
                );
                inner.connector.connect(&inner.config).await
            })
            .await?;
        Ok(Arc::clone(backend))
    }

    /// The memoized container, fetched or created on first call.
    ///
    /// Visibility is taken from the configuration when the container is
    /// resolved. The handle is never refreshed afterwards.
    pub async fn directory(&self) -> StorageResult<Arc<dyn Container>> {
        let inner = &self.inner;
        let container = inner
            .directory
            .get_or_try_init(|| async {
                let backend = self.connection().await?;
                debug!(
                    "Resolving container={} public={}",
                    inner.config.container, inner.config.public
                );
                backend
                    .container(&inner.config.container, inner.config.public)
                    .await
            })
            .await?;
        Ok(Arc::clone(container))
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    pub fn container_name(&self) -> &str {
        &self.inner.config.container
    }

    pub fn credentials(&self) -> HashMap<String, String> {
        self.inner.config.credentials()
    }

    pub fn custom_host(&self) -> Option<&str> {
        self.inner.config.custom_host.as_deref()
    }

    pub fn is_public(&self) -> bool {
        self.inner.config.public
    }

    pub fn extra_attributes(&self) -> &HashMap<String, String> {
        &self.inner.config.attributes
    }
}

impl Debug for StorageAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StorageAdapter(type={}, container={}, connected={})",
            self.inner.config.storage_type,
            self.inner.config.container,
            self.inner.connection.initialized()
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::backend::{ObjectRecord, WriteRequest};
    use crate::storage::config::StorageType;
    use crate::storage::error::StorageError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Call counters shared by the fake connector, backend and container.
    #[derive(Default)]
    pub(crate) struct Calls {
        pub connects: AtomicUsize,
        pub containers: AtomicUsize,
        pub gets: AtomicUsize,
        pub reads: AtomicUsize,
        pub creates: AtomicUsize,
        pub signs: AtomicUsize,
        pub destroys: AtomicUsize,
    }

    impl Calls {
        pub fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    pub(crate) struct FakeConnector {
        pub calls: Arc<Calls>,
        pub kind: StorageType,
        pub failures_left: AtomicUsize,
        pub fail_writes: bool,
        pub objects: Arc<Mutex<HashMap<String, (WriteRequest, usize)>>>,
    }

    impl FakeConnector {
        pub fn new(kind: StorageType) -> Self {
            Self {
                calls: Arc::new(Calls::default()),
                kind,
                failures_left: AtomicUsize::new(0),
                fail_writes: false,
                objects: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        pub fn failing(kind: StorageType, failures: usize) -> Self {
            let connector = Self::new(kind);
            connector.failures_left.store(failures, Ordering::SeqCst);
            connector
        }

        /// A connector whose containers reject every create and destroy.
        pub fn rejecting_writes(kind: StorageType) -> Self {
            Self {
                fail_writes: true,
                ..Self::new(kind)
            }
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, _config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
            self.calls.connects.fetch_add(1, Ordering::SeqCst);
            // Widen the window for concurrent first callers
            tokio::task::yield_now().await;
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::ConfigError("bad credentials".to_string()));
            }
            Ok(Arc::new(FakeBackend {
                calls: Arc::clone(&self.calls),
                kind: self.kind,
                fail_writes: self.fail_writes,
                objects: Arc::clone(&self.objects),
            }))
        }
    }

    struct FakeBackend {
        calls: Arc<Calls>,
        kind: StorageType,
        fail_writes: bool,
        objects: Arc<Mutex<HashMap<String, (WriteRequest, usize)>>>,
    }

    #[async_trait]
    impl StorageBackend for FakeBackend {
        fn kind(&self) -> StorageType {
            self.kind
        }

        fn public_url(&self, container: &str, key: &str) -> Option<String> {
            Some(format!("https://{}.fake.example.com/{}", container, key))
        }

        async fn container(&self, name: &str, public: bool) -> StorageResult<Arc<dyn Container>> {
            self.calls.containers.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeContainer {
                name: name.to_string(),
                public,
                signs: self.kind.supports_signed_urls(),
                fail_writes: self.fail_writes,
                calls: Arc::clone(&self.calls),
                objects: Arc::clone(&self.objects),
            }))
        }
    }

    struct FakeContainer {
        name: String,
        public: bool,
        signs: bool,
        fail_writes: bool,
        calls: Arc<Calls>,
        objects: Arc<Mutex<HashMap<String, (WriteRequest, usize)>>>,
    }

    impl FakeContainer {
        fn check_write(&self, key: &str) -> StorageResult<()> {
            if self.fail_writes {
                return Err(StorageError::from_write(
                    key,
                    object_store::Error::Generic {
                        store: "fake",
                        source: "quota exceeded".into(),
                    },
                ));
            }
            Ok(())
        }

        fn lookup(&self, key: &str) -> StorageResult<(ObjectRecord, Bytes)> {
            let objects = self.objects.lock().unwrap();
            let (request, generation) = objects
                .get(key)
                .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
            let record = ObjectRecord {
                key: key.to_string(),
                size: request.body.len() as u64,
                last_modified: None,
                e_tag: Some(generation.to_string()),
                content_type: request.content_type.clone(),
                attributes: request.attributes.clone(),
            };
            Ok((record, request.body.clone()))
        }
    }

    #[async_trait]
    impl Container for FakeContainer {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_public(&self) -> bool {
            self.public
        }

        async fn get(&self, key: &str) -> StorageResult<ObjectRecord> {
            self.calls.gets.fetch_add(1, Ordering::SeqCst);
            self.lookup(key).map(|(record, _)| record)
        }

        async fn read(&self, key: &str) -> StorageResult<(ObjectRecord, Bytes)> {
            self.calls.reads.fetch_add(1, Ordering::SeqCst);
            self.lookup(key)
        }

        async fn create(&self, request: WriteRequest) -> StorageResult<ObjectRecord> {
            let generation = self.calls.creates.fetch_add(1, Ordering::SeqCst) + 1;
            self.check_write(&request.key)?;
            let key = request.key.clone();
            self.objects
                .lock()
                .unwrap()
                .insert(key.clone(), (request, generation));
            self.lookup(&key).map(|(record, _)| record)
        }

        async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
            let (mut request, generation) = self
                .objects
                .lock()
                .unwrap()
                .get(from)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
            request.key = to.to_string();
            self.objects
                .lock()
                .unwrap()
                .insert(to.to_string(), (request, generation));
            Ok(())
        }

        async fn destroy(&self, key: &str) -> StorageResult<()> {
            self.calls.destroys.fetch_add(1, Ordering::SeqCst);
            self.check_write(key)?;
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<Option<String>> {
            self.calls.signs.fetch_add(1, Ordering::SeqCst);
            if !self.signs {
                return Ok(None);
            }
            Ok(Some(format!(
                "https://{}.fake.example.com/{}?expires={}",
                self.name,
                key,
                expires_in.as_secs()
            )))
        }
    }

    pub(crate) fn fake_adapter(config: StorageConfig) -> (StorageAdapter, Arc<Calls>) {
        fake_adapter_with(config, FakeConnector::new(StorageType::Aws))
    }

    pub(crate) fn fake_adapter_with(
        config: StorageConfig,
        connector: FakeConnector,
    ) -> (StorageAdapter, Arc<Calls>) {
        let calls = Arc::clone(&connector.calls);
        let adapter = StorageAdapter::builder(config)
            .with_connector(Arc::new(connector))
            .build()
            .unwrap();
        (adapter, calls)
    }

    fn assets() -> StorageConfig {
        StorageConfig::aws().with_container("assets")
    }

    #[test]
    fn test_build_requires_container() {
        let result = StorageAdapter::new(StorageConfig::memory());
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[test]
    fn test_config_accessors() {
        let adapter = StorageAdapter::new(
            assets()
                .with_option("access_key_id", "AKID")
                .with_custom_host("https://cdn.example.com")
                .with_public(false)
                .with_attribute("cache_control", "max-age=60"),
        )
        .unwrap();

        assert_eq!(adapter.container_name(), "assets");
        assert_eq!(adapter.custom_host(), Some("https://cdn.example.com"));
        assert!(!adapter.is_public());
        assert_eq!(adapter.extra_attributes()["cache_control"], "max-age=60");
        assert_eq!(adapter.credentials()["access_key_id"], "AKID");
        assert!(!adapter.credentials().contains_key("timeout"));
        assert_eq!(adapter.config().storage_type, StorageType::Aws);
    }

    #[tokio::test]
    async fn test_connection_is_memoized() {
        let (adapter, calls) = fake_adapter(assets());
        assert!(format!("{:?}", adapter).contains("connected=false"));

        let first = adapter.connection().await.unwrap();
        let second = adapter.connection().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(Calls::count(&calls.connects), 1);
        assert!(format!("{:?}", adapter).contains("connected=true"));
    }

    #[tokio::test]
    async fn test_failed_connection_is_not_cached() {
        let (adapter, calls) =
            fake_adapter_with(assets(), FakeConnector::failing(StorageType::Aws, 1));

        let err = adapter.connection().await.unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));

        adapter.connection().await.unwrap();
        adapter.connection().await.unwrap();
        assert_eq!(Calls::count(&calls.connects), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_connects_once() {
        let (adapter, calls) = fake_adapter(assets());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let adapter = adapter.clone();
                tokio::spawn(async move { adapter.directory().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(Calls::count(&calls.connects), 1);
        assert_eq!(Calls::count(&calls.containers), 1);
    }

    #[tokio::test]
    async fn test_container_created_at_most_once() {
        let (adapter, calls) = fake_adapter(assets());

        adapter
            .store("a.txt", SourceFile::new(b"a".to_vec()))
            .await
            .unwrap();
        adapter
            .store("b.txt", SourceFile::new(b"b".to_vec()))
            .await
            .unwrap();

        assert_eq!(Calls::count(&calls.containers), 1);
        assert_eq!(Calls::count(&calls.creates), 2);
    }

    #[tokio::test]
    async fn test_container_visibility_from_config() {
        let (adapter, _) = fake_adapter(assets().with_public(false));
        let container = adapter.directory().await.unwrap();
        assert_eq!(container.name(), "assets");
        assert!(!container.is_public());
    }

    #[tokio::test]
    async fn test_store_infers_content_type() {
        let (adapter, _) = fake_adapter(assets());

        let file = adapter
            .store(
                "uploads/1",
                SourceFile::new(b"{}".to_vec()).with_filename("data.json"),
            )
            .await
            .unwrap();
        assert_eq!(file.content_type(), Some("application/json"));

        let file = adapter
            .store("images/a.png", SourceFile::new(b"png".to_vec()))
            .await
            .unwrap();
        assert_eq!(file.content_type(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_retrieve_does_not_touch_backend() {
        let (adapter, calls) = fake_adapter(assets());

        let file = adapter.retrieve("images/a.png");
        assert_eq!(file.path(), "images/a.png");
        assert_eq!(Calls::count(&calls.connects), 0);
    }

    #[tokio::test]
    async fn test_delete_by_identifier() {
        let (adapter, calls) = fake_adapter(assets());
        adapter
            .store("a.txt", SourceFile::new(b"a".to_vec()))
            .await
            .unwrap();

        adapter.delete("a.txt").await.unwrap();
        assert_eq!(Calls::count(&calls.destroys), 1);
        let err = adapter.retrieve("a.txt").read().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_source_file_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let file = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(file.filename.as_deref(), Some("report.pdf"));
        assert_eq!(file.data, Bytes::from_static(b"%PDF-1.7"));
        assert_eq!(
            file.declared_content_type().as_deref(),
            Some("application/pdf")
        );

        let explicit = file.with_content_type("application/octet-stream");
        assert_eq!(
            explicit.declared_content_type().as_deref(),
            Some("application/octet-stream")
        );
    }
}
