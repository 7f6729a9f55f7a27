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
use std::fmt::{Debug, Formatter};
use tracing::debug;

use super::adapter::StorageAdapter;
use super::backend::{ObjectRecord, WriteRequest};
use super::error::{StorageError, StorageResult};

/// One object within the adapter's container.
///
/// A `StoredFile` is created per store or retrieve call. Its path never
/// changes. Remote metadata is fetched on first use and cached until the
/// next write or delete through this handle, or an explicit [`invalidate`].
///
/// [`invalidate`]: StoredFile::invalidate
pub struct StoredFile {
    path: String,
    adapter: StorageAdapter,
    /// Set by the caller, authoritative over anything the backend reports.
    explicit_content_type: Option<String>,
    content_type: Option<String>,
    record: Option<ObjectRecord>,
    body: Option<Bytes>,
}

impl StoredFile {
    pub(crate) fn new(adapter: StorageAdapter, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            adapter,
            explicit_content_type: None,
            content_type: None,
            record: None,
            body: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path.
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn extension(&self) -> Option<&str> {
        let filename = self.filename();
        match filename.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
                Some(extension)
            }
            _ => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Override the content type. Later metadata fetches never replace it.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        let content_type = content_type.into();
        self.content_type = Some(content_type.clone());
        self.explicit_content_type = Some(content_type);
    }

    /// Drop cached metadata and body, e.g. after an out-of-band change.
    pub fn invalidate(&mut self) {
        self.record = None;
        self.body = None;
    }

    /// Write `data` to the backend, fully buffered.
    ///
    /// The content type is the explicit override if one was set, else
    /// `declared_content_type`, else a guess from the path. Extra attributes
    /// from the configuration are merged last and win.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The backend cannot be connected or the container cannot be resolved
    /// * The backend rejects the write (`StorageError::WriteError`)
    pub async fn store(
        &mut self,
        data: impl Into<Bytes>,
        declared_content_type: Option<&str>,
    ) -> StorageResult<()> {
        let content_type = self
            .explicit_content_type
            .clone()
            .or_else(|| declared_content_type.map(str::to_string))
            .unwrap_or_else(|| self.guess_content_type());

        let config = self.adapter.config();
        let request = WriteRequest::new(
            self.path.clone(),
            data.into(),
            Some(content_type),
            config.public,
        )
        .merge_attributes(&config.attributes);
        let stored_content_type = request.content_type.clone();

        let container = self.adapter.directory().await?;
        let record = container.create(request).await?;
        debug!(
            "Stored path={} size={} container={}",
            self.path,
            record.size,
            container.name()
        );

        self.content_type = stored_content_type;
        self.invalidate();
        Ok(())
    }

    /// Backend metadata of the object, fetched once and cached.
    ///
    /// The first fetch fills in the content type unless one was set
    /// explicitly.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    pub async fn attributes(&mut self) -> StorageResult<&ObjectRecord> {
        if self.record.is_none() {
            let container = self.adapter.directory().await?;
            let record = container.get(&self.path).await?;
            self.remember(record);
        }
        self.record
            .as_ref()
            .ok_or_else(|| StorageError::NotFound(self.path.clone()))
    }

    /// Content length in bytes.
    pub async fn size(&mut self) -> StorageResult<u64> {
        Ok(self.attributes().await?.size)
    }

    /// The full object body, fetched once and cached.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    pub async fn read(&mut self) -> StorageResult<Bytes> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }
        let container = self.adapter.directory().await?;
        let (record, body) = container.read(&self.path).await?;
        self.remember(record);
        self.body = Some(body.clone());
        Ok(body)
    }

    /// Whether the object exists. Other backend errors are returned as is.
    pub async fn exists(&mut self) -> StorageResult<bool> {
        match self.attributes().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// URL of the object according to the configured visibility.
    ///
    /// Private files get a signed URL, public files a public URL. `None`
    /// means no URL of that kind is available on this backend.
    pub async fn url(&self) -> StorageResult<Option<String>> {
        if self.adapter.is_public() {
            self.public_url().await
        } else {
            self.authenticated_url().await
        }
    }

    /// Public URL, derived from the custom host or the provider's URL
    /// pattern. Never fetches object metadata or resolves the container.
    pub async fn public_url(&self) -> StorageResult<Option<String>> {
        if let Some(host) = self.adapter.custom_host() {
            return Ok(Some(format!("{}/{}", host, self.path)));
        }
        let backend = self.adapter.connection().await?;
        Ok(backend.public_url(self.adapter.container_name(), &self.path))
    }

    /// Time-limited signed URL, `None` on backends that cannot sign.
    pub async fn authenticated_url(&self) -> StorageResult<Option<String>> {
        let backend = self.adapter.connection().await?;
        if !backend.supports_signed_urls() {
            return Ok(None);
        }
        let container = self.adapter.directory().await?;
        container
            .signed_url(&self.path, self.adapter.config().signed_url_expiry())
            .await
    }

    /// Remove the object from the backend.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::WriteError` if the backend rejects the delete.
    pub async fn delete(&mut self) -> StorageResult<()> {
        let container = self.adapter.directory().await?;
        container.destroy(&self.path).await?;
        debug!("Deleted path={} container={}", self.path, container.name());
        self.invalidate();
        Ok(())
    }

    /// Copy the object to `new_path` within the same container.
    ///
    /// The returned handle carries this file's content type as its own.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if this object does not exist.
    pub async fn copy_to(&self, new_path: impl Into<String>) -> StorageResult<StoredFile> {
        let mut copy = StoredFile::new(self.adapter.clone(), new_path);
        let container = self.adapter.directory().await?;
        container.copy(&self.path, &copy.path).await?;
        copy.content_type = self.content_type.clone();
        Ok(copy)
    }

    fn remember(&mut self, record: ObjectRecord) {
        if self.explicit_content_type.is_none() {
            if let Some(content_type) = &record.content_type {
                self.content_type = Some(content_type.clone());
            } else if self.content_type.is_none() {
                self.content_type = Some(self.guess_content_type());
            }
        }
        self.record = Some(record);
    }

    fn guess_content_type(&self) -> String {
        mime_guess::from_path(&self.path)
            .first_or_octet_stream()
            .to_string()
    }
}

impl Debug for StoredFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredFile")
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .field("container", &self.adapter.container_name())
            .field("cached", &self.record.is_some())
            .finish()
    }
}
