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

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Bad or missing credentials, unsupported provider, invalid settings.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The key does not exist in the container.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A create, copy or destroy call was rejected by the backend.
    #[error("Write to '{path}' failed: {source}")]
    WriteError {
        path: String,
        #[source]
        source: object_store::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl StorageError {
    /// Map an error from a read-side call, keeping NotFound distinguishable.
    pub fn from_read(path: &str, error: object_store::Error) -> Self {
        match error {
            object_store::Error::NotFound { .. } => StorageError::NotFound(path.to_string()),
            other => StorageError::ObjectStoreError(other),
        }
    }

    /// Wrap an error from a write-side call.
    pub fn from_write(path: &str, error: object_store::Error) -> Self {
        StorageError::WriteError {
            path: path.to_string(),
            source: error,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
