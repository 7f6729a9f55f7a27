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

//! # Blob Depot
//!
//! A storage adapter for uploaded files that keeps application code
//! independent of where the bytes live.
//!
//! Supported backends are AWS S3, Azure Blob Storage, Google Cloud Storage,
//! a local directory and an in-memory store. The backend connection and the
//! target container are resolved lazily on first use and memoized per
//! adapter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blob_depot::{SourceFile, StorageAdapter, StorageConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = StorageConfig::local()
//!     .with_option("path", "./data")
//!     .with_container("uploads");
//! let adapter = StorageAdapter::new(config)?;
//!
//! let upload = SourceFile::from_path("./report.pdf").await?;
//! let mut file = adapter.store("reports/2024/report.pdf", upload).await?;
//! println!("{} bytes, {:?}", file.size().await?, file.content_type());
//! println!("{:?}", file.url().await?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Private files on S3
//!
//! ```rust,no_run
//! use blob_depot::{StorageAdapter, StorageConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = StorageConfig::aws()
//!     .with_container("invoices")
//!     .with_option("region", "eu-west-1")
//!     .with_option("access_key_id", "ACCESS_KEY")
//!     .with_option("secret_access_key", "SECRET_KEY")
//!     .with_public(false);
//!
//! let adapter = StorageAdapter::new(config)?;
//! // Signed, expires after the configured expiry (10 minutes by default)
//! let url = adapter.retrieve("2024/0001.pdf").url().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`storage`] - Adapter, stored files and the backend abstraction

pub mod storage;

// Re-export commonly used types
pub use storage::{
    SourceFile, StorageAdapter, StorageConfig, StorageError, StorageResult, StorageType,
    StoredFile,
};
