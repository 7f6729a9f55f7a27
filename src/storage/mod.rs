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

//! File storage over multiple cloud providers
//!
//! A [`StorageAdapter`] wraps one container on one backend (AWS S3, Azure
//! Blob Storage, GCS, a local directory or memory). Files are stored and
//! retrieved as [`StoredFile`] handles, which cache object metadata and
//! produce public or signed URLs depending on the configured visibility.
//!
//! Every backend is served through the `object_store` crate. Custom
//! backends can be plugged in through the [`Connector`] trait.

pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;
pub mod factory;
pub mod file;
pub mod object_store;

// Public exports
pub use adapter::{SourceFile, StorageAdapter, StorageAdapterBuilder};
pub use backend::{Connector, Container, ObjectRecord, StorageBackend, WriteRequest};
pub use config::{StorageConfig, StorageType};
pub use error::{StorageError, StorageResult};
pub use factory::StorageBackendFactory;
pub use file::StoredFile;
