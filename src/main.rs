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

use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

use blob_depot::{SourceFile, StorageAdapter, StorageConfig};

/// Store, fetch and link files through a configured storage backend
#[derive(Parser, Debug)]
#[command(name = "blob-depot", version)]
#[command(about = "Provider-agnostic file storage", long_about = None)]
struct Args {
    /// JSON storage configuration file
    #[arg(short, long, env = "BLOB_DEPOT_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file
    Put {
        /// Destination path in the container
        key: String,

        /// Local file to upload
        file: PathBuf,

        /// Content type, guessed from the file name when omitted
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download a file to stdout or to a local path
    Get {
        key: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the metadata of a file as JSON
    Stat { key: String },
    /// Print the public or signed URL of a file
    Url { key: String },
    /// Delete a file
    Rm { key: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = StorageConfig::from_file(&args.config)?;
    info!(
        "Using storage type={} container={}",
        config.storage_type, config.container
    );
    let adapter = StorageAdapter::new(config)?;

    match args.command {
        Command::Put {
            key,
            file,
            content_type,
        } => {
            let mut upload = SourceFile::from_path(&file).await?;
            if let Some(content_type) = content_type {
                upload = upload.with_content_type(content_type);
            }
            let stored = adapter.store(key, upload).await?;
            println!(
                "{} ({})",
                stored.path(),
                stored.content_type().unwrap_or("unknown")
            );
        }
        Command::Get { key, output } => {
            let data = adapter.retrieve(key).read().await?;
            match output {
                Some(output) => tokio::fs::write(&output, &data).await?,
                None => std::io::stdout().write_all(&data)?,
            }
        }
        Command::Stat { key } => {
            let mut file = adapter.retrieve(key);
            let record = file.attributes().await?.clone();
            println!("{}", serde_json::to_string_pretty(&record)?);
            if let Some(content_type) = file.content_type() {
                info!("Effective content_type={}", content_type);
            }
        }
        Command::Url { key } => match adapter.retrieve(&key).url().await? {
            Some(url) => println!("{}", url),
            None => warn!(
                "No URL available for key={} on {} storage",
                key,
                adapter.config().storage_type
            ),
        },
        Command::Rm { key } => {
            adapter.delete(&key).await?;
            info!("Deleted key={}", key);
        }
    }

    Ok(())
}
