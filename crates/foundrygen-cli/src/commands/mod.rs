//! Command implementations

use anyhow::{Context as _, Result};
use std::future::Future;
use std::io::Write;

use foundrygen_lib::{ClientSettings, MediaOutput};

pub mod image;
pub mod video;

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct RunContext {
    pub settings: ClientSettings,
    /// Use the blocking clients instead of the async runtime
    pub blocking: bool,
}

/// Drives `future` to completion on a fresh multi-threaded runtime
pub fn run_async<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Reports a saved file, or streams raw bytes to stdout
pub fn emit(output: MediaOutput) -> Result<()> {
    match output {
        MediaOutput::Saved(path) => {
            tracing::info!("Output written to {}", path.display());
            println!("{}", path.display());
        }
        MediaOutput::Bytes(bytes) => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .context("Failed to write output to stdout")?;
        }
    }
    Ok(())
}
