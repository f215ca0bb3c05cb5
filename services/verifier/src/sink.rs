//! File sink: a subscriber that appends every frame as one JSON line

use crate::error::{Result, VerifierError};
use crate::subscriber::SubscriberRegistry;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinHandle;
use tracing::info;

/// Register a file subscriber on `registry` and spawn its writer.
///
/// The task ends after the registry releases the subscriber and the queue is
/// written out.
pub async fn spawn_file_sink(
    registry: &SubscriberRegistry,
    path: &Path,
    capacity: usize,
) -> Result<JoinHandle<Result<u64>>> {
    let file = File::create(path).await?;
    let (_, mut rx) = registry.register_with_capacity(format!("file:{}", path.display()), None, capacity)?;
    let shown = path.display().to_string();

    Ok(tokio::spawn(async move {
        let mut writer = BufWriter::new(file);
        let mut written = 0u64;
        while let Some(frame) = rx.recv().await {
            writer.write_all(frame.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            written += 1;
        }
        writer.flush().await?;
        info!(path = %shown, frames = written, "Output file closed");
        Ok::<_, VerifierError>(written)
    }))
}
