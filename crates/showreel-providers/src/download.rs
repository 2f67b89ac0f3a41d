// Streaming media download shared by the live providers.

use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use showreel_types::{ProductionError, ProductionResult};

use crate::retry::{classify_status, classify_transport};

/// Stream a URL to a local file, returning the byte count. Nothing counts
/// as produced until these bytes are on disk.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    local_path: &Path,
) -> ProductionResult<u64> {
    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ProductionError::ProviderTransient(format!("mkdir: {e}")))?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(classify_transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(
            status,
            format!("download of `{url}` failed with status {status}"),
        ));
    }

    let mut file = tokio::fs::File::create(local_path)
        .await
        .map_err(|e| ProductionError::ProviderTransient(format!("create file: {e}")))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_transport)?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ProductionError::ProviderTransient(format!("write: {e}")))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ProductionError::ProviderTransient(format!("flush: {e}")))?;

    tracing::debug!(url, path = %local_path.display(), bytes = written, "downloaded media");
    Ok(written)
}
