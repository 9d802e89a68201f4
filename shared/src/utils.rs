use futures_util::TryStreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("watch request to {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Follows a newline-delimited JSON watch stream, handing every decoded
/// event to `handle_event`. Lines that fail to decode are logged and skipped.
///
/// Returns `Ok` once the server closes the stream.
pub async fn watch_stream<T, F>(
    client: &Client,
    url: &str,
    mut handle_event: F,
) -> Result<(), WatchError>
where
    T: DeserializeOwned,
    F: FnMut(T) + Send + 'static,
{
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|source| WatchError::Request {
            url: url.to_string(),
            source,
        })?;

    if !resp.status().is_success() {
        return Err(WatchError::Status {
            url: url.to_string(),
            status: resp.status(),
        });
    }

    let byte_stream = resp.bytes_stream().map_err(std::io::Error::other);
    let mut lines = BufReader::new(StreamReader::new(byte_stream)).lines();
    tracing::debug!(%url, "Started watching stream");

    let mut received = 0usize;
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(event) => {
                received += 1;
                handle_event(event)
            }
            Err(e) => tracing::warn!(error=%e, %line, "Failed to deserialize watch event"),
        }
    }

    tracing::warn!(%url, received, "Watch stream ended");
    Ok(())
}
