// Thumbnail fetch for a probed video

use std::path::Path;
use std::time::Duration;

use super::errors::DownloadError;

const THUMBNAIL_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(10);

/// Download `url` and write the image to `dest`. Returns the byte count.
pub async fn fetch_thumbnail(url: &str, dest: &Path) -> Result<usize, DownloadError> {
    let client = reqwest::Client::builder()
        .user_agent(THUMBNAIL_USER_AGENT)
        .timeout(THUMBNAIL_TIMEOUT)
        .build()?;

    tracing::debug!(url, "fetching thumbnail");

    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &bytes).await?;

    tracing::info!(path = %dest.display(), bytes = bytes.len(), "thumbnail saved");
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_a_network_error() {
        let dest = std::env::temp_dir().join("clipfetch-thumb-never-written.jpg");
        let err = fetch_thumbnail("not a url", &dest).await.unwrap_err();
        assert!(matches!(err, DownloadError::Network(_)));
        assert!(!dest.exists());
    }
}
