// Error types for the download / encode pipeline

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Pasted link failed a platform-specific shape check
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// yt-dlp or ffmpeg could not be located
    #[error("Tool not found: {tool}\n\n{hint}")]
    ToolNotFound { tool: String, hint: String },

    /// Child process exited non-zero or could not be spawned
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Bounded invocation ran past its deadline and was killed
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Crop / trim / speed values rejected before building an encoder command
    #[error("Invalid edit parameters: {0}")]
    InvalidEditParams(String),

    /// The control that triggered the request is still running
    #[error("{0} is already running")]
    Busy(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl DownloadError {
    pub fn tool_not_found(tool: &str) -> Self {
        let hint = match tool {
            "ffmpeg" => "Install ffmpeg first: https://ffmpeg.org/download.html\n\
                         Then restart, or point CLIPFETCH_FFMPEG at the binary."
                .to_string(),
            _ => "Install yt-dlp first: https://github.com/yt-dlp/yt-dlp#installation\n\
                  Then restart, or point CLIPFETCH_YTDLP at the binary."
                .to_string(),
        };
        Self::ToolNotFound {
            tool: tool.to_string(),
            hint,
        }
    }

    /// Fail-fast categories never reach a child process.
    pub fn is_fail_fast(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::ToolNotFound { .. }
                | Self::InvalidEditParams(_)
                | Self::Busy(_)
        )
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

// Classify free-form tool output
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("unsupported url") || lower.contains("invalid url") {
            return Self::InvalidUrl(s);
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            let tool = if lower.contains("ffmpeg") { "ffmpeg" } else { "yt-dlp" };
            return Self::tool_not_found(tool);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::ParseError(s);
        }

        Self::ExecutionError(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_tool_output() {
        let e: DownloadError = "ERROR: Unsupported URL: https://example.com".to_string().into();
        assert!(matches!(e, DownloadError::InvalidUrl(_)));

        let e: DownloadError = "sh: ffmpeg: command not found".to_string().into();
        assert!(matches!(e, DownloadError::ToolNotFound { ref tool, .. } if tool == "ffmpeg"));

        let e: DownloadError = "Failed to parse JSON".to_string().into();
        assert!(matches!(e, DownloadError::ParseError(_)));

        let e: DownloadError = "exit code 1".to_string().into();
        assert!(matches!(e, DownloadError::ExecutionError(_)));
    }

    #[test]
    fn fail_fast_categories() {
        assert!(DownloadError::InvalidUrl("x".into()).is_fail_fast());
        assert!(DownloadError::tool_not_found("yt-dlp").is_fail_fast());
        assert!(!DownloadError::ExecutionError("x".into()).is_fail_fast());
        assert!(!DownloadError::Timeout(30).is_fail_fast());
    }

    #[test]
    fn tool_hint_mentions_remediation() {
        let msg = DownloadError::tool_not_found("ffmpeg").to_string();
        assert!(msg.contains("ffmpeg.org"));
        assert!(msg.contains("CLIPFETCH_FFMPEG"));
    }
}
