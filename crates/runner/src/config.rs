use std::path::PathBuf;
use std::time::Duration;

use crate::error::BatchError;

/// Default ComfyUI address.
pub const DEFAULT_COMFYUI_HOST: &str = "127.0.0.1:8188";

/// Batch file used when none is given on the command line.
pub const DEFAULT_BATCH_FILE: &str = "./batchs/prompt-1.json";

/// Runner configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// `host:port` of the ComfyUI server.
    pub comfyui_host: String,
    /// Batch file to run when no positional argument is given.
    pub default_batch_file: PathBuf,
    /// Deadline for each completion signal; `None` waits indefinitely.
    pub completion_timeout: Option<Duration>,
}

impl RunnerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `COMFYUI_HOST`            | `127.0.0.1:8188`         |
    /// | `COMFYBATCH_DEFAULT_FILE` | `./batchs/prompt-1.json` |
    /// | `COMPLETION_TIMEOUT_SECS` | unset (no deadline)      |
    pub fn from_env() -> Result<Self, BatchError> {
        let comfyui_host =
            std::env::var("COMFYUI_HOST").unwrap_or_else(|_| DEFAULT_COMFYUI_HOST.into());

        let default_batch_file = std::env::var("COMFYBATCH_DEFAULT_FILE")
            .unwrap_or_else(|_| DEFAULT_BATCH_FILE.into())
            .into();

        let completion_timeout = std::env::var("COMPLETION_TIMEOUT_SECS")
            .ok()
            .map(|raw| parse_timeout_secs(&raw))
            .transpose()?;

        Ok(Self {
            comfyui_host,
            default_batch_file,
            completion_timeout,
        })
    }

    /// HTTP base URL, e.g. `http://127.0.0.1:8188`.
    pub fn api_url(&self) -> String {
        format!("http://{}", self.comfyui_host)
    }

    /// WebSocket base URL, e.g. `ws://127.0.0.1:8188`.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.comfyui_host)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            comfyui_host: DEFAULT_COMFYUI_HOST.into(),
            default_batch_file: DEFAULT_BATCH_FILE.into(),
            completion_timeout: None,
        }
    }
}

fn parse_timeout_secs(raw: &str) -> Result<Duration, BatchError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(BatchError::Config(format!(
            "COMPLETION_TIMEOUT_SECS must be a positive integer, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn urls_derive_from_host() {
        let config = RunnerConfig {
            comfyui_host: "gpu-box:8188".into(),
            ..Default::default()
        };
        assert_eq!(config.api_url(), "http://gpu-box:8188");
        assert_eq!(config.ws_url(), "ws://gpu-box:8188");
    }

    #[test]
    fn default_has_no_deadline() {
        let config = RunnerConfig::default();
        assert!(config.completion_timeout.is_none());
        assert_eq!(config.default_batch_file, PathBuf::from(DEFAULT_BATCH_FILE));
    }

    #[test]
    fn timeout_parses_seconds() {
        assert_eq!(parse_timeout_secs(" 600 ").unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert_matches!(parse_timeout_secs("0"), Err(BatchError::Config(_)));
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        assert_matches!(parse_timeout_secs("soon"), Err(BatchError::Config(_)));
    }
}
