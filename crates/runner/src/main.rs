//! `comfybatch` -- run a batch of parameterized ComfyUI jobs.
//!
//! Usage: `comfybatch [BATCH_FILE]`
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default                  | Description                          |
//! |---------------------------|----------|--------------------------|--------------------------------------|
//! | `COMFYUI_HOST`            | no       | `127.0.0.1:8188`         | ComfyUI `host:port`                  |
//! | `COMFYBATCH_DEFAULT_FILE` | no       | `./batchs/prompt-1.json` | Batch file when no argument is given |
//! | `COMPLETION_TIMEOUT_SECS` | no       | --                       | Per-prompt completion deadline       |
//! | `RUST_LOG`                | no       | `info` for this tool     | Log filter                           |

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use comfybatch_runner::config::RunnerConfig;
use comfybatch_runner::runner::{run_batch_file, RunOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "comfybatch_runner=info,comfybatch_comfyui=info,comfybatch_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RunnerConfig::from_env()?;
    let batch_file = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.default_batch_file.clone());

    tracing::info!(
        batch_file = %batch_file.display(),
        comfyui_host = %config.comfyui_host,
        completion_timeout = ?config.completion_timeout,
        "Starting comfybatch",
    );

    match run_batch_file(&batch_file, &config).await? {
        RunOutcome::Completed(report) => {
            tracing::info!(
                items = report.items,
                images_saved = report.images_saved,
                "All batch items processed",
            );
        }
        RunOutcome::BatchFileMissing(_) => {}
    }

    Ok(())
}
