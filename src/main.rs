use sftp_explorer::error::SerializableError;
use sftp_explorer::{dispatch, logging, AppError, Command, Response, Workspace};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// One JSON command per stdin line, one JSON response per stdout line.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing(logging::DEFAULT_FILTER);

    let workspace = Workspace::open_default()
        .map_err(|e| anyhow::anyhow!("Failed to open workspace: {}", e))?;
    tracing::info!("sftp-explorer ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => dispatch(&workspace, command).await,
            Err(e) => Response::Error(SerializableError::from(&AppError::from(e))),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    workspace.shutdown().await;
    tracing::info!("stdin closed; all sessions released");
    Ok(())
}
