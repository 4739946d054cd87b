use anyhow::{anyhow, Result};
use chrono::Utc;
use timekeeper::{scheduler, ConfigManager, InputMessage, Scheduler};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the output messages
    let env_filter = EnvFilter::from_default_env().add_directive("timekeeper=info".parse()?);
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting timekeeper");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/timekeeper.toml".to_string());
    let config_manager = ConfigManager::new(config_path).await?;
    let config = config_manager.get_current_config();

    let mut core = Scheduler::from_config(&config, Utc::now())?;
    core.load_persisted(Utc::now());
    info!(
        "Scheduler '{}' ready with {} schedules: {}",
        config.name,
        core.registry().len(),
        core.status()
    );

    let (handle, mut outputs, join) = scheduler::spawn(core);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outputs.recv().await {
            let line = match serde_json::to_string(&message) {
                Ok(line) => line,
                Err(e) => {
                    error!("✗ Failed to encode output message: {}", e);
                    continue;
                }
            };
            if let Err(e) = stdout.write_all(format!("{}\n", line).as_bytes()).await {
                error!("✗ Failed to write output: {}", e);
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match serde_json::from_str::<InputMessage>(&line) {
                    Ok(input) => handle.submit(input)?,
                    Err(e) => warn!("✗ Ignoring malformed input line: {}", e),
                },
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    error!("✗ Failed to read input: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    handle.shutdown().await?;
    join.await.map_err(|e| anyhow!("Scheduler task failed: {}", e))?;
    drop(handle);
    let _ = writer.await;
    info!("Timekeeper stopped");
    Ok(())
}
