use crate::events::EngineCommand;
use crate::navigation::{Key, Navigator};
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Maps one line of operator input to an engine command.
///
/// `right`/`n` and `left`/`p` act as the arrow keys, a number jumps to that
/// slide (1-based), and `pause`, `resume` and `refresh` pass through.
pub fn parse_command(line: &str) -> Option<EngineCommand> {
    let word = line.trim().to_ascii_lowercase();
    let command = match word.as_str() {
        "right" | "n" | "next" => EngineCommand::Key(Key::ArrowRight),
        "left" | "p" | "prev" | "previous" => EngineCommand::Key(Key::ArrowLeft),
        "pause" => EngineCommand::Pause,
        "resume" => EngineCommand::Resume,
        "refresh" | "r" => EngineCommand::Refresh,
        other => {
            let position: usize = other.parse().ok()?;
            EngineCommand::JumpTo(position.checked_sub(1)?)
        }
    };
    Some(command)
}

/// Reads commands from stdin until it closes, then cancels the pipeline.
pub async fn run(navigator: Navigator, cancel: CancellationToken) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(command) => {
                        debug!(?command, "operator command");
                        if navigator.send(command).await.is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(input = %line.trim(), "unrecognized command"),
                },
                Ok(None) => {
                    info!("stdin closed; initiating shutdown");
                    cancel.cancel();
                    break;
                }
                Err(err) => {
                    warn!("stdin watcher failed: {err}");
                    break;
                }
            }
        }
    }
    Ok(())
}
