use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::WallpaperSetter;
use crate::constants::timing::COMMAND_POLL_MS;

/// Runs an external program with the absolute frame path as its last argument
#[derive(Debug, Clone)]
pub struct CommandSetter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSetter {
    /// `command_line` is split on whitespace: program first, then fixed arguments
    pub fn new(command_line: &str, timeout: Duration) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("Wallpaper command is empty");
        };
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

impl WallpaperSetter for CommandSetter {
    fn apply(&mut self, path: &Path) -> Result<()> {
        let absolute = std::path::absolute(path)
            .context(format!("Failed to resolve absolute path for {}", path.display()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&absolute)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .context(format!("Failed to spawn wallpaper command '{}'", self.program))?;

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()
                .context(format!("Failed to wait on wallpaper command '{}'", self.program))?
            {
                if !status.success() {
                    bail!("Wallpaper command '{}' exited with {}", self.program, status);
                }
                debug!(program = %self.program, path = %absolute.display(), "Wallpaper command finished");
                return Ok(());
            }

            if started.elapsed() >= self.timeout {
                warn!(program = %self.program, timeout_ms = self.timeout.as_millis() as u64, "Wallpaper command timed out, killing");
                if let Err(e) = child.kill() {
                    warn!(error = ?e, "Failed to kill timed-out wallpaper command");
                }
                // Reap so the child does not linger as a zombie
                let _ = child.wait();
                bail!(
                    "Wallpaper command '{}' did not finish within {}ms",
                    self.program,
                    self.timeout.as_millis()
                );
            }

            thread::sleep(Duration::from_millis(COMMAND_POLL_MS));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandSetter::new("   ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_command_split() {
        let setter = CommandSetter::new("feh --bg-fill --no-xinerama", Duration::from_secs(1)).unwrap();
        assert_eq!(setter.program, "feh");
        assert_eq!(setter.args, vec!["--bg-fill", "--no-xinerama"]);
    }

    #[test]
    fn test_successful_command() {
        let mut setter = CommandSetter::new("true", Duration::from_secs(5)).unwrap();
        assert!(setter.apply(Path::new("frame_0.png")).is_ok());
    }

    #[test]
    fn test_failing_command_reports_error() {
        let mut setter = CommandSetter::new("false", Duration::from_secs(5)).unwrap();
        assert!(setter.apply(Path::new("frame_0.png")).is_err());
    }

    #[test]
    fn test_missing_program_reports_error() {
        let mut setter = CommandSetter::new("life-wallpaper-no-such-program", Duration::from_secs(1)).unwrap();
        assert!(setter.apply(Path::new("frame_0.png")).is_err());
    }

    #[test]
    fn test_timeout_kills_command() {
        // `tail -f` on an existing file never exits on its own
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let mut setter = CommandSetter::new("tail -f", Duration::from_millis(100)).unwrap();
        let started = Instant::now();
        assert!(setter.apply(&manifest).is_err());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
