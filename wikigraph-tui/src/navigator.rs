use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use tracing::info;

/// Opens article URLs outside the terminal.
pub trait Navigator: Send {
    fn open(&self, url: &str) -> Result<()>;
}

/// Hands the URL to the platform's default opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNavigator;

impl Navigator for SystemNavigator {
    fn open(&self, url: &str) -> Result<()> {
        let mut command = if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(url);
            c
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };

        info!("Opening {}", url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to open {}", url))?;
        Ok(())
    }
}
