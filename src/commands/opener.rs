//! Opening result URLs outside the terminal

use anyhow::{bail, Context, Result};
use std::process::{Command, Stdio};
use tracing::debug;

/// Opens a URL for the user
pub trait Opener: Send {
    fn open(&mut self, url: &str) -> Result<()>;
}

/// Hands URLs to the platform's default browser
#[derive(Debug, Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(url: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

impl Opener for SystemOpener {
    fn open(&mut self, url: &str) -> Result<()> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("refusing to open non-http URL '{}'", url);
        }

        let mut cmd = Self::command(url);
        debug!("Opening {} with {:?}", url, cmd.get_program());
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch a browser for {}", url))?;
        Ok(())
    }
}
