use anyhow::{anyhow, Context, Result};
use std::time::Duration;

use super::{NotificationEvent, Notifier};

/// Local desktop popup via `notify-send` (libnotify). Best effort.
pub struct DesktopNotifier {
    program: String,
    expire: Duration,
    timeout: Duration,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            program: "notify-send".to_string(),
            expire: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }

    fn args(&self, ev: &NotificationEvent) -> Vec<String> {
        vec![
            "--app-name=Trump Post Analyzer".to_string(),
            format!("--expire-time={}", self.expire.as_millis()),
            ev.title().to_string(),
            ev.message(),
        ]
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        // The child is killed if the timeout drops the wait.
        let status = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(self.args(ev))
                .kill_on_drop(true)
                .status(),
        )
        .await
        .map_err(|_| anyhow!("{} timed out", self.program))?
        .with_context(|| format!("launching {}", self.program))?;

        if !status.success() {
            return Err(anyhow!("{} exited with {status}", self.program));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "desktop"
    }
}
