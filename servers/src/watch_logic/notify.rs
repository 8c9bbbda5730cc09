use lib_watch::core::Notifier;
use tokio::process::Command;

/// Desktop notifications through the `notify-send` command.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySend;

impl Notifier for NotifySend {
    fn notify(&self, title: &str, body: &str) {
        let title = title.to_string();
        let body = body.to_string();
        tokio::spawn(async move {
            match Command::new("notify-send").arg(&title).arg(&body).status().await {
                Ok(status) if status.success() => log::debug!("Notified: {}", title),
                Ok(status) => log::warn!("notify-send exited with {}", status),
                Err(e) => log::warn!("Failed to run notify-send: {}", e),
            }
        });
    }
}
