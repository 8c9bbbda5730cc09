/// Sink for "new question" alerts raised from the push path.
///
/// Implementations must not block; anything slow (spawning a process,
/// talking to a bus) belongs on a separate task.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Writes alerts to the log. Used when desktop notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("{} {}", title, body);
    }
}
