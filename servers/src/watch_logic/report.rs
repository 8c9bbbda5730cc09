use std::sync::Arc;

use chrono::{DateTime, Local};
use lib_watch::core::{Poller, Scheduled};
use lib_watch::ingestors::PushSession;
use lib_watch::stackexchange::Question;
use tokio::sync::broadcast;

/// Logs every list a poller publishes, with new and faded markers, and
/// warns while the push socket is down.
pub async fn run(scheduled: Arc<Scheduled>, push: Arc<PushSession>, mut shutdown: broadcast::Receiver<()>) {
    let mut updates = scheduled.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Report for {} received shutdown signal.", scheduled.name());
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let questions = updates.borrow_and_update().clone();
                let push_down = matches!(scheduled.poller(), Poller::Recent(_)) && push.connection_error();
                log_list(&scheduled, &questions, push_down);
            }
        }
    }
}

fn log_list(scheduled: &Scheduled, questions: &[Question], push_down: bool) {
    let poller = scheduled.poller();
    log::info!(
        "{}: {} question(s), {} new",
        scheduled.name(),
        questions.len(),
        poller.new_count()
    );
    if push_down {
        log::warn!("{}: push connection lost, new questions arrive with polling only", scheduled.name());
    }
    for question in questions {
        log::info!("{}", format_line(poller, question));
    }
}

fn format_line(poller: &Poller, question: &Question) -> String {
    let marker = if poller.is_new(question.question_id) { "*" } else { " " };
    let faded = if poller.is_faded(question) { " (faded)" } else { "" };
    let date = DateTime::from_timestamp(poller.display_date(question), 0)
        .map(|at| at.with_timezone(&Local).format("%d %b %H:%M").to_string())
        .unwrap_or_default();
    format!(
        "{} {:>12} [{:>3}|{:>2}] {}{} {:?} {}",
        marker,
        date,
        question.score,
        question.answer_count,
        question.title,
        faded,
        question.tags,
        question.link
    )
}
