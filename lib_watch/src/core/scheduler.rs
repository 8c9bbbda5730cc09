//! # Poll Scheduler
//!
//! Runs a poller on a fixed cadence and publishes its latest list.
//!
//! Every refresh happens under one gate per poller. The periodic `tick`
//! only tries the gate and skips the cycle when it is held; `poll_now`
//! (used after a push announcement) waits for it. A failed refresh keeps
//! the previously published list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::bounty::BountyQuestions;
use crate::core::notify::Notifier;
use crate::core::recent::RecentQuestions;
use crate::core::site::SiteRef;
use crate::stackexchange::model::any_ignored;
use crate::stackexchange::{NewQuestionMessage, Question, RemoteError};

/// Default refresh cadence of a recent-questions poller.
pub const RECENT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Default refresh cadence of a bounty poller.
pub const BOUNTY_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// How often `run` checks whether a refresh is due.
pub const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// The polling strategy of a collection.
pub enum Poller {
    Recent(Arc<RecentQuestions>),
    Bounty(Arc<BountyQuestions>),
}

impl Poller {
    pub fn name(&self) -> String {
        match self {
            Poller::Recent(recent) => recent.name(),
            Poller::Bounty(bounty) => bounty.name(),
        }
    }

    pub fn site(&self) -> &SiteRef {
        match self {
            Poller::Recent(recent) => recent.site(),
            Poller::Bounty(bounty) => bounty.site(),
        }
    }

    pub fn default_interval(&self) -> Duration {
        match self {
            Poller::Recent(_) => RECENT_POLL_INTERVAL,
            Poller::Bounty(_) => BOUNTY_POLL_INTERVAL,
        }
    }

    async fn refresh(&self) -> Result<Vec<Question>, RemoteError> {
        match self {
            Poller::Recent(recent) => recent.refresh().await,
            Poller::Bounty(bounty) => bounty.refresh().await,
        }
    }

    pub fn is_faded(&self, question: &Question) -> bool {
        match self {
            Poller::Recent(recent) => recent.is_faded(question),
            Poller::Bounty(bounty) => bounty.is_faded(question),
        }
    }

    pub fn display_date(&self, question: &Question) -> i64 {
        match self {
            Poller::Recent(recent) => recent.display_date(question),
            Poller::Bounty(bounty) => bounty.display_date(question),
        }
    }

    /// Bounty listings have no notion of new items.
    pub fn is_new(&self, id: i64) -> bool {
        match self {
            Poller::Recent(recent) => recent.is_new(id),
            Poller::Bounty(_) => false,
        }
    }

    pub fn new_count(&self) -> usize {
        match self {
            Poller::Recent(recent) => recent.new_count(),
            Poller::Bounty(_) => 0,
        }
    }

    pub fn mark_all_seen(&self) {
        if let Poller::Recent(recent) = self {
            recent.mark_all_seen();
        }
    }
}

/// Result of a single `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another refresh holds the gate.
    Busy,
    /// The interval has not elapsed since the last refresh.
    NotDue,
    Refreshed,
    Failed,
}

pub struct Scheduled {
    poller: Poller,
    interval: Duration,
    tick_interval: Duration,
    /// Refresh gate; holds the instant of the last refresh attempt.
    gate: Mutex<Option<Instant>>,
    snapshot: watch::Sender<Arc<Vec<Question>>>,
    active: AtomicBool,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Scheduled {
    pub fn new(poller: Poller) -> Self {
        let interval = poller.default_interval();
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            poller,
            interval,
            tick_interval: TICK_INTERVAL,
            gate: Mutex::new(None),
            snapshot,
            active: AtomicBool::new(false),
            notifier: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn name(&self) -> String {
        self.poller.name()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Receiver of every list published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Question>>> {
        self.snapshot.subscribe()
    }

    /// The latest published list.
    pub fn snapshot(&self) -> Arc<Vec<Question>> {
        self.snapshot.borrow().clone()
    }

    /// Refreshes if the interval has elapsed, unless a refresh is running.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(mut last_poll) = self.gate.try_lock() else {
            log::warn!("{}: previous poll still running, skipping", self.name());
            return TickOutcome::Busy;
        };
        let due = last_poll.map_or(true, |at| at.elapsed() >= self.interval);
        if !due {
            return TickOutcome::NotDue;
        }
        if self.poll_locked(&mut last_poll).await {
            TickOutcome::Refreshed
        } else {
            TickOutcome::Failed
        }
    }

    /// Refreshes now, waiting for a running refresh to finish first.
    pub async fn poll_now(&self) -> bool {
        let mut last_poll = self.gate.lock().await;
        self.poll_locked(&mut last_poll).await
    }

    async fn poll_locked(&self, last_poll: &mut Option<Instant>) -> bool {
        *last_poll = Some(Instant::now());
        match self.poller.refresh().await {
            Ok(questions) => {
                log::debug!("{}: publishing {} question(s)", self.name(), questions.len());
                self.snapshot.send_replace(Arc::new(questions));
                true
            }
            Err(e) => {
                log::error!("{}: refresh failed, keeping the previous list: {}", self.name(), e);
                false
            }
        }
    }

    /// Ticks every `tick_interval` until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        self.active.store(true, Ordering::SeqCst);
        log::info!("Started: {} poller, every {:?}", self.name(), self.interval);

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.active.store(false, Ordering::SeqCst);
        log::info!("Stopped: {} poller", self.name());
    }

    /// Push listener entry point. Bounty pollers ignore announcements.
    pub async fn on_push_notification(&self, topic: String, message: NewQuestionMessage) {
        let Poller::Recent(recent) = &self.poller else {
            return;
        };
        if !recent.accept_push(&topic, &message).await {
            return;
        }

        if self.is_active() {
            self.poll_now().await;
        } else {
            log::debug!("{}: not running, deferring refresh to the first tick", self.name());
        }
        self.notify_new(recent, &message);
    }

    fn notify_new(&self, recent: &RecentQuestions, message: &NewQuestionMessage) {
        if any_ignored(&message.tags, recent.ignored_tags()) {
            log::debug!("{}: question {} has an ignored tag, not notifying", self.name(), message.id);
            return;
        }
        let Some(notifier) = &self.notifier else {
            return;
        };
        let title = self
            .snapshot()
            .iter()
            .find(|q| q.question_id == message.id)
            .map(|q| format!("New question: {}", q.title))
            .unwrap_or_else(|| format!("New question #{} on {}", message.id, recent.site().name));
        let body = format!("[{}]", message.tags.join(", "));
        notifier.notify(&title, &body);
    }
}
