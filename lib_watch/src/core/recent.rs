//! # Recent Questions Engine
//!
//! Keeps a bounded set of recently asked questions for a site's watched tags
//! and reconciles it from two directions:
//!
//! - **push**: the socket announces a new id, which is added right away and
//!   flagged as new after a short grace period.
//! - **pull**: a periodic refresh lists each watched tag (at most every
//!   `tag_interval`), then re-reads all members by id and drops the ones
//!   that were closed or lost every watched tag.
//!
//! `refresh` must be serialized by the caller (see `core::scheduler`); the
//! push path only touches the id set under its internal lock.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::time::Instant;

use crate::core::site::SiteRef;
use crate::core::watch_set::WatchSet;
use crate::stackexchange::{NewQuestionMessage, Question, QuestionSource, RemoteError};

static TOPIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-questions-newest-tag-(.+)$").expect("topic pattern compiles"));

/// Splits a push topic into site id and tag.
pub fn parse_topic(topic: &str) -> Option<(u32, String)> {
    let captures = TOPIC_PATTERN.captures(topic)?;
    let site_id = captures.get(1)?.as_str().parse().ok()?;
    Some((site_id, captures.get(2)?.as_str().to_string()))
}

#[derive(Debug, Clone)]
pub struct RecentSettings {
    /// Maximum number of watched questions, 1..=100.
    pub limit: usize,
    /// How far back a tag listing reaches.
    pub tag_window: Duration,
    /// Minimum time between two tag listings.
    pub tag_interval: Duration,
    /// Delay between accepting a pushed id and flagging it as new.
    pub push_grace: Duration,
}

impl Default for RecentSettings {
    fn default() -> Self {
        Self {
            limit: 80,
            tag_window: Duration::from_secs(14 * 24 * 60 * 60),
            tag_interval: Duration::from_secs(15 * 60),
            push_grace: Duration::from_secs(1),
        }
    }
}

struct RecentState {
    watch: WatchSet,
    last_tag_refresh: Option<Instant>,
    displayed: Arc<Vec<Question>>,
}

pub struct RecentQuestions {
    site: SiteRef,
    source: Arc<dyn QuestionSource>,
    watched_tags: Vec<String>,
    ignored_tags: Vec<String>,
    settings: RecentSettings,
    state: Mutex<RecentState>,
}

impl RecentQuestions {
    pub fn new(
        site: SiteRef,
        source: Arc<dyn QuestionSource>,
        watched_tags: Vec<String>,
        ignored_tags: Vec<String>,
        settings: RecentSettings,
    ) -> Self {
        let state = RecentState {
            watch: WatchSet::new(settings.limit),
            last_tag_refresh: None,
            displayed: Arc::new(Vec::new()),
        };
        Self {
            site,
            source,
            watched_tags,
            ignored_tags,
            settings,
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> String {
        format!("Recent {}", self.site.name)
    }

    pub fn site(&self) -> &SiteRef {
        &self.site
    }

    pub fn watched_tags(&self) -> &[String] {
        &self.watched_tags
    }

    pub fn ignored_tags(&self) -> &[String] {
        &self.ignored_tags
    }

    fn lock(&self) -> MutexGuard<'_, RecentState> {
        self.state.lock().expect("recent questions lock poisoned")
    }

    /// Handles a socket announcement. Returns true when the id was new to
    /// this engine and has been added.
    pub async fn accept_push(&self, topic: &str, message: &NewQuestionMessage) -> bool {
        let Some((site_id, tag)) = parse_topic(topic) else {
            log::warn!("{}: ignoring announcement with malformed topic {:?}", self.name(), topic);
            return false;
        };
        if site_id != self.site.site_id || !self.watched_tags.contains(&tag) {
            log::debug!("{}: ignoring announcement for {}/[{}]", self.name(), site_id, tag);
            return false;
        }

        let id = message.id;
        {
            let mut state = self.lock();
            if !state.watch.push(id) {
                log::debug!("{}: question {} is already watched", self.name(), id);
                return false;
            }
            state.watch.evict_excess();
        }
        log::info!("{}: received question {} {:?}", self.name(), id, message.tags);

        tokio::time::sleep(self.settings.push_grace).await;

        // No-op when the id was evicted or removed during the grace period.
        self.lock().watch.mark_new(id);
        true
    }

    fn tag_refresh_due(&self) -> bool {
        match self.lock().last_tag_refresh {
            None => true,
            Some(at) => at.elapsed() >= self.settings.tag_interval,
        }
    }

    /// Tag listing followed by the by-id validation. Returns the questions
    /// to display, newest first. On error the engine state is left as the
    /// failed step found it and nothing is displayed anew.
    pub async fn refresh(&self) -> Result<Vec<Question>, RemoteError> {
        if self.tag_refresh_due() {
            self.refresh_by_tags().await?;
        }

        let ids = self.lock().watch.ids();
        if ids.is_empty() {
            self.lock().displayed = Arc::new(Vec::new());
            return Ok(Vec::new());
        }

        let fetched = self
            .source
            .questions_by_ids(&self.site.api_site, &ids, self.settings.limit)
            .await?;
        Ok(self.validate(fetched))
    }

    async fn refresh_by_tags(&self) -> Result<(), RemoteError> {
        let window_start = Utc::now().timestamp() - self.settings.tag_window.as_secs() as i64;
        let (created_after, first_load) = {
            let state = self.lock();
            let oldest_displayed = state.displayed.iter().map(|q| q.creation_date).min();
            (
                oldest_displayed.map_or(window_start, |oldest| oldest.max(window_start)),
                state.last_tag_refresh.is_none(),
            )
        };

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for tag in &self.watched_tags {
            let found = self
                .source
                .questions_by_tag(&self.site.api_site, tag, created_after, self.settings.limit)
                .await?;
            merged.extend(found.into_iter().filter(|q| seen.insert(q.question_id)));
        }
        merged.retain(|q| !q.is_closed());
        merged.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        merged.truncate(self.settings.limit);

        let mut state = self.lock();
        let fresh: Vec<&Question> = merged
            .iter()
            .filter(|q| !state.watch.contains(q.question_id))
            .collect();
        let ids: Vec<i64> = merged.iter().map(|q| q.question_id).collect();
        state.watch.add_oldest_first(&ids);

        if first_load {
            log::info!("{}: starting with {} question(s)", self.name(), ids.len());
        } else {
            for question in fresh {
                log::info!(
                    "{}: new question {} created {}: {}",
                    self.name(),
                    question.question_id,
                    format_epoch(question.creation_date),
                    question.title
                );
                state.watch.mark_new(question.question_id);
            }
        }
        state.watch.evict_excess();
        state.last_tag_refresh = Some(Instant::now());
        Ok(())
    }

    fn validate(&self, fetched: Vec<Question>) -> Vec<Question> {
        let mut closed = Vec::new();
        let mut mistagged = Vec::new();
        let mut survivors = Vec::new();
        for question in fetched {
            if question.is_closed() {
                closed.push(question.question_id);
            } else if !question.has_any_tag(&self.watched_tags) {
                mistagged.push(question.question_id);
            } else {
                survivors.push(question);
            }
        }

        let mut state = self.lock();
        for id in closed.iter().chain(mistagged.iter()) {
            state.watch.remove(*id);
        }
        if !closed.is_empty() {
            log::info!("{}: removed closed question(s) {:?}", self.name(), closed);
        }
        if !mistagged.is_empty() {
            log::info!("{}: removed question(s) without a watched tag {:?}", self.name(), mistagged);
        }
        state.watch.evict_excess();

        survivors.retain(|q| state.watch.contains(q.question_id));
        survivors.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        state.displayed = Arc::new(survivors.clone());
        survivors
    }

    pub fn mark_all_seen(&self) {
        self.lock().watch.mark_all_seen();
    }

    pub fn mark_seen(&self, id: i64) -> bool {
        self.lock().watch.mark_seen(id)
    }

    pub fn is_new(&self, id: i64) -> bool {
        self.lock().watch.is_new(id)
    }

    pub fn new_count(&self) -> usize {
        self.lock().watch.new_count()
    }

    /// Watched ids, oldest first.
    pub fn watched_ids(&self) -> Vec<i64> {
        self.lock().watch.ids()
    }

    pub fn is_faded(&self, question: &Question) -> bool {
        question.is_closed() || question.has_ignored_tag(&self.ignored_tags)
    }

    pub fn display_date(&self, question: &Question) -> i64 {
        question.creation_date
    }
}

pub(crate) fn format_epoch(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{closed, question, FakeSource};
    use std::sync::atomic::Ordering;

    const SITE_ID: u32 = 1;

    fn engine(source: &Arc<FakeSource>, limit: usize) -> RecentQuestions {
        let settings = RecentSettings {
            limit,
            ..RecentSettings::default()
        };
        RecentQuestions::new(
            SiteRef::new(SITE_ID, "stackoverflow", "Stack Overflow"),
            source.clone(),
            vec!["rust".to_string(), "tokio".to_string()],
            vec!["python".to_string()],
            settings,
        )
    }

    fn ids(questions: &[Question]) -> Vec<i64> {
        questions.iter().map(|q| q.question_id).collect()
    }

    fn announcement(id: i64, tags: &[&str]) -> NewQuestionMessage {
        NewQuestionMessage {
            id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn next_tag_refresh() {
        tokio::time::advance(RecentSettings::default().tag_interval).await;
    }

    #[test]
    fn topics_are_parsed() {
        assert_eq!(
            parse_topic("1-questions-newest-tag-c++"),
            Some((1, "c++".to_string()))
        );
        assert_eq!(parse_topic("questions-newest-tag-rust"), None);
        assert_eq!(parse_topic("1-questions-active"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn first_load_marks_nothing_new() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(1, now - 300, &["rust"]));
        source.put(question(2, now - 200, &["tokio"]));
        source.put(question(3, now - 100, &["rust", "tokio"]));
        let engine = engine(&source, 10);

        let shown = engine.refresh().await.unwrap();
        assert_eq!(ids(&shown), vec![3, 2, 1]);
        assert_eq!(engine.new_count(), 0);
        assert_eq!(engine.watched_ids(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn later_tag_listing_marks_unseen_ids() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(1, now - 300, &["rust"]));
        let engine = engine(&source, 10);
        engine.refresh().await.unwrap();

        source.put(question(2, now - 100, &["rust"]));
        engine.refresh().await.unwrap();
        assert!(!engine.is_new(2), "tag listing is not due yet");
        assert_eq!(source.tag_calls.load(Ordering::SeqCst), 2);

        next_tag_refresh().await;
        let shown = engine.refresh().await.unwrap();
        assert_eq!(ids(&shown), vec![2, 1]);
        assert!(engine.is_new(2));
        assert!(!engine.is_new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn listing_after_list_emptied_still_marks_new() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(1, now - 300, &["rust"]));
        let engine = engine(&source, 10);
        engine.refresh().await.unwrap();

        source.put(closed(question(1, now - 300, &["rust"])));
        assert!(engine.refresh().await.unwrap().is_empty());

        source.put(question(2, now - 100, &["rust"]));
        next_tag_refresh().await;
        let shown = engine.refresh().await.unwrap();
        assert_eq!(ids(&shown), vec![2]);
        assert!(engine.is_new(2));
        assert_eq!(engine.new_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lower_bound_follows_oldest_displayed() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(1, now - 500, &["rust"]));
        source.put(question(2, now - 100, &["rust"]));
        let engine = engine(&source, 10);

        engine.refresh().await.unwrap();
        next_tag_refresh().await;
        engine.refresh().await.unwrap();

        let bounds = source.tag_bounds.lock().unwrap().clone();
        let window = RecentSettings::default().tag_window.as_secs() as i64;
        assert!(bounds[0] <= now - window + 5);
        assert_eq!(bounds[2], now - 500);
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_are_evicted_and_markers_follow() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(10, now - 300, &["rust"]));
        source.put(question(11, now - 200, &["rust"]));
        let engine = engine(&source, 2);
        engine.refresh().await.unwrap();
        assert_eq!(engine.watched_ids(), vec![10, 11]);

        source.put(question(12, now - 100, &["rust"]));
        next_tag_refresh().await;
        let shown = engine.refresh().await.unwrap();

        assert_eq!(engine.watched_ids(), vec![11, 12]);
        assert!(engine.is_new(12));
        assert_eq!(engine.new_count(), 1);
        assert_eq!(ids(&shown), vec![12, 11]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_questions_are_dropped_for_good() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(1, now - 300, &["rust"]));
        source.put(question(2, now - 200, &["rust"]));
        let engine = engine(&source, 10);
        engine.refresh().await.unwrap();

        source.put(closed(question(2, now - 200, &["rust"])));
        let shown = engine.refresh().await.unwrap();
        assert_eq!(ids(&shown), vec![1]);
        assert_eq!(engine.watched_ids(), vec![1]);

        next_tag_refresh().await;
        let shown = engine.refresh().await.unwrap();
        assert_eq!(ids(&shown), vec![1]);
        assert!(!engine.watched_ids().contains(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn retagged_questions_are_dropped() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(1, now - 300, &["rust"]));
        source.put(question(2, now - 200, &["tokio"]));
        let engine = engine(&source, 10);
        engine.refresh().await.unwrap();

        source.put(question(2, now - 200, &["go"]));
        let shown = engine.refresh().await.unwrap();
        assert_eq!(ids(&shown), vec![1]);
        assert_eq!(engine.watched_ids(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_set_skips_the_id_query() {
        let source = Arc::new(FakeSource::default());
        let engine = engine(&source, 10);

        assert!(engine.refresh().await.unwrap().is_empty());
        assert!(source.id_queries.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_state() {
        let now = Utc::now().timestamp();
        let source = Arc::new(FakeSource::default());
        source.put(question(1, now - 300, &["rust"]));
        let engine = engine(&source, 10);
        engine.refresh().await.unwrap();

        source.set_fail(true);
        assert!(engine.refresh().await.is_err());
        assert_eq!(engine.watched_ids(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_id_is_flagged_after_grace() {
        let source = Arc::new(FakeSource::default());
        let engine = Arc::new(engine(&source, 10));

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move {
                engine
                    .accept_push("1-questions-newest-tag-rust", &announcement(42, &["rust"]))
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(engine.watched_ids(), vec![42]);
        assert!(!engine.is_new(42));

        assert!(pending.await.unwrap());
        assert!(engine.is_new(42));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_during_grace_stays_within_the_limit() {
        let source = Arc::new(FakeSource::default());
        let engine = Arc::new(engine(&source, 100));
        engine.refresh().await.unwrap();
        let topic = "1-questions-newest-tag-rust";
        for id in 1..=100 {
            source.put(question(id, id, &["rust"]));
            engine.accept_push(topic, &announcement(id, &["rust"])).await;
        }
        source.put(question(101, 101, &["rust"]));

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.accept_push(topic, &announcement(101, &["rust"])).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(engine.watched_ids().len(), 100);
        assert!(!engine.watched_ids().contains(&1));

        let shown = engine.refresh().await.unwrap();
        assert_eq!(shown.len(), 100);
        assert_eq!(source.id_queries.lock().unwrap().last().map(Vec::len), Some(100));

        assert!(pending.await.unwrap());
        assert!(engine.is_new(101));
        assert_eq!(engine.watched_ids().len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_push_is_a_no_op() {
        let source = Arc::new(FakeSource::default());
        let engine = engine(&source, 10);
        let topic = "1-questions-newest-tag-rust";

        assert!(engine.accept_push(topic, &announcement(42, &["rust"])).await);
        engine.mark_seen(42);
        assert!(!engine.accept_push(topic, &announcement(42, &["rust"])).await);
        assert_eq!(engine.watched_ids(), vec![42]);
        assert!(!engine.is_new(42));
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_pushes_leave_state_unchanged() {
        let source = Arc::new(FakeSource::default());
        let engine = engine(&source, 10);

        assert!(!engine.accept_push("1-questions-newest-tag-go", &announcement(1, &["go"])).await);
        assert!(!engine.accept_push("2-questions-newest-tag-rust", &announcement(2, &["rust"])).await);
        assert!(!engine.accept_push("garbage", &announcement(3, &["rust"])).await);
        assert!(engine.watched_ids().is_empty());
        assert_eq!(engine.new_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_respect_the_limit() {
        let source = Arc::new(FakeSource::default());
        let engine = engine(&source, 3);
        for id in 1..=5 {
            engine
                .accept_push("1-questions-newest-tag-tokio", &announcement(id, &["tokio"]))
                .await;
        }
        assert_eq!(engine.watched_ids(), vec![3, 4, 5]);
        assert_eq!(engine.new_count(), 3);
    }

    #[test]
    fn fading_and_dates() {
        let source = Arc::new(FakeSource::default());
        let engine = engine(&source, 10);
        let open = question(1, 1_700_000_000, &["rust"]);
        assert!(!engine.is_faded(&open));
        assert!(engine.is_faded(&closed(open.clone())));
        assert!(engine.is_faded(&question(2, 0, &["rust", "python-3.x"])));
        assert_eq!(engine.display_date(&open), 1_700_000_000);
        assert_eq!(format_epoch(0), "1970-01-01 00:00");
    }
}
