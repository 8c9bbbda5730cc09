//! In-memory `QuestionSource` for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::stackexchange::{Question, QuestionSource, RemoteError};

pub(crate) fn question(id: i64, created: i64, tags: &[&str]) -> Question {
    Question {
        question_id: id,
        title: format!("Question {}", id),
        link: format!("https://stackoverflow.com/q/{}", id),
        accepted_answer_id: None,
        score: 0,
        answer_count: 0,
        comment_count: 0,
        view_count: 0,
        bounty_amount: None,
        bounty_closes_date: None,
        closed_reason: None,
        closed_date: None,
        creation_date: created,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub(crate) fn closed(mut q: Question) -> Question {
    q.closed_date = Some(q.creation_date + 60);
    q.closed_reason = Some("Duplicate".to_string());
    q
}

/// Canned questions keyed by id. Tag queries filter the same pool.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub questions: Mutex<HashMap<i64, Question>>,
    pub featured: Mutex<Vec<Question>>,
    pub excerpts: Mutex<HashMap<String, Option<String>>>,
    pub tag_bounds: Mutex<Vec<i64>>,
    pub id_queries: Mutex<Vec<Vec<i64>>>,
    pub tag_calls: AtomicUsize,
    pub excerpt_calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Mutex<Duration>,
}

impl FakeSource {
    pub fn put(&self, q: Question) {
        self.questions.lock().unwrap().insert(q.question_id, q);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    async fn maybe_wait_and_fail(&self) -> Result<(), RemoteError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuestionSource for FakeSource {
    async fn questions_by_tag(
        &self,
        _site: &str,
        tag: &str,
        created_after: i64,
        limit: usize,
    ) -> Result<Vec<Question>, RemoteError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        self.tag_bounds.lock().unwrap().push(created_after);
        self.maybe_wait_and_fail().await?;
        let mut found: Vec<Question> = self
            .questions
            .lock()
            .unwrap()
            .values()
            .filter(|q| q.creation_date > created_after && q.tags.iter().any(|t| t == tag))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        found.truncate(limit);
        Ok(found)
    }

    async fn questions_by_ids(&self, _site: &str, ids: &[i64], _limit: usize) -> Result<Vec<Question>, RemoteError> {
        assert!(ids.len() <= 100);
        self.id_queries.lock().unwrap().push(ids.to_vec());
        self.maybe_wait_and_fail().await?;
        let pool = self.questions.lock().unwrap();
        let mut found: Vec<Question> = ids.iter().filter_map(|id| pool.get(id).cloned()).collect();
        found.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        Ok(found)
    }

    async fn featured_questions(&self, _site: &str, _page_size: usize) -> Result<Vec<Question>, RemoteError> {
        self.maybe_wait_and_fail().await?;
        Ok(self.featured.lock().unwrap().clone())
    }

    async fn tag_excerpt(&self, _site: &str, tag: &str) -> Result<Option<String>, RemoteError> {
        self.excerpt_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_wait_and_fail().await?;
        Ok(self.excerpts.lock().unwrap().get(tag).cloned().flatten())
    }
}
