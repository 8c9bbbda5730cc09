//! Featured (bountied) questions of a site filtered to the watched tags.
//! Stateless between refreshes: every poll re-reads the whole listing.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::site::SiteRef;
use crate::stackexchange::{Question, QuestionSource, RemoteError, MAX_BATCH};

pub struct BountyQuestions {
    site: SiteRef,
    source: Arc<dyn QuestionSource>,
    watched_tags: Vec<String>,
    ignored_tags: Vec<String>,
    page_size: usize,
}

impl BountyQuestions {
    pub fn new(
        site: SiteRef,
        source: Arc<dyn QuestionSource>,
        watched_tags: Vec<String>,
        ignored_tags: Vec<String>,
    ) -> Self {
        Self {
            site,
            source,
            watched_tags,
            ignored_tags,
            page_size: MAX_BATCH,
        }
    }

    pub fn name(&self) -> String {
        format!("Bounty {}", self.site.name)
    }

    pub fn site(&self) -> &SiteRef {
        &self.site
    }

    pub fn watched_tags(&self) -> &[String] {
        &self.watched_tags
    }

    /// Watched featured questions, the soonest expiring bounty first.
    pub async fn refresh(&self) -> Result<Vec<Question>, RemoteError> {
        let featured = self
            .source
            .featured_questions(&self.site.api_site, self.page_size)
            .await?;
        let total = featured.len();

        let mut seen = HashSet::new();
        let mut matching: Vec<Question> = featured
            .into_iter()
            .filter(|q| q.has_any_tag(&self.watched_tags) && seen.insert(q.question_id))
            .collect();
        matching.sort_by_key(|q| q.bounty_closes_date.unwrap_or(i64::MAX));
        log::debug!("{}: {} of {} featured question(s) match", self.name(), matching.len(), total);
        Ok(matching)
    }

    pub fn is_faded(&self, question: &Question) -> bool {
        question.has_ignored_tag(&self.ignored_tags)
    }

    pub fn display_date(&self, question: &Question) -> i64 {
        question.bounty_closes_date.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{question, FakeSource};

    fn bountied(id: i64, closes: Option<i64>, tags: &[&str]) -> Question {
        let mut q = question(id, 1_700_000_000, tags);
        q.bounty_amount = Some(50);
        q.bounty_closes_date = closes;
        q
    }

    fn poller(source: &Arc<FakeSource>) -> BountyQuestions {
        BountyQuestions::new(
            SiteRef::new(1, "stackoverflow", "Stack Overflow"),
            source.clone(),
            vec!["rust".to_string()],
            vec!["unsafe".to_string()],
        )
    }

    #[tokio::test]
    async fn keeps_watched_tags_soonest_first() {
        let source = Arc::new(FakeSource::default());
        *source.featured.lock().unwrap() = vec![
            bountied(1, Some(300), &["rust"]),
            bountied(2, Some(100), &["go"]),
            bountied(3, None, &["rust", "wasm"]),
            bountied(4, Some(200), &["rust"]),
            bountied(4, Some(200), &["rust"]),
        ];
        let poller = poller(&source);

        let shown = poller.refresh().await.unwrap();
        let ids: Vec<i64> = shown.iter().map(|q| q.question_id).collect();
        assert_eq!(ids, vec![4, 1, 3]);
    }

    #[tokio::test]
    async fn errors_propagate() {
        let source = Arc::new(FakeSource::default());
        source.set_fail(true);
        assert!(poller(&source).refresh().await.is_err());
    }

    #[test]
    fn fading_and_dates() {
        let source = Arc::new(FakeSource::default());
        let poller = poller(&source);
        let plain = bountied(1, Some(500), &["rust"]);
        assert!(!poller.is_faded(&plain));
        assert!(poller.is_faded(&bountied(2, None, &["rust", "unsafe-code"])));
        assert_eq!(poller.display_date(&plain), 500);
        assert_eq!(poller.display_date(&bountied(3, None, &["rust"])), 0);
    }
}
