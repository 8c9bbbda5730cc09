//! The query surface the pollers need from the remote service.
//!
//! `StackExchangeApi` is the production implementation. Pollers only see
//! this trait so they can run against canned data.

use async_trait::async_trait;

use crate::stackexchange::apicall::RemoteError;
use crate::stackexchange::model::Question;

/// Bulk question queries, all scoped to one site (`site` is the API site
/// parameter, e.g. `stackoverflow`).
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Questions tagged `tag` created after `created_after` (epoch seconds).
    async fn questions_by_tag(
        &self,
        site: &str,
        tag: &str,
        created_after: i64,
        limit: usize,
    ) -> Result<Vec<Question>, RemoteError>;

    /// Current state of up to 100 questions.
    async fn questions_by_ids(&self, site: &str, ids: &[i64], limit: usize) -> Result<Vec<Question>, RemoteError>;

    /// All pages of the featured (bountied) listing.
    async fn featured_questions(&self, site: &str, page_size: usize) -> Result<Vec<Question>, RemoteError>;

    /// Wiki excerpt of a tag.
    async fn tag_excerpt(&self, site: &str, tag: &str) -> Result<Option<String>, RemoteError>;
}
