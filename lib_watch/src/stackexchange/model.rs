//! # StackExchange Data Model
//!
//! Wire types for the StackExchange REST API (snake_case JSON) and the
//! question push socket.

use serde::{Deserialize, Deserializer, Serialize};

/// A question snapshot as returned by the API.
///
/// Fields that the service occasionally omits default to zero/empty. A
/// question without a title is considered malformed and is filtered out by
/// the client before it reaches any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub accepted_answer_id: Option<i64>,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub answer_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub view_count: u32,
    #[serde(default)]
    pub bounty_amount: Option<u32>,
    /// Epoch seconds.
    #[serde(default)]
    pub bounty_closes_date: Option<i64>,
    #[serde(default)]
    pub closed_reason: Option<String>,
    /// Epoch seconds.
    #[serde(default)]
    pub closed_date: Option<i64>,
    /// Epoch seconds.
    pub creation_date: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Question {
    /// Whether the question has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed_date.is_some()
    }

    /// Whether any of the question's tags is in `watched`.
    pub fn has_any_tag<S: AsRef<str>>(&self, watched: &[S]) -> bool {
        self.tags
            .iter()
            .any(|tag| watched.iter().any(|w| w.as_ref() == tag))
    }

    /// Whether any tag starts with one of the ignored prefixes.
    pub fn has_ignored_tag<S: AsRef<str>>(&self, ignored_prefixes: &[S]) -> bool {
        any_ignored(&self.tags, ignored_prefixes)
    }
}

/// Whether any of `tags` starts with one of `ignored_prefixes`.
pub fn any_ignored<T: AsRef<str>, S: AsRef<str>>(tags: &[T], ignored_prefixes: &[S]) -> bool {
    tags.iter().any(|tag| {
        ignored_prefixes
            .iter()
            .any(|prefix| tag.as_ref().starts_with(prefix.as_ref()))
    })
}

/// Response envelope common to every API call.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub quota_max: u32,
    #[serde(default)]
    pub quota_remaining: u32,
    /// Seconds the service asks us to wait before repeating this kind of request.
    #[serde(default)]
    pub backoff: Option<u32>,
    #[serde(default)]
    pub has_more: bool,
}

/// Error body returned with 4xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_id: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub backoff: Option<u32>,
}

/// Tag wiki entry; only the excerpt is of interest.
#[derive(Debug, Clone, Deserialize)]
pub struct TagWiki {
    pub tag_name: String,
    #[serde(default)]
    pub excerpt: Option<String>,
}

/// A site of the StackExchange network.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSite {
    pub name: String,
    pub api_site_parameter: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub site_type: String,
}

/// Outer envelope of every socket frame other than `pong`.
///
/// `data` is itself a JSON document encoded as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketEnvelope {
    pub action: String,
    pub data: String,
}

/// Payload of a "new question" socket notification.
///
/// The socket only announces the id and tags; everything else has to be
/// fetched through the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestionMessage {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Topic string of the "newest questions with tag" feed on a site.
pub fn topic_for(site_id: u32, tag: &str) -> String {
    format!("{}-questions-newest-tag-{}", site_id, tag)
}
