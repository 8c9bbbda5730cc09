//! Tag wiki excerpt cache.
//!
//! Entries expire `ttl` after their last access, not after insertion. A tag
//! without an excerpt is cached like any other outcome; a failed fetch is not.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::stackexchange::QuestionSource;

pub const DEFAULT_EXCERPT_TTL: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Debug, Clone)]
struct CachedExcerpt {
    excerpt: Option<String>,
    expires_at: Instant,
}

pub struct TagExcerptCache {
    source: Arc<dyn QuestionSource>,
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), CachedExcerpt>>,
}

impl TagExcerptCache {
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self::with_ttl(source, DEFAULT_EXCERPT_TTL)
    }

    pub fn with_ttl(source: Arc<dyn QuestionSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The excerpt of `tag` on `site`, fetched on a miss. Concurrent misses
    /// for the same key may each fetch.
    pub async fn get(&self, site: &str, tag: &str) -> Option<String> {
        let key = (site.to_string(), tag.to_string());
        if let Some(hit) = self.lookup(&key) {
            return hit;
        }

        match self.source.tag_excerpt(site, tag).await {
            Ok(excerpt) => {
                log::debug!("Caching excerpt of [{}] on {} (present: {})", tag, site, excerpt.is_some());
                let entry = CachedExcerpt {
                    excerpt: excerpt.clone(),
                    expires_at: Instant::now() + self.ttl,
                };
                self.entries.lock().expect("excerpt cache lock poisoned").insert(key, entry);
                excerpt
            }
            Err(e) => {
                log::warn!("Could not fetch excerpt of [{}] on {}: {}", tag, site, e);
                None
            }
        }
    }

    /// Live entry for `key`, with its expiry pushed out. Expired entries are
    /// dropped on the way.
    fn lookup(&self, key: &(String, String)) -> Option<Option<String>> {
        let mut entries = self.entries.lock().expect("excerpt cache lock poisoned");
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Some(entry.excerpt.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("excerpt cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
