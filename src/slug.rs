//! Slug derivation with collision resolution.
//!
//! A slug is the lowercase, hyphen-separated form of a title. When the base
//! candidate is taken, `-1`, `-2`, ... are appended until a free slug is
//! found. The probe loop is bounded; exhausting it is a [`ForumError::Conflict`].

use std::future::Future;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::ForumError;
use crate::store::StoreError;

/// Default number of suffixed candidates tried after the base slug.
pub const DEFAULT_MAX_SLUG_ATTEMPTS: u32 = 256;

/// Times an insert that lost a slug race regenerates and retries.
pub const SLUG_INSERT_RETRIES: u32 = 3;

/// Base slug used when a title has no usable characters.
pub const FALLBACK_SLUG: &str = "topic";

fn disallowed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s-]+").expect("static slug pattern"))
}

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s-]+").expect("static slug pattern"))
}

/// Lowercase `title` and reduce it to `[a-z0-9-]+`.
///
/// Characters outside `[a-z0-9]`, whitespace and `-` are deleted, so
/// "won't" becomes `wont`. Runs of whitespace and hyphens then collapse to a
/// single `-`, and leading and trailing separators are dropped. Never
/// returns an empty string.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = disallowed_regex().replace_all(&lowered, "");
    let collapsed = separator_regex().replace_all(&stripped, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Deterministic, bounded slug generator.
#[derive(Debug, Clone, Copy)]
pub struct SlugGenerator {
    max_attempts: u32,
}

impl Default for SlugGenerator {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_SLUG_ATTEMPTS,
        }
    }
}

impl SlugGenerator {
    /// Generator with [`DEFAULT_MAX_SLUG_ATTEMPTS`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that gives up after `max_attempts` suffixed candidates.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Derive a free slug for `title`.
    ///
    /// `exists` probes the relevant entity set for a candidate. Given the same
    /// title and the same set of taken slugs the result is always the same.
    pub async fn generate<F, Fut>(&self, title: &str, mut exists: F) -> Result<String, ForumError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool, StoreError>>,
    {
        let base = slugify(title);
        if !exists(base.clone()).await? {
            return Ok(base);
        }

        for suffix in 1..=self.max_attempts {
            let candidate = format!("{}-{}", base, suffix);
            if !exists(candidate.clone()).await? {
                tracing::debug!(base = %base, slug = %candidate, "resolved slug collision");
                return Ok(candidate);
            }
        }

        tracing::warn!(base = %base, attempts = self.max_attempts, "slug space exhausted");
        Err(ForumError::Conflict(format!(
            "Could not derive a unique slug for \"{}\" after {} attempts",
            base, self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn generate_against(taken: &HashSet<String>, title: &str, generator: SlugGenerator) -> Result<String, ForumError> {
        generator
            .generate(title, |candidate| {
                let hit = taken.contains(&candidate);
                async move { Ok(hit) }
            })
            .await
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rent in Lagos -- 2 bed?  "), "rent-in-lagos-2-bed");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn test_slugify_strips_non_ascii_and_punctuation() {
        assert_eq!(slugify("Landlord won't return my deposit (3 months later)"), "landlord-wont-return-my-deposit-3-months-later");
        assert_eq!(slugify("Café & Résidence!!"), "caf-rsidence");
        assert_eq!(slugify("2-bed/3-bath"), "2-bed3-bath");
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
    }

    #[tokio::test]
    async fn test_generate_appends_suffixes() {
        let mut taken = HashSet::new();
        let generator = SlugGenerator::new();

        for expected in ["hello-world", "hello-world-1", "hello-world-2"] {
            let slug = generate_against(&taken, "Hello World", generator).await.unwrap();
            assert_eq!(slug, expected);
            taken.insert(slug);
        }
    }

    #[tokio::test]
    async fn test_generate_is_bounded() {
        let mut taken = HashSet::new();
        taken.insert("busy".to_string());
        for i in 1..=3 {
            taken.insert(format!("busy-{}", i));
        }

        let err = generate_against(&taken, "Busy", SlugGenerator::with_max_attempts(3))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let slug = generate_against(&taken, "Busy", SlugGenerator::with_max_attempts(4))
            .await
            .unwrap();
        assert_eq!(slug, "busy-4");
    }

    #[tokio::test]
    async fn test_probe_failure_is_internal() {
        let err = SlugGenerator::new()
            .generate("Anything", |_| async { Err(StoreError::Backend("down".into())) })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
