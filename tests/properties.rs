//! Property tests for slug derivation and pagination.

use std::collections::BTreeSet;

use proptest::prelude::*;
use property_forum::pagination::{resolve, total_pages, PageDefaults, MAX_PAGE_LIMIT};
use property_forum::{slugify, PageRequest, SlugGenerator, StoreError};

fn is_slug(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn generate(title: &str, taken: &BTreeSet<String>) -> String {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime
        .block_on(SlugGenerator::default().generate(title, |candidate| {
            let hit = taken.contains(&candidate);
            async move { Ok::<_, StoreError>(hit) }
        }))
        .unwrap()
}

#[test]
fn test_total_pages_reference_values() {
    assert_eq!(total_pages(45, 20), 3);
    assert_eq!(total_pages(0, 20), 1);
    assert_eq!(total_pages(20, 20), 1);
    assert_eq!(total_pages(21, 20), 2);
}

proptest! {
    #[test]
    fn slugify_output_is_url_safe(title in any::<String>()) {
        let slug = slugify(&title);
        prop_assert!(is_slug(&slug), "bad slug {:?} for {:?}", slug, title);
        prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
    }

    #[test]
    fn slugify_is_idempotent(title in "[ -~]{0,64}") {
        let once = slugify(&title);
        prop_assert_eq!(slugify(&once), once);
    }

    #[test]
    fn generated_slug_is_free_and_deterministic(
        title in "[A-Za-z ]{1,24}",
        suffixes in proptest::collection::btree_set(1u32..8, 0..6),
        base_taken in any::<bool>(),
    ) {
        let base = slugify(&title);
        let mut taken: BTreeSet<String> =
            suffixes.iter().map(|n| format!("{}-{}", base, n)).collect();
        if base_taken {
            taken.insert(base.clone());
        }

        let first = generate(&title, &taken);
        prop_assert!(is_slug(&first));
        prop_assert!(!taken.contains(&first));
        let suffixed_prefix = format!("{}-", base);
        prop_assert!(first == base || first.starts_with(&suffixed_prefix));
        prop_assert_eq!(generate(&title, &taken), first);
    }

    #[test]
    fn total_pages_covers_every_item(total in 0u64..1_000_000, limit in 1u32..=MAX_PAGE_LIMIT) {
        let pages = u64::from(total_pages(total, limit));
        prop_assert!(pages >= 1);
        prop_assert!(pages * u64::from(limit) >= total);
        if total > 0 {
            prop_assert!((pages - 1) * u64::from(limit) < total);
        }
    }

    #[test]
    fn resolved_requests_are_always_in_range(page in any::<Option<String>>(), limit in any::<Option<String>>()) {
        let request = resolve(page.as_deref(), limit.as_deref(), PageDefaults::default());
        prop_assert!(request.page >= 1);
        prop_assert!((1..=MAX_PAGE_LIMIT).contains(&request.limit));
        prop_assert_eq!(request.skip(), u64::from(request.page - 1) * u64::from(request.limit));
    }

    #[test]
    fn page_request_clamps_like_resolve(page in 0u32..10_000, limit in 0u32..500) {
        let direct = PageRequest::new(page, limit);
        let parsed = resolve(
            Some(&page.to_string()),
            Some(&limit.to_string()),
            PageDefaults::default(),
        );
        prop_assert_eq!(direct, parsed);
    }
}
