//! Cross-entity search over posts and categories.
//!
//! | type         | posts                 | categories   | totals                 |
//! |--------------|-----------------------|--------------|------------------------|
//! | `posts`      | caller's page/limit   | none         | post match count       |
//! | `categories` | none                  | first 20     | categories returned    |
//! | `all`        | first 10              | first 5      | sum of returned sets   |

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ForumError, ForumResult};
use crate::pagination::{resolve, PageDefaults};
use crate::projection::{category_summaries, non_blank, summarize_posts};
use crate::store::{CategorySearch, ForumStore, PostSearch};
use crate::types::{Category, CategoryId, CategoryMatch, PostSummary};

/// Shortest accepted query, in characters, after trimming.
pub const MIN_QUERY_CHARS: usize = 2;
/// Category results for a `categories` search.
pub const CATEGORY_RESULTS_LIMIT: u32 = 20;
/// Post results for an `all` search.
pub const ALL_POSTS_CAP: u32 = 10;
/// Category results for an `all` search.
pub const ALL_CATEGORIES_CAP: u32 = 5;

/// Which entities a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Posts only, paged.
    Posts,
    /// Active categories only.
    Categories,
    /// A capped sample of both.
    #[default]
    All,
}

impl SearchKind {
    /// Parse a search type; blank means [`SearchKind::All`].
    pub fn parse(raw: Option<&str>) -> ForumResult<Self> {
        match non_blank(raw).map(str::to_lowercase).as_deref() {
            None | Some("all") => Ok(Self::All),
            Some("posts") => Ok(Self::Posts),
            Some("categories") => Ok(Self::Categories),
            Some(other) => Err(ForumError::validation(format!(
                "Invalid search type: {}",
                other
            ))),
        }
    }
}

/// Raw search parameters as received from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Search text (`q`).
    #[serde(rename = "q")]
    pub query: Option<String>,
    /// Search type (`type`).
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Restrict posts to one category.
    pub category_id: Option<String>,
    /// Restrict matches to a city.
    pub city: Option<String>,
    /// Requested page, 1-based.
    pub page: Option<String>,
    /// Requested page size.
    pub limit: Option<String>,
}

impl SearchParams {
    /// Parameters for a plain query.
    pub fn query(q: impl Into<String>) -> Self {
        Self {
            query: Some(q.into()),
            ..Self::default()
        }
    }

    /// Restrict to one kind (`posts`, `categories` or `all`).
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// The query after trimming.
    pub query: String,
    /// Matching posts.
    pub posts: Vec<PostSummary>,
    /// Matching categories.
    pub categories: Vec<CategoryMatch>,
    /// Total matches for `posts` and `categories`, returned set sizes for `all`.
    pub total_results: u64,
    /// Page that was served.
    pub current_page: u32,
    /// Page count at the served limit.
    pub total_pages: u32,
}

/// Validate and trim a raw query.
pub fn normalize_query(raw: Option<&str>) -> ForumResult<String> {
    let query = non_blank(raw).ok_or_else(|| ForumError::validation("Search query is required"))?;
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(ForumError::validation(format!(
            "Search query must be at least {} characters",
            MIN_QUERY_CHARS
        )));
    }
    Ok(query.to_string())
}

/// Search over the forum.
pub struct SearchIndex<S: ForumStore> {
    store: Arc<S>,
}

impl<S: ForumStore> SearchIndex<S> {
    /// Create a search index over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Run a search. All input is validated before the store is touched.
    pub async fn search(&self, params: &SearchParams) -> ForumResult<SearchResults> {
        let query = normalize_query(params.query.as_deref())?;
        let kind = SearchKind::parse(params.kind.as_deref())?;
        let category_id = non_blank(params.category_id.as_deref())
            .map(|raw| {
                CategoryId::parse(raw)
                    .map_err(|_| ForumError::validation(format!("Invalid categoryId: {}", raw)))
            })
            .transpose()?;
        let city = non_blank(params.city.as_deref()).map(str::to_string);

        let post_search = PostSearch {
            text: query.clone(),
            category_id,
            city: city.clone(),
        };
        let category_search = CategorySearch {
            text: query.clone(),
            city,
        };

        let results = match kind {
            SearchKind::Posts => {
                let page = resolve(
                    params.page.as_deref(),
                    params.limit.as_deref(),
                    PageDefaults::default(),
                );
                let total = self.store.count_search_posts(&post_search).await?;
                let posts = self
                    .store
                    .search_posts(&post_search, page.skip(), page.limit)
                    .await?;
                SearchResults {
                    query,
                    posts: summarize_posts(self.store.as_ref(), posts).await?,
                    categories: Vec::new(),
                    total_results: total,
                    current_page: page.page,
                    total_pages: page.total_pages(total),
                }
            }
            SearchKind::Categories => {
                let categories = self
                    .store
                    .search_categories(&category_search, CATEGORY_RESULTS_LIMIT)
                    .await?;
                let categories = self.matches(categories).await?;
                SearchResults {
                    query,
                    posts: Vec::new(),
                    total_results: categories.len() as u64,
                    categories,
                    current_page: 1,
                    total_pages: 1,
                }
            }
            SearchKind::All => {
                let posts = self
                    .store
                    .search_posts(&post_search, 0, ALL_POSTS_CAP)
                    .await?;
                let categories = self
                    .store
                    .search_categories(&category_search, ALL_CATEGORIES_CAP)
                    .await?;
                let posts = summarize_posts(self.store.as_ref(), posts).await?;
                let categories = self.matches(categories).await?;
                SearchResults {
                    query,
                    total_results: (posts.len() + categories.len()) as u64,
                    posts,
                    categories,
                    current_page: 1,
                    total_pages: 1,
                }
            }
        };

        tracing::debug!(
            query = %results.query,
            kind = ?kind,
            posts = results.posts.len(),
            categories = results.categories.len(),
            total_results = results.total_results,
            "search completed"
        );
        Ok(results)
    }

    /// Attach parent projections and post counts.
    async fn matches(&self, categories: Vec<Category>) -> ForumResult<Vec<CategoryMatch>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        let parents =
            category_summaries(self.store.as_ref(), categories.iter().filter_map(|c| c.parent_id))
                .await?;
        let ids: Vec<CategoryId> = categories.iter().map(|c| c.id).collect();
        let counts: BTreeMap<CategoryId, u64> = self.store.count_posts_by_category(&ids).await?;

        Ok(categories
            .into_iter()
            .map(|category| CategoryMatch {
                parent: category.parent_id.and_then(|p| parents.get(&p).cloned()),
                post_count: counts.get(&category.id).copied().unwrap_or(0),
                category,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category_tree::CategoryTree;
    use crate::posts::PostStore;
    use crate::store::InMemoryForumStore;
    use crate::types::{NewCategory, PostDraft, UserId};

    #[test]
    fn test_query_validation_messages() {
        assert_eq!(
            normalize_query(None).unwrap_err().to_string(),
            "Search query is required"
        );
        assert_eq!(
            normalize_query(Some("   ")).unwrap_err().to_string(),
            "Search query is required"
        );
        assert_eq!(
            normalize_query(Some(" a ")).unwrap_err().to_string(),
            "Search query must be at least 2 characters"
        );
        assert_eq!(normalize_query(Some("  test  ")).unwrap(), "test");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(SearchKind::parse(None).unwrap(), SearchKind::All);
        assert_eq!(SearchKind::parse(Some("Posts")).unwrap(), SearchKind::Posts);
        assert_eq!(SearchKind::parse(Some("people")).unwrap_err().status_code(), 400);
    }

    async fn seeded() -> SearchIndex<InMemoryForumStore> {
        let store = Arc::new(InMemoryForumStore::new());
        let tree = CategoryTree::new(Arc::clone(&store));
        let lagos = tree
            .create(NewCategory::named("Lagos Rentals", 1).in_city("Lagos"))
            .await
            .unwrap();
        tree.create(NewCategory::named("Rentals in Abuja", 2).in_city("Abuja"))
            .await
            .unwrap();
        tree.create(NewCategory::named("Lekki Rentals", 1).under(lagos.id).in_city("Lagos"))
            .await
            .unwrap();
        tree.create(NewCategory::named("Old Rentals", 3).inactive()).await.unwrap();

        let posts = PostStore::new(Arc::clone(&store));
        let author = UserId::generate();
        for title in ["Rental scams to avoid", "Best rental agents"] {
            posts
                .create(author, PostDraft::new(title, "details", lagos.id))
                .await
                .unwrap();
        }
        posts
            .create(author, PostDraft::new("Buying land", "No RENTAL talk here", lagos.id))
            .await
            .unwrap();
        posts
            .create(author, PostDraft::new("Off topic", "nothing", lagos.id))
            .await
            .unwrap();

        SearchIndex::new(store)
    }

    #[tokio::test]
    async fn test_all_sums_returned_sets() {
        let index = seeded().await;
        let results = index.search(&SearchParams::query("  rental ")).await.unwrap();
        assert_eq!(results.query, "rental");
        assert_eq!(results.posts.len(), 3);
        assert_eq!(results.categories.len(), 3);
        assert_eq!(results.total_results, 6);
        assert_eq!((results.current_page, results.total_pages), (1, 1));

        let lekki = results
            .categories
            .iter()
            .find(|m| m.category.name == "Lekki Rentals")
            .unwrap();
        assert_eq!(lekki.parent.as_ref().unwrap().name, "Lagos Rentals");
    }

    #[tokio::test]
    async fn test_posts_branch_paginates() {
        let index = seeded().await;
        let mut params = SearchParams::query("rental").kind("posts");
        params.limit = Some("2".into());
        params.page = Some("2".into());

        let results = index.search(&params).await.unwrap();
        assert_eq!(results.total_results, 3);
        assert_eq!(results.total_pages, 2);
        assert_eq!(results.current_page, 2);
        assert_eq!(results.posts.len(), 1);
        assert!(results.categories.is_empty());
    }

    #[tokio::test]
    async fn test_categories_branch_filters_city() {
        let index = seeded().await;
        let mut params = SearchParams::query("rentals").kind("categories");
        params.city = Some("lagos".into());

        let results = index.search(&params).await.unwrap();
        let names: Vec<&str> = results
            .categories
            .iter()
            .map(|m| m.category.name.as_str())
            .collect();
        assert_eq!(names, vec!["Lagos Rentals", "Lekki Rentals"]);
        assert_eq!(results.categories[0].post_count, 4);
        assert!(results.posts.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_category_id_is_rejected() {
        let index = seeded().await;
        let mut params = SearchParams::query("rental");
        params.category_id = Some("not-a-uuid".into());
        assert_eq!(index.search(&params).await.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn test_all_caps_ignore_paging() {
        let store = Arc::new(InMemoryForumStore::new());
        let tree = CategoryTree::new(Arc::clone(&store));
        let hub = tree.create(NewCategory::named("Hub", 0)).await.unwrap();
        for i in 0..7 {
            tree.create(NewCategory::named(format!("Villa zone {}", i), i))
                .await
                .unwrap();
        }
        let posts = PostStore::new(Arc::clone(&store));
        let author = UserId::generate();
        for i in 0..12 {
            posts
                .create(author, PostDraft::new(format!("Villa listing {}", i), "body", hub.id))
                .await
                .unwrap();
        }
        let index = SearchIndex::new(store);

        let mut params = SearchParams::query("villa").kind("all");
        params.page = Some("2".into());
        params.limit = Some("3".into());
        let results = index.search(&params).await.unwrap();
        assert_eq!(results.posts.len(), ALL_POSTS_CAP as usize);
        assert_eq!(results.categories.len(), ALL_CATEGORIES_CAP as usize);
        assert_eq!(results.total_results, 15);
        assert_eq!((results.current_page, results.total_pages), (1, 1));
        assert_eq!(results.categories[0].category.name, "Villa zone 0");

        let params = SearchParams::query("villa").kind("posts");
        assert_eq!(index.search(&params).await.unwrap().total_results, 12);
    }

    #[tokio::test]
    async fn test_posts_branch_filters_category_and_city() {
        let store = Arc::new(InMemoryForumStore::new());
        let tree = CategoryTree::new(Arc::clone(&store));
        let lagos = tree
            .create(NewCategory::named("Lagos Homes", 1).in_city("Lagos"))
            .await
            .unwrap();
        let abuja = tree
            .create(NewCategory::named("Abuja Homes", 2).in_city("Abuja"))
            .await
            .unwrap();
        let posts = PostStore::new(Arc::clone(&store));
        let author = UserId::generate();
        posts
            .create(author, PostDraft::new("Duplex near the lagoon", "body", lagos.id))
            .await
            .unwrap();
        for title in ["Duplex in Maitama", "Duplex in Wuse"] {
            posts
                .create(author, PostDraft::new(title, "body", abuja.id))
                .await
                .unwrap();
        }
        let index = SearchIndex::new(store);

        let mut by_category = SearchParams::query("duplex").kind("posts");
        by_category.category_id = Some(abuja.id.to_string());
        let results = index.search(&by_category).await.unwrap();
        assert_eq!(results.total_results, 2);
        assert!(results.posts.iter().all(|p| p.post.category_id == abuja.id));

        let mut by_city = SearchParams::query("duplex").kind("posts");
        by_city.city = Some("LAGOS".into());
        let results = index.search(&by_city).await.unwrap();
        assert_eq!(results.total_results, 1);
        assert_eq!(results.posts[0].post.title, "Duplex near the lagoon");

        by_city.city = Some("Kano".into());
        let results = index.search(&by_city).await.unwrap();
        assert_eq!(results.total_results, 0);
        assert!(results.posts.is_empty());
    }
}
