//! Category taxonomy storage and traversal.
//!
//! Categories are flat rows with a nullable parent pointer. Reads
//! materialize at most [`MAX_CATEGORY_DEPTH`] levels with one store query
//! per level; the depth cap is upheld when categories are created.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{ForumError, ForumResult};
use crate::projection::non_blank;
use crate::slug::{SlugGenerator, SLUG_INSERT_RETRIES};
use crate::store::{ForumStore, CATEGORY_SLUG_CONSTRAINT};
use crate::types::{
    Category, CategoryId, CategoryNode, CategorySummary, NewCategory, MAX_CATEGORY_DEPTH,
};

/// Hierarchical category taxonomy.
pub struct CategoryTree<S: ForumStore> {
    store: Arc<S>,
    slugs: SlugGenerator,
}

impl<S: ForumStore + 'static> CategoryTree<S> {
    /// Create a tree view over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            slugs: SlugGenerator::default(),
        }
    }

    /// Replace the slug generator.
    pub fn with_slug_generator(mut self, slugs: SlugGenerator) -> Self {
        self.slugs = slugs;
        self
    }

    /// Active roots with up to two nested levels of active children.
    ///
    /// Every node carries its direct post count; siblings are ordered by
    /// `display_order` ascending.
    pub async fn list_tree(&self) -> ForumResult<Vec<CategoryNode>> {
        let roots = self.store.list_root_categories().await?;
        let children = self.children_of(&roots).await?;
        let grandchildren = self.children_of(&children).await?;

        let all_ids: Vec<CategoryId> = roots
            .iter()
            .chain(&children)
            .chain(&grandchildren)
            .map(|c| c.id)
            .collect();
        let counts = if all_ids.is_empty() {
            BTreeMap::new()
        } else {
            self.store.count_posts_by_category(&all_ids).await?
        };

        let node = |category: Category, children: Vec<CategoryNode>| CategoryNode {
            post_count: counts.get(&category.id).copied().unwrap_or(0),
            category,
            children,
        };

        let tree = roots
            .into_iter()
            .map(|root| {
                let level2 = children
                    .iter()
                    .filter(|c| c.parent_id == Some(root.id))
                    .map(|child| {
                        let level3 = grandchildren
                            .iter()
                            .filter(|g| g.parent_id == Some(child.id))
                            .map(|g| node(g.clone(), Vec::new()))
                            .collect();
                        node(child.clone(), level3)
                    })
                    .collect();
                node(root, level2)
            })
            .collect::<Vec<_>>();

        tracing::debug!(roots = tree.len(), "category tree listed");
        Ok(tree)
    }

    async fn children_of(&self, parents: &[Category]) -> ForumResult<Vec<Category>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<CategoryId> = parents.iter().map(|c| c.id).collect();
        Ok(self.store.list_child_categories(&ids).await?)
    }

    /// An active category by id.
    pub async fn get(&self, id: CategoryId) -> ForumResult<Category> {
        match self.store.get_category(id).await? {
            Some(category) if category.is_active => Ok(category),
            _ => Err(ForumError::not_found("category", id)),
        }
    }

    /// Root-to-leaf path ending at the active category `id`.
    pub async fn resolve_breadcrumb(&self, id: CategoryId) -> ForumResult<Vec<CategorySummary>> {
        let category = self.get(id).await?;
        self.breadcrumb_of(&category).await
    }

    /// Root-to-leaf path ending at `category`.
    ///
    /// Walks at most two parent hops. A missing or inactive ancestor ends
    /// the path there.
    pub async fn breadcrumb_of(&self, category: &Category) -> ForumResult<Vec<CategorySummary>> {
        let mut path = vec![CategorySummary::from(category)];
        let mut next = category.parent_id;

        for _ in 1..MAX_CATEGORY_DEPTH {
            let Some(parent_id) = next else { break };
            match self.store.get_category(parent_id).await? {
                Some(parent) if parent.is_active => {
                    next = parent.parent_id;
                    path.push(CategorySummary::from(&parent));
                }
                _ => {
                    tracing::warn!(
                        category_id = %category.id,
                        ancestor_id = %parent_id,
                        "breadcrumb ancestor missing or inactive"
                    );
                    next = None;
                    break;
                }
            }
        }

        if let Some(beyond) = next {
            tracing::warn!(
                category_id = %category.id,
                ancestor_id = %beyond,
                "category chain deeper than allowed; breadcrumb truncated"
            );
        }

        path.reverse();
        Ok(path)
    }

    /// Number of levels from the root down to `category`, inclusive.
    async fn depth_of(&self, category: &Category) -> ForumResult<usize> {
        let mut depth = 1;
        let mut next = category.parent_id;
        while let Some(parent_id) = next {
            depth += 1;
            if depth > MAX_CATEGORY_DEPTH {
                break;
            }
            next = self
                .store
                .get_category(parent_id)
                .await?
                .and_then(|parent| parent.parent_id);
        }
        Ok(depth)
    }

    /// Create a category.
    ///
    /// The parent, if given, must exist and be active, and the new node may
    /// not sit deeper than [`MAX_CATEGORY_DEPTH`]. The slug is unique among
    /// the parent's children.
    pub async fn create(&self, new: NewCategory) -> ForumResult<Category> {
        let name = non_blank(Some(new.name.as_str()))
            .ok_or_else(|| ForumError::validation("Missing required fields: name"))?
            .to_string();

        if let Some(parent_id) = new.parent_id {
            let parent = self.get(parent_id).await?;
            if self.depth_of(&parent).await? >= MAX_CATEGORY_DEPTH {
                return Err(ForumError::validation(format!(
                    "Categories cannot be nested more than {} levels deep",
                    MAX_CATEGORY_DEPTH
                )));
            }
        }

        let optional = |value: &Option<String>| non_blank(value.as_deref()).map(str::to_string);

        for attempt in 1..=SLUG_INSERT_RETRIES {
            let store = Arc::clone(&self.store);
            let parent_id = new.parent_id;
            let slug = self
                .slugs
                .generate(&name, move |candidate| {
                    let store = Arc::clone(&store);
                    async move { store.category_slug_exists(parent_id, &candidate).await }
                })
                .await?;

            let category = Category {
                id: CategoryId::generate(),
                name: name.clone(),
                slug,
                description: optional(&new.description),
                parent_id: new.parent_id,
                city: optional(&new.city),
                state: optional(&new.state),
                property_type: optional(&new.property_type),
                display_order: new.display_order,
                is_active: new.is_active,
                created_at: Utc::now(),
            };

            match self.store.insert_category(&category).await {
                Ok(()) => {
                    tracing::info!(
                        category_id = %category.id,
                        slug = %category.slug,
                        parent_id = ?category.parent_id,
                        "category created"
                    );
                    return Ok(category);
                }
                Err(err) if err.violates(CATEGORY_SLUG_CONSTRAINT) => {
                    tracing::warn!(slug = %category.slug, attempt, "category slug taken concurrently; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ForumError::Conflict(format!(
            "Could not reserve a slug for category \"{}\"",
            name
        )))
    }
}
