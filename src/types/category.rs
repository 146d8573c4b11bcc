//! Category types.
//!
//! Categories form a shallow taxonomy stored as flat rows with a nullable
//! parent pointer:
//!
//! ```text
//! Discussions (root)
//!   └── Lagos (region / city-or-state grouping)
//!         └── Apartments (property-type leaf)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::CategoryId;

/// Maximum number of levels in the category tree, root included.
pub const MAX_CATEGORY_DEPTH: usize = 3;

/// A discussion category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Category id.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Unique among siblings sharing the same parent.
    pub slug: String,
    /// Free-text description.
    pub description: Option<String>,
    /// `None` for a root category.
    pub parent_id: Option<CategoryId>,
    /// Discriminators used for icon and label lookup only.
    pub city: Option<String>,
    /// State discriminator.
    pub state: Option<String>,
    /// Property type discriminator.
    pub property_type: Option<String>,
    /// Sort key at every level (ascending).
    pub display_order: i32,
    /// Soft-delete flag; inactive categories are never returned to callers.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    /// Display name; the slug is derived from it.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Parent category, `None` for a root.
    pub parent_id: Option<CategoryId>,
    /// City discriminator.
    pub city: Option<String>,
    /// State discriminator.
    pub state: Option<String>,
    /// Property type discriminator.
    pub property_type: Option<String>,
    /// Sort key among siblings.
    #[serde(default)]
    pub display_order: i32,
    /// Defaults to active.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewCategory {
    /// Active category with the given name and display order.
    pub fn named(name: impl Into<String>, display_order: i32) -> Self {
        Self {
            name: name.into(),
            display_order,
            is_active: true,
            ..Self::default()
        }
    }

    /// Place the category under a parent.
    pub fn under(mut self, parent_id: CategoryId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the city discriminator.
    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Mark the category inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Minimal category projection used in breadcrumbs and on posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    /// Category id.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// City discriminator.
    pub city: Option<String>,
    /// State discriminator.
    pub state: Option<String>,
    /// Property type discriminator.
    pub property_type: Option<String>,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            city: category.city.clone(),
            state: category.state.clone(),
            property_type: category.property_type.clone(),
        }
    }
}

/// A node of the materialized category tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    /// The category row.
    #[serde(flatten)]
    pub category: Category,
    /// Number of posts filed directly under this category.
    pub post_count: u64,
    /// Active children in display order.
    pub children: Vec<CategoryNode>,
}

/// A category returned from search, with its parent and post count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMatch {
    /// The matching category.
    #[serde(flatten)]
    pub category: Category,
    /// Its parent, if any.
    pub parent: Option<CategorySummary>,
    /// Posts filed directly under it.
    pub post_count: u64,
}
