//! PostgreSQL forum store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Schema
//!
//! [`FORUM_SCHEMA`] creates every table idempotently. The scoped category
//! slug constraint uses `NULLS NOT DISTINCT`, which needs PostgreSQL 15+.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Row};
use uuid::Uuid;

use crate::types::{
    Category, CategoryId, Post, PostId, Reaction, ReactionId, ReactionKey, ReactionTarget,
    ReactionTargetType, ReactionType, Reply, ReplyId, User, UserId,
};
use super::{CategorySearch, ForumStore, PostSearch, ReplyInsert, StoreError};

/// DDL for the forum tables.
pub const FORUM_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS forum_users (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    avatar_url  TEXT
);

CREATE TABLE IF NOT EXISTS forum_categories (
    id             UUID PRIMARY KEY,
    name           TEXT NOT NULL,
    slug           TEXT NOT NULL,
    description    TEXT,
    parent_id      UUID REFERENCES forum_categories(id),
    city           TEXT,
    state          TEXT,
    property_type  TEXT,
    display_order  INTEGER NOT NULL DEFAULT 0,
    is_active      BOOLEAN NOT NULL DEFAULT TRUE,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT forum_categories_parent_slug_key UNIQUE NULLS NOT DISTINCT (parent_id, slug)
);

CREATE TABLE IF NOT EXISTS forum_posts (
    id             UUID PRIMARY KEY,
    title          TEXT NOT NULL,
    content        TEXT NOT NULL,
    slug           TEXT NOT NULL,
    category_id    UUID NOT NULL REFERENCES forum_categories(id),
    author_id      UUID NOT NULL,
    view_count     BIGINT NOT NULL DEFAULT 0,
    reply_count    BIGINT NOT NULL DEFAULT 0,
    is_sticky      BOOLEAN NOT NULL DEFAULT FALSE,
    is_locked      BOOLEAN NOT NULL DEFAULT FALSE,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_reply_at  TIMESTAMPTZ,
    CONSTRAINT forum_posts_slug_key UNIQUE (slug)
);

CREATE INDEX IF NOT EXISTS forum_posts_listing_idx
    ON forum_posts (category_id, is_sticky DESC, last_reply_at DESC NULLS LAST, created_at DESC);

CREATE TABLE IF NOT EXISTS forum_replies (
    id          UUID PRIMARY KEY,
    post_id     UUID NOT NULL REFERENCES forum_posts(id) ON DELETE CASCADE,
    parent_id   UUID REFERENCES forum_replies(id) ON DELETE CASCADE,
    author_id   UUID NOT NULL,
    content     TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS forum_replies_post_idx ON forum_replies (post_id, created_at);

CREATE TABLE IF NOT EXISTS forum_reactions (
    id             UUID PRIMARY KEY,
    target_type    TEXT NOT NULL CHECK (target_type IN ('POST', 'REPLY')),
    target_id      UUID NOT NULL,
    user_id        UUID NOT NULL,
    reaction_type  TEXT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT forum_reactions_target_user_type_key
        UNIQUE (target_type, target_id, user_id, reaction_type)
);
"#;

/// Configuration for PostgreSQL connection pool.
///
/// Timeouts are aggressive to fail fast; the max lifetime forces periodic
/// reconnection.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/property_forum".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// PostgreSQL forum store.
pub struct PostgresForumStore {
    pool: PgPool,
}

impl PostgresForumStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Apply [`FORUM_SCHEMA`].
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        self.pool.execute(FORUM_SCHEMA).await?;
        tracing::info!("Forum schema applied");
        Ok(())
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_user_row(row: &PgRow) -> Result<User, sqlx::Error> {
        Ok(User {
            id: UserId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            avatar_url: row.try_get("avatar_url")?,
        })
    }

    fn parse_category_row(row: &PgRow) -> Result<Category, sqlx::Error> {
        let parent_id: Option<Uuid> = row.try_get("parent_id")?;
        Ok(Category {
            id: CategoryId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            parent_id: parent_id.map(CategoryId::new),
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            property_type: row.try_get("property_type")?,
            display_order: row.try_get("display_order")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_post_row(row: &PgRow) -> Result<Post, sqlx::Error> {
        let view_count: i64 = row.try_get("view_count")?;
        let reply_count: i64 = row.try_get("reply_count")?;
        Ok(Post {
            id: PostId::new(row.try_get("id")?),
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            slug: row.try_get("slug")?,
            category_id: CategoryId::new(row.try_get("category_id")?),
            author_id: UserId::new(row.try_get("author_id")?),
            view_count: non_negative(view_count),
            reply_count: non_negative(reply_count),
            is_sticky: row.try_get("is_sticky")?,
            is_locked: row.try_get("is_locked")?,
            created_at: row.try_get("created_at")?,
            last_reply_at: row.try_get("last_reply_at")?,
        })
    }

    fn parse_reply_row(row: &PgRow) -> Result<Reply, sqlx::Error> {
        let parent_id: Option<Uuid> = row.try_get("parent_id")?;
        Ok(Reply {
            id: ReplyId::new(row.try_get("id")?),
            post_id: PostId::new(row.try_get("post_id")?),
            parent_id: parent_id.map(ReplyId::new),
            author_id: UserId::new(row.try_get("author_id")?),
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_target(row: &PgRow) -> Result<ReactionTarget, sqlx::Error> {
        let target_type: String = row.try_get("target_type")?;
        let target_type = ReactionTargetType::from_str(&target_type)
            .ok_or_else(|| decode_error(format!("unknown reaction target type {}", target_type)))?;
        Ok(ReactionTarget::from_parts(target_type, row.try_get("target_id")?))
    }

    fn parse_reaction_row(row: &PgRow) -> Result<Reaction, sqlx::Error> {
        let reaction_type: String = row.try_get("reaction_type")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok(Reaction {
            id: ReactionId::new(row.try_get("id")?),
            target: Self::parse_target(row)?,
            user_id: UserId::new(row.try_get("user_id")?),
            reaction_type: ReactionType::from_str(&reaction_type)
                .ok_or_else(|| decode_error(format!("unknown reaction type {}", reaction_type)))?,
            created_at,
        })
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `%text%` with LIKE metacharacters escaped.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn target_columns(targets: &[ReactionTarget]) -> (Vec<String>, Vec<Uuid>) {
    targets
        .iter()
        .map(|t| (t.target_type().as_str().to_string(), t.target_uuid()))
        .unzip()
}

fn category_uuids(ids: &[CategoryId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.as_uuid()).collect()
}

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, city, state, \
     property_type, display_order, is_active, created_at";

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.slug, p.category_id, p.author_id, \
     p.view_count, p.reply_count, p.is_sticky, p.is_locked, p.created_at, p.last_reply_at";

const SEARCH_POSTS_FILTER: &str = r#"
    FROM forum_posts p
    JOIN forum_categories c ON c.id = p.category_id
    WHERE (p.title ILIKE $1 OR p.content ILIKE $1)
      AND ($2::uuid IS NULL OR p.category_id = $2)
      AND ($3::text IS NULL OR LOWER(c.city) = LOWER($3))
"#;

#[async_trait]
impl ForumStore for PostgresForumStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query("SELECT id, name, avatar_url FROM forum_users WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(Self::parse_user_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO forum_users (id, name, avatar_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                avatar_url = COALESCE(EXCLUDED.avatar_url, forum_users.avatar_url)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.avatar_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM forum_categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::parse_category_row).transpose()?)
    }

    async fn get_categories(&self, ids: &[CategoryId]) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM forum_categories WHERE id = ANY($1)",
            CATEGORY_COLUMNS
        ))
        .bind(category_uuids(ids))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_category_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_root_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM forum_categories \
             WHERE parent_id IS NULL AND is_active \
             ORDER BY display_order, created_at, id",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_category_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_child_categories(
        &self,
        parent_ids: &[CategoryId],
    ) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM forum_categories \
             WHERE parent_id = ANY($1) AND is_active \
             ORDER BY display_order, created_at, id",
            CATEGORY_COLUMNS
        ))
        .bind(category_uuids(parent_ids))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_category_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn category_slug_exists(
        &self,
        parent_id: Option<CategoryId>,
        slug: &str,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM forum_categories
                WHERE parent_id IS NOT DISTINCT FROM $1 AND slug = $2
            ) AS taken
            "#,
        )
        .bind(parent_id.map(|id| id.as_uuid()))
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("taken")?)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO forum_categories
                (id, name, slug, description, parent_id, city, state, property_type,
                 display_order, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent_id.map(|id| id.as_uuid()))
        .bind(&category.city)
        .bind(&category.state)
        .bind(&category.property_type)
        .bind(category.display_order)
        .bind(category.is_active)
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_posts_by_category(
        &self,
        ids: &[CategoryId],
    ) -> Result<BTreeMap<CategoryId, u64>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT category_id, COUNT(*) AS post_count
            FROM forum_posts
            WHERE category_id = ANY($1)
            GROUP BY category_id
            "#,
        )
        .bind(category_uuids(ids))
        .fetch_all(&self.pool)
        .await?;

        let mut counts = BTreeMap::new();
        for row in &rows {
            let id: Uuid = row.try_get("category_id")?;
            let count: i64 = row.try_get("post_count")?;
            counts.insert(CategoryId::new(id), non_negative(count));
        }
        Ok(counts)
    }

    async fn search_categories(
        &self,
        search: &CategorySearch,
        limit: u32,
    ) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM forum_categories \
             WHERE is_active \
               AND (name ILIKE $1 OR description ILIKE $1) \
               AND ($2::text IS NULL OR LOWER(city) = LOWER($2)) \
             ORDER BY display_order, created_at, id \
             LIMIT $3",
            CATEGORY_COLUMNS
        ))
        .bind(like_pattern(&search.text))
        .bind(&search.city)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_category_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM forum_posts p WHERE p.id = $1", POST_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::parse_post_row).transpose()?)
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM forum_posts p WHERE p.slug = $1", POST_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::parse_post_row).transpose()?)
    }

    async fn post_slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM forum_posts WHERE slug = $1) AS taken")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("taken")?)
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO forum_posts
                (id, title, content, slug, category_id, author_id, view_count, reply_count,
                 is_sticky, is_locked, created_at, last_reply_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(post.id.as_uuid())
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.slug)
        .bind(post.category_id.as_uuid())
        .bind(post.author_id.as_uuid())
        .bind(as_i64(post.view_count))
        .bind(as_i64(post.reply_count))
        .bind(post.is_sticky)
        .bind(post.is_locked)
        .bind(post.created_at)
        .bind(post.last_reply_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_view_count(&self, id: PostId) -> Result<(), StoreError> {
        sqlx::query("UPDATE forum_posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_posts(
        &self,
        category_id: Option<CategoryId>,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM forum_posts p \
             WHERE ($1::uuid IS NULL OR p.category_id = $1) \
             ORDER BY p.is_sticky DESC, p.last_reply_at DESC NULLS LAST, p.created_at DESC, p.id \
             OFFSET $2 LIMIT $3",
            POST_COLUMNS
        ))
        .bind(category_id.map(|id| id.as_uuid()))
        .bind(as_i64(skip))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_post_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_posts(&self, category_id: Option<CategoryId>) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM forum_posts WHERE ($1::uuid IS NULL OR category_id = $1)",
        )
        .bind(category_id.map(|id| id.as_uuid()))
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        Ok(non_negative(total))
    }

    async fn search_posts(
        &self,
        search: &PostSearch,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} {} ORDER BY p.created_at DESC, p.id OFFSET $4 LIMIT $5",
            POST_COLUMNS, SEARCH_POSTS_FILTER
        ))
        .bind(like_pattern(&search.text))
        .bind(search.category_id.map(|id| id.as_uuid()))
        .bind(&search.city)
        .bind(as_i64(skip))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_post_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_search_posts(&self, search: &PostSearch) -> Result<u64, StoreError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS total {}", SEARCH_POSTS_FILTER))
            .bind(like_pattern(&search.text))
            .bind(search.category_id.map(|id| id.as_uuid()))
            .bind(&search.city)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(non_negative(total))
    }

    async fn get_reply(&self, id: ReplyId) -> Result<Option<Reply>, StoreError> {
        let row = sqlx::query(
            "SELECT id, post_id, parent_id, author_id, content, created_at \
             FROM forum_replies WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::parse_reply_row).transpose()?)
    }

    async fn insert_reply(&self, reply: &Reply) -> Result<ReplyInsert, StoreError> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query("SELECT is_locked FROM forum_posts WHERE id = $1 FOR UPDATE")
            .bind(reply.post_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(post) = post else {
            return Ok(ReplyInsert::PostMissing);
        };
        let is_locked: bool = post.try_get("is_locked")?;
        if is_locked {
            return Ok(ReplyInsert::PostLocked);
        }

        sqlx::query(
            r#"
            INSERT INTO forum_replies (id, post_id, parent_id, author_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reply.id.as_uuid())
        .bind(reply.post_id.as_uuid())
        .bind(reply.parent_id.map(|id| id.as_uuid()))
        .bind(reply.author_id.as_uuid())
        .bind(&reply.content)
        .bind(reply.created_at)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            r#"
            UPDATE forum_posts
            SET reply_count = reply_count + 1, last_reply_at = $2
            WHERE id = $1
            RETURNING reply_count
            "#,
        )
        .bind(reply.post_id.as_uuid())
        .bind(reply.created_at)
        .fetch_one(&mut *tx)
        .await?;
        let reply_count: i64 = updated.try_get("reply_count")?;

        tx.commit().await?;
        Ok(ReplyInsert::Inserted {
            reply_count: non_negative(reply_count),
        })
    }

    async fn list_replies(&self, post_id: PostId) -> Result<Vec<Reply>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, post_id, parent_id, author_id, content, created_at \
             FROM forum_replies WHERE post_id = $1 ORDER BY created_at, id",
        )
        .bind(post_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_reply_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_replies_page(
        &self,
        post_id: PostId,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Reply>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, post_id, parent_id, author_id, content, created_at \
             FROM forum_replies WHERE post_id = $1 ORDER BY created_at, id \
             OFFSET $2 LIMIT $3",
        )
        .bind(post_id.as_uuid())
        .bind(as_i64(skip))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_reply_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_reaction(&self, key: &ReactionKey) -> Result<Option<Reaction>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, target_type, target_id, user_id, reaction_type, created_at
            FROM forum_reactions
            WHERE target_type = $1 AND target_id = $2 AND user_id = $3 AND reaction_type = $4
            "#,
        )
        .bind(key.target.target_type().as_str())
        .bind(key.target.target_uuid())
        .bind(key.user_id.as_uuid())
        .bind(key.reaction_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::parse_reaction_row).transpose()?)
    }

    async fn insert_reaction(&self, reaction: &Reaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO forum_reactions
                (id, target_type, target_id, user_id, reaction_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reaction.id.as_uuid())
        .bind(reaction.target.target_type().as_str())
        .bind(reaction.target.target_uuid())
        .bind(reaction.user_id.as_uuid())
        .bind(reaction.reaction_type.as_str())
        .bind(reaction.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_reaction(&self, id: ReactionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM forum_reactions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_reactions(&self, targets: &[ReactionTarget]) -> Result<Vec<Reaction>, StoreError> {
        let (types, ids) = target_columns(targets);
        let rows = sqlx::query(
            r#"
            SELECT id, target_type, target_id, user_id, reaction_type, created_at
            FROM forum_reactions
            WHERE (target_type, target_id) IN (SELECT * FROM UNNEST($1::text[], $2::uuid[]))
            ORDER BY created_at, id
            "#,
        )
        .bind(&types)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(Self::parse_reaction_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_reactions(
        &self,
        targets: &[ReactionTarget],
    ) -> Result<BTreeMap<ReactionTarget, u64>, StoreError> {
        let (types, ids) = target_columns(targets);
        let rows = sqlx::query(
            r#"
            SELECT target_type, target_id, COUNT(*) AS reaction_count
            FROM forum_reactions
            WHERE (target_type, target_id) IN (SELECT * FROM UNNEST($1::text[], $2::uuid[]))
            GROUP BY target_type, target_id
            "#,
        )
        .bind(&types)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = BTreeMap::new();
        for row in &rows {
            let count: i64 = row.try_get("reaction_count")?;
            counts.insert(Self::parse_target(row)?, non_negative(count));
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("lagos"), "%lagos%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_schema_names_the_unique_constraints() {
        for constraint in [
            super::super::POST_SLUG_CONSTRAINT,
            super::super::CATEGORY_SLUG_CONSTRAINT,
            super::super::REACTION_CONSTRAINT,
        ] {
            assert!(FORUM_SCHEMA.contains(constraint), "missing {}", constraint);
        }
    }

    #[test]
    fn test_non_negative_clamps() {
        assert_eq!(non_negative(-3), 0);
        assert_eq!(non_negative(7), 7);
    }
}
