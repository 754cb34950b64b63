use chrono::{DateTime, Utc};

use crate::analytics::LOCAL_SOURCES;
use crate::domain::{
    CreatePost, CreateVisit, PathCategory, PostId, SortOrder, TaggedPost, VisitEvent, VisitId,
};
use crate::error::{Error, Result};

#[cfg(feature = "postgres")]
pub type Pool = sqlx::PgPool;
#[cfg(feature = "postgres")]
pub type PoolOptions = sqlx::postgres::PgPoolOptions;

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub type Pool = sqlx::SqlitePool;
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub type PoolOptions = sqlx::sqlite::SqlitePoolOptions;

const VISIT_COLUMNS: &str = "id, ip, path, category, date, user_agent, referrer";

pub async fn create_pool(url: &str) -> Result<Pool> {
    // Every connection to an in-memory SQLite database sees its own database
    let max_connections = if url.contains(":memory:") { 1 } else { 10 };

    let pool = PoolOptions::new()
        .max_connections(max_connections)
        .test_before_acquire(true)
        .connect(url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    #[cfg(feature = "postgres")]
    {
        let sql = include_str!("../../migrations/postgres/001_initial.sql");
        sqlx::raw_sql(sql).execute(pool).await?;
    }

    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    {
        let sql = include_str!("../../migrations/sqlite/001_initial.sql");
        sqlx::raw_sql(sql).execute(pool).await?;
    }

    Ok(())
}

/// SQLite stores instants as text; fixed microsecond precision keeps
/// lexical and chronological order identical.
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| Error::MalformedTimestamp(raw.to_string()))
}

fn local_sources_sql() -> String {
    LOCAL_SOURCES
        .iter()
        .map(|ip| format!("'{}'", ip))
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_sql(order: SortOrder) -> &'static str {
    match order {
        SortOrder::NewestFirst => "ORDER BY date DESC, id DESC",
        SortOrder::OldestFirst => "ORDER BY date ASC, id ASC",
    }
}

// Visit queries
pub async fn get_visit(pool: &Pool, id: VisitId) -> Result<VisitEvent> {
    #[cfg(feature = "postgres")]
    let row: VisitRow = sqlx::query_as(&format!(
        "SELECT {} FROM visits WHERE id = $1",
        VISIT_COLUMNS
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::Internal("Visit not found".to_string()))?;

    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    let row: VisitRow = sqlx::query_as(&format!(
        "SELECT {} FROM visits WHERE id = ?",
        VISIT_COLUMNS
    ))
    .bind(id.0.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(Error::Internal("Visit not found".to_string()))?;

    row.try_into()
}

pub async fn insert_visit(pool: &Pool, input: CreateVisit) -> Result<VisitEvent> {
    let id = VisitId::new();
    let category = PathCategory::categorize(&input.path);

    #[cfg(feature = "postgres")]
    sqlx::query(
        r#"INSERT INTO visits (id, ip, path, category, date, user_agent, referrer)
           VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
    )
    .bind(id.0)
    .bind(&input.source_ip)
    .bind(&input.path)
    .bind(category.as_str())
    .bind(input.timestamp)
    .bind(&input.user_agent)
    .bind(&input.referrer)
    .execute(pool)
    .await?;

    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    sqlx::query(
        r#"INSERT INTO visits (id, ip, path, category, date, user_agent, referrer)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(id.0.to_string())
    .bind(&input.source_ip)
    .bind(&input.path)
    .bind(category.as_str())
    .bind(ts(input.timestamp))
    .bind(&input.user_agent)
    .bind(&input.referrer)
    .execute(pool)
    .await?;

    get_visit(pool, id).await
}

/// Unordered visits with `start <= date < end`, or every visit when no bounds
/// are given. Fixed local sources are dropped in SQL unless `include_local`.
pub async fn fetch_visit_events(
    pool: &Pool,
    bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
    include_local: bool,
) -> Result<Vec<VisitEvent>> {
    query_visits(pool, bounds, include_local, None, None).await
}

/// Visits for the log view in the requested order, optionally capped.
pub async fn list_visits(
    pool: &Pool,
    bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
    include_local: bool,
    order: SortOrder,
    limit: Option<i64>,
) -> Result<Vec<VisitEvent>> {
    query_visits(pool, bounds, include_local, Some(order), limit).await
}

async fn query_visits(
    pool: &Pool,
    bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
    include_local: bool,
    order: Option<SortOrder>,
    limit: Option<i64>,
) -> Result<Vec<VisitEvent>> {
    let local = local_sources_sql();
    let order = order.map(order_sql).unwrap_or_default();

    #[cfg(feature = "postgres")]
    let rows: Vec<VisitRow> = {
        let mut sql = format!(
            "SELECT {} FROM visits WHERE ($1 OR ip NOT IN ({}))",
            VISIT_COLUMNS, local
        );
        let mut next = 2;
        if bounds.is_some() {
            sql.push_str(" AND date >= $2 AND date < $3");
            next = 4;
        }
        sql.push(' ');
        sql.push_str(order);
        if limit.is_some() {
            sql.push_str(&format!(" LIMIT ${}", next));
        }

        let mut query = sqlx::query_as::<_, VisitRow>(&sql).bind(include_local);
        if let Some((start, end)) = bounds {
            query = query.bind(start).bind(end);
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        query.fetch_all(pool).await?
    };

    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    let rows: Vec<VisitRow> = {
        let mut sql = format!(
            "SELECT {} FROM visits WHERE (? OR ip NOT IN ({}))",
            VISIT_COLUMNS, local
        );
        if bounds.is_some() {
            sql.push_str(" AND date >= ? AND date < ?");
        }
        sql.push(' ');
        sql.push_str(order);
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, VisitRow>(&sql).bind(include_local);
        if let Some((start, end)) = bounds {
            query = query.bind(ts(start)).bind(ts(end));
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        query.fetch_all(pool).await?
    };

    rows.into_iter().map(VisitEvent::try_from).collect()
}

// Post queries
pub async fn create_post(pool: &Pool, input: CreatePost) -> Result<TaggedPost> {
    let id = PostId::new();
    let created_at = input.created_at.unwrap_or_else(Utc::now);
    let tags = serde_json::to_string(&input.tags)?;

    #[cfg(feature = "postgres")]
    sqlx::query(
        r#"INSERT INTO posts (id, title, tags, status, views, likes, comments, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
    )
    .bind(id.0)
    .bind(&input.title)
    .bind(&tags)
    .bind(input.published)
    .bind(input.views)
    .bind(input.likes)
    .bind(input.comments)
    .bind(created_at)
    .execute(pool)
    .await?;

    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    sqlx::query(
        r#"INSERT INTO posts (id, title, tags, status, views, likes, comments, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(id.0.to_string())
    .bind(&input.title)
    .bind(&tags)
    .bind(input.published)
    .bind(input.views)
    .bind(input.likes)
    .bind(input.comments)
    .bind(ts(created_at))
    .execute(pool)
    .await?;

    Ok(TaggedPost {
        id,
        tags: input.tags,
        published: input.published,
        views: input.views,
        likes: input.likes,
        comments: input.comments,
        created_at,
    })
}

/// Published posts with at least one tag, created in `[start, end)`.
pub async fn list_published_posts(
    pool: &Pool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<TaggedPost>> {
    #[cfg(feature = "postgres")]
    let rows: Vec<PostRow> = sqlx::query_as(
        r#"SELECT id, tags, status, views, likes, comments, created_at
           FROM posts
           WHERE status = TRUE AND tags <> '[]' AND created_at >= $1 AND created_at < $2"#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    let rows: Vec<PostRow> = sqlx::query_as(
        r#"SELECT id, tags, status, views, likes, comments, created_at
           FROM posts
           WHERE status = 1 AND tags <> '[]' AND created_at >= ? AND created_at < ?"#,
    )
    .bind(ts(start))
    .bind(ts(end))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TaggedPost::try_from).collect()
}

// Row types for SQLx mapping - PostgreSQL versions
#[cfg(feature = "postgres")]
#[derive(sqlx::FromRow)]
struct VisitRow {
    id: uuid::Uuid,
    ip: String,
    path: String,
    category: String,
    date: DateTime<Utc>,
    user_agent: Option<String>,
    referrer: Option<String>,
}

#[cfg(feature = "postgres")]
impl TryFrom<VisitRow> for VisitEvent {
    type Error = Error;

    fn try_from(row: VisitRow) -> Result<Self> {
        Ok(Self {
            id: VisitId(row.id),
            timestamp: row.date,
            source_ip: row.ip,
            path: row.path,
            category: PathCategory::from_str(&row.category),
            user_agent: row.user_agent,
            referrer: row.referrer,
        })
    }
}

#[cfg(feature = "postgres")]
#[derive(sqlx::FromRow)]
struct PostRow {
    id: uuid::Uuid,
    tags: String,
    status: bool,
    views: i64,
    likes: i64,
    comments: i64,
    created_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
impl TryFrom<PostRow> for TaggedPost {
    type Error = Error;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Self {
            id: PostId(row.id),
            tags: serde_json::from_str(&row.tags)?,
            published: row.status,
            views: row.views,
            likes: row.likes,
            comments: row.comments,
            created_at: row.created_at,
        })
    }
}

// Row types for SQLx mapping - SQLite versions (UUIDs and instants stored as TEXT)
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
#[derive(sqlx::FromRow)]
struct VisitRow {
    id: String,
    ip: String,
    path: String,
    category: String,
    date: String,
    user_agent: Option<String>,
    referrer: Option<String>,
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
impl TryFrom<VisitRow> for VisitEvent {
    type Error = Error;

    fn try_from(row: VisitRow) -> Result<Self> {
        Ok(Self {
            id: VisitId(row.id.parse().unwrap_or_default()),
            timestamp: parse_ts(&row.date)?,
            source_ip: row.ip,
            path: row.path,
            category: PathCategory::from_str(&row.category),
            user_agent: row.user_agent,
            referrer: row.referrer,
        })
    }
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
#[derive(sqlx::FromRow)]
struct PostRow {
    id: String,
    tags: String,
    status: bool,
    views: i64,
    likes: i64,
    comments: i64,
    created_at: String,
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
impl TryFrom<PostRow> for TaggedPost {
    type Error = Error;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Self {
            id: PostId(row.id.parse().unwrap_or_default()),
            tags: serde_json::from_str(&row.tags)?,
            published: row.status,
            views: row.views,
            likes: row.likes,
            comments: row.comments,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}
