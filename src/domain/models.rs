use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{BucketKey, PathCategory, PostId, VisitId};

/// One recorded page view. Rows are append-only: never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitEvent {
    pub id: VisitId,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "ip")]
    pub source_ip: String,
    #[serde(rename = "pathname")]
    pub path: String,
    pub category: PathCategory,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateVisit {
    pub timestamp: DateTime<Utc>,
    pub source_ip: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// A single bucket of a statistics response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketedStat {
    #[serde(rename = "date")]
    pub key: BucketKey,
    pub label: String,
    pub views: u64,
    pub unique_visitors: u64,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathnameStat {
    pub pathname: PathCategory,
    pub count: u64,
    pub unique_count: u64,
}

/// Row of the visitor log view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitLogEntry {
    #[serde(flatten)]
    pub visit: VisitEvent,
    pub browser: String,
    pub is_local: bool,
}

/// The slice of a blog post that tag popularity is computed from.
#[derive(Debug, Clone)]
pub struct TaggedPost {
    pub id: PostId,
    pub tags: Vec<String>,
    pub published: bool,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreatePost {
    pub title: String,
    pub tags: Vec<String>,
    pub published: bool,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagScore {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpLocation {
    pub ip: String,
    pub country: String,
    pub asn: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time_zone: String,
    pub is_local: bool,
}
