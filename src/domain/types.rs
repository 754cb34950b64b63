use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(pub Uuid);

impl VisitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VisitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VisitId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical page category a visit is filed under at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathCategory {
    Home,
    Post,
    Chat,
    #[default]
    Other,
}

impl PathCategory {
    /// Reporting order for pathname statistics.
    pub const ALL: [PathCategory; 4] = [Self::Home, Self::Post, Self::Chat, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Post => "/post",
            Self::Chat => "/chat",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "/" => Self::Home,
            "/post" => Self::Post,
            "/chat" => Self::Chat,
            _ => Self::Other,
        }
    }

    /// Categorize a request path. Query strings and fragments are ignored.
    pub fn categorize(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();

        if path == "/" {
            return Self::Home;
        }

        let under = |prefix: &str| {
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        };

        if under("/post") {
            Self::Post
        } else if under("/chat") {
            Self::Chat
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for PathCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PathCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PathCategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str(&s))
    }
}

/// Bucket width of a statistics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    pub fn key_for(&self, date: NaiveDate) -> BucketKey {
        match self {
            Self::Day => BucketKey::Day(date),
            Self::Month => BucketKey::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }
}

/// Named statistics range. Each preset fixes its granularity, its label
/// style and the implicit window counted back from today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePreset {
    /// Last 7 calendar days, labelled by weekday.
    #[default]
    DayOfWeek,
    /// Last 14 calendar days, labelled by day of month.
    Daily,
    /// Last 12 calendar months, labelled by month.
    Month,
}

impl RangePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DayOfWeek => "dayOfWeek",
            Self::Daily => "daily",
            Self::Month => "month",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dayOfWeek" => Some(Self::DayOfWeek),
            "daily" => Some(Self::Daily),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Self::DayOfWeek | Self::Daily => Granularity::Day,
            Self::Month => Granularity::Month,
        }
    }

    /// Number of buckets in the implicit window.
    pub fn bucket_count(&self) -> u32 {
        match self {
            Self::DayOfWeek => 7,
            Self::Daily => 14,
            Self::Month => 12,
        }
    }

    pub fn label(&self, key: &BucketKey) -> String {
        match (self, key) {
            (Self::DayOfWeek, BucketKey::Day(date)) => date.weekday().to_string(),
            (_, BucketKey::Day(date)) => date.day().to_string(),
            (_, BucketKey::Month { year, month }) => NaiveDate::from_ymd_opt(*year, *month, 1)
                .map(|d| d.format("%b").to_string())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for RangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sortable identity of a bucket in the query timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which view of the visit collection a `/api/visits` request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    Logs,
    PathnameStats,
    ChartStats,
    Stats,
}

impl StatsKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "logs" => Some(Self::Logs),
            "pathname-stats" => Some(Self::PathnameStats),
            "chart-stats" => Some(Self::ChartStats),
            "stats" | "" => Some(Self::Stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "-date" => Some(Self::NewestFirst),
            "date" => Some(Self::OldestFirst),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_id_new() {
        let id1 = VisitId::new();
        let id2 = VisitId::new();
        assert_ne!(id1, id2, "Each new VisitId should be unique");
    }

    #[test]
    fn test_visit_id_parse() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: VisitId = uuid_str.parse().unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn test_visit_id_invalid_parse() {
        let result: Result<VisitId, _> = "not-a-uuid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_categorize_paths() {
        assert_eq!(PathCategory::categorize("/"), PathCategory::Home);
        assert_eq!(PathCategory::categorize("/?ref=x"), PathCategory::Home);
        assert_eq!(PathCategory::categorize("/post"), PathCategory::Post);
        assert_eq!(PathCategory::categorize("/post/42"), PathCategory::Post);
        assert_eq!(PathCategory::categorize("/chat"), PathCategory::Chat);
        assert_eq!(PathCategory::categorize("/chat/room#top"), PathCategory::Chat);
        assert_eq!(PathCategory::categorize("/posts"), PathCategory::Other);
        assert_eq!(PathCategory::categorize("/about"), PathCategory::Other);
        assert_eq!(PathCategory::categorize(""), PathCategory::Other);
    }

    #[test]
    fn test_path_category_roundtrip() {
        for category in PathCategory::ALL {
            assert_eq!(PathCategory::from_str(category.as_str()), category);
        }
        assert_eq!(PathCategory::from_str("whatever"), PathCategory::Other);
    }

    #[test]
    fn test_path_category_serializes_as_path() {
        let json = serde_json::to_string(&PathCategory::Post).unwrap();
        assert_eq!(json, "\"/post\"");
    }

    #[test]
    fn test_range_preset_parse() {
        assert_eq!(RangePreset::from_str("dayOfWeek"), Some(RangePreset::DayOfWeek));
        assert_eq!(RangePreset::from_str("daily"), Some(RangePreset::Daily));
        assert_eq!(RangePreset::from_str("month"), Some(RangePreset::Month));
        assert_eq!(RangePreset::from_str("weekly"), None);
    }

    #[test]
    fn test_range_preset_bucket_counts() {
        assert_eq!(RangePreset::DayOfWeek.bucket_count(), 7);
        assert_eq!(RangePreset::Daily.bucket_count(), 14);
        assert_eq!(RangePreset::Month.bucket_count(), 12);
    }

    #[test]
    fn test_range_preset_labels() {
        // 2024-01-01 was a Monday
        let key = BucketKey::Day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(RangePreset::DayOfWeek.label(&key), "Mon");
        assert_eq!(RangePreset::Daily.label(&key), "1");

        let month = BucketKey::Month {
            year: 2024,
            month: 3,
        };
        assert_eq!(RangePreset::Month.label(&month), "Mar");
    }

    #[test]
    fn test_bucket_key_display() {
        let day = BucketKey::Day(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(day.to_string(), "2024-03-09");

        let month = BucketKey::Month {
            year: 2024,
            month: 3,
        };
        assert_eq!(month.to_string(), "2024-03");
        assert_eq!(serde_json::to_string(&month).unwrap(), "\"2024-03\"");
    }

    #[test]
    fn test_bucket_key_ordering() {
        let a = BucketKey::Month {
            year: 2023,
            month: 12,
        };
        let b = BucketKey::Month {
            year: 2024,
            month: 1,
        };
        assert!(a < b);
    }

    #[test]
    fn test_granularity_key_for() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Granularity::Day.key_for(date), BucketKey::Day(date));
        assert_eq!(
            Granularity::Month.key_for(date),
            BucketKey::Month {
                year: 2024,
                month: 2
            }
        );
    }

    #[test]
    fn test_stats_kind_parse() {
        assert_eq!(StatsKind::from_str("logs"), Some(StatsKind::Logs));
        assert_eq!(
            StatsKind::from_str("pathname-stats"),
            Some(StatsKind::PathnameStats)
        );
        assert_eq!(StatsKind::from_str("chart-stats"), Some(StatsKind::ChartStats));
        assert_eq!(StatsKind::from_str("stats"), Some(StatsKind::Stats));
        assert_eq!(StatsKind::from_str("nope"), None);
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::from_str("-date"), Some(SortOrder::NewestFirst));
        assert_eq!(SortOrder::from_str("date"), Some(SortOrder::OldestFirst));
        assert_eq!(SortOrder::from_str("name"), None);
    }
}
