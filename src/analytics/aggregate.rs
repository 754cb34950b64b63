use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::filter::{LocalSources, PathFilter};
use super::window::{today, BucketWindow, ExplicitWindow};
use crate::domain::{
    BucketKey, BucketedStat, Granularity, PathCategory, PathnameStat, RangePreset, VisitEvent,
};

/// Everything the aggregator needs besides the events themselves.
#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub range: RangePreset,
    pub window: Option<ExplicitWindow>,
    pub timezone: Tz,
    pub include_local_sources: bool,
    pub local_sources: LocalSources,
    pub path_filter: Option<PathFilter>,
}

impl StatsQuery {
    pub fn new(range: RangePreset, timezone: Tz) -> Self {
        Self {
            range,
            window: None,
            timezone,
            include_local_sources: false,
            local_sources: LocalSources::default(),
            path_filter: None,
        }
    }

    pub fn with_window(mut self, window: ExplicitWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_local_sources(mut self, include: bool, local_sources: LocalSources) -> Self {
        self.include_local_sources = include;
        self.local_sources = local_sources;
        self
    }

    pub fn with_path_filter(mut self, filter: PathFilter) -> Self {
        self.path_filter = Some(filter);
        self
    }

    /// Whether an event survives the local-source and path pre-filters.
    pub fn keeps(&self, event: &VisitEvent) -> bool {
        if !self.include_local_sources && self.local_sources.is_local(&event.source_ip) {
            return false;
        }

        match &self.path_filter {
            Some(filter) => filter.matches(&event.path),
            None => true,
        }
    }

    pub fn resolve_window(&self, now: DateTime<Utc>) -> Option<BucketWindow> {
        BucketWindow::resolve(self.range, self.window.as_ref(), self.timezone, now)
    }
}

#[derive(Default)]
struct Tally<'a> {
    views: u64,
    visitors: HashSet<&'a str>,
}

impl Tally<'_> {
    fn unique(&self) -> u64 {
        self.visitors.len() as u64
    }
}

/// Bucket `events` into one entry per bucket of the query window, in
/// chronological order, with empty buckets reported as zero.
pub fn aggregate(events: &[VisitEvent], query: &StatsQuery, now: DateTime<Utc>) -> Vec<BucketedStat> {
    let Some(window) = query.resolve_window(now) else {
        return Vec::new();
    };

    aggregate_window(events, query, &window, now)
}

/// Same as [`aggregate`] over an already resolved window.
pub fn aggregate_window(
    events: &[VisitEvent],
    query: &StatsQuery,
    window: &BucketWindow,
    now: DateTime<Utc>,
) -> Vec<BucketedStat> {
    let granularity = window.granularity();
    let mut tallies: HashMap<BucketKey, Tally<'_>> = HashMap::new();
    let mut skipped = 0usize;

    for event in events.iter().filter(|e| query.keeps(e)) {
        let date = event.timestamp.with_timezone(&query.timezone).date_naive();
        if !window.contains(date) {
            skipped += 1;
            continue;
        }

        let tally = tallies.entry(granularity.key_for(date)).or_default();
        tally.views += 1;
        tally.visitors.insert(event.source_ip.as_str());
    }

    let today_key = granularity.key_for(today(query.timezone, now));
    let buckets = window.buckets();

    debug!(
        "Aggregated {} events into {} buckets ({} outside window)",
        events.len(),
        buckets.len(),
        skipped
    );

    buckets
        .into_iter()
        .map(|key| {
            let (views, unique_visitors) = tallies
                .get(&key)
                .map(|t| (t.views, t.unique()))
                .unwrap_or((0, 0));

            BucketedStat {
                label: query.range.label(&key),
                is_today: key == today_key,
                key,
                views,
                unique_visitors,
            }
        })
        .collect()
}

/// Per-day totals over every event, without a window and without gap
/// filling. Only days that have data are reported, oldest first.
pub fn daily_totals(events: &[VisitEvent], query: &StatsQuery, now: DateTime<Utc>) -> Vec<BucketedStat> {
    let mut tallies: BTreeMap<BucketKey, Tally<'_>> = BTreeMap::new();

    for event in events.iter().filter(|e| query.keeps(e)) {
        let date = event.timestamp.with_timezone(&query.timezone).date_naive();
        let tally = tallies.entry(Granularity::Day.key_for(date)).or_default();
        tally.views += 1;
        tally.visitors.insert(event.source_ip.as_str());
    }

    let today_key = Granularity::Day.key_for(today(query.timezone, now));

    tallies
        .into_iter()
        .map(|(key, tally)| BucketedStat {
            label: RangePreset::Daily.label(&key),
            is_today: key == today_key,
            views: tally.views,
            unique_visitors: tally.unique(),
            key,
        })
        .collect()
}

/// Visit counts per path category, always in the fixed category order.
pub fn pathname_stats(
    events: &[VisitEvent],
    include_local_sources: bool,
    local_sources: &LocalSources,
) -> Vec<PathnameStat> {
    let mut tallies: HashMap<PathCategory, Tally<'_>> = HashMap::new();

    for event in events {
        if !include_local_sources && local_sources.is_local(&event.source_ip) {
            continue;
        }
        let tally = tallies.entry(event.category).or_default();
        tally.views += 1;
        tally.visitors.insert(event.source_ip.as_str());
    }

    PathCategory::ALL
        .into_iter()
        .map(|pathname| {
            let (count, unique_count) = tallies
                .get(&pathname)
                .map(|t| (t.views, t.unique()))
                .unwrap_or((0, 0));
            PathnameStat {
                pathname,
                count,
                unique_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VisitId;
    use chrono::{NaiveDate, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn visit(at: DateTime<Utc>, ip: &str, path: &str) -> VisitEvent {
        VisitEvent {
            id: VisitId::new(),
            timestamp: at,
            source_ip: ip.to_string(),
            path: path.to_string(),
            category: PathCategory::categorize(path),
            user_agent: None,
            referrer: None,
        }
    }

    fn seoul_events() -> Vec<VisitEvent> {
        vec![
            visit(utc(2024, 1, 1, 23, 30), "203.0.113.1", "/"),
            visit(utc(2024, 1, 2, 0, 10), "203.0.113.1", "/post/1"),
            visit(utc(2024, 1, 2, 5, 0), "203.0.113.2", "/chat"),
        ]
    }

    #[test]
    fn test_seoul_boundary_scenario() {
        let tz = chrono_tz::Asia::Seoul;
        let now = utc(2024, 1, 2, 6, 0);
        let query = StatsQuery::new(RangePreset::Daily, tz);

        let stats = aggregate(&seoul_events(), &query, now);
        assert_eq!(stats.len(), 14);

        let jan2 = stats.last().unwrap();
        assert_eq!(jan2.key, BucketKey::Day(date(2024, 1, 2)));
        assert_eq!(jan2.views, 3);
        assert_eq!(jan2.unique_visitors, 2);
        assert!(jan2.is_today);
        assert_eq!(jan2.label, "2");

        let jan1 = &stats[stats.len() - 2];
        assert_eq!(jan1.key, BucketKey::Day(date(2024, 1, 1)));
        assert_eq!(jan1.views, 0);
        assert_eq!(jan1.unique_visitors, 0);
        assert!(!jan1.is_today);
    }

    #[test]
    fn test_same_events_in_utc_split_across_days() {
        let query = StatsQuery::new(RangePreset::Daily, chrono_tz::UTC);
        let stats = aggregate(&seoul_events(), &query, utc(2024, 1, 2, 6, 0));

        let jan1 = &stats[stats.len() - 2];
        let jan2 = &stats[stats.len() - 1];
        assert_eq!(jan1.views, 1);
        assert_eq!(jan2.views, 2);
        assert_eq!(jan2.unique_visitors, 2);
    }

    #[test]
    fn test_explicit_empty_day_is_zero_filled() {
        let tz = chrono_tz::UTC;
        let window = ExplicitWindow::from_dates(date(2024, 3, 1), date(2024, 3, 1), tz);
        let query = StatsQuery::new(RangePreset::Daily, tz).with_window(window);

        let stats = aggregate(&[], &query, utc(2024, 6, 1, 0, 0));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].key, BucketKey::Day(date(2024, 3, 1)));
        assert_eq!(stats[0].views, 0);
        assert_eq!(stats[0].unique_visitors, 0);
        assert!(!stats[0].is_today);
    }

    #[test]
    fn test_local_only_traffic_is_all_zero() {
        let now = utc(2024, 1, 10, 12, 0);
        let events = vec![
            visit(utc(2024, 1, 9, 10, 0), "127.0.0.1", "/"),
            visit(utc(2024, 1, 10, 10, 0), "127.0.0.1", "/post/3"),
        ];
        let query = StatsQuery::new(RangePreset::DayOfWeek, chrono_tz::UTC);

        let stats = aggregate(&events, &query, now);
        assert_eq!(stats.len(), 7);
        assert!(stats.iter().all(|s| s.views == 0 && s.unique_visitors == 0));

        let included = StatsQuery::new(RangePreset::DayOfWeek, chrono_tz::UTC)
            .with_local_sources(true, LocalSources::default());
        let stats = aggregate(&events, &included, now);
        assert_eq!(stats.iter().map(|s| s.views).sum::<u64>(), 2);
    }

    #[test]
    fn test_preset_bucket_counts() {
        let now = utc(2024, 5, 20, 12, 0);
        for (range, expected) in [
            (RangePreset::DayOfWeek, 7),
            (RangePreset::Daily, 14),
            (RangePreset::Month, 12),
        ] {
            let stats = aggregate(&[], &StatsQuery::new(range, chrono_tz::UTC), now);
            assert_eq!(stats.len(), expected, "{range}");
            assert_eq!(stats.iter().filter(|s| s.is_today).count(), 1);
            assert!(stats.last().unwrap().is_today);
        }
    }

    #[test]
    fn test_day_of_week_labels() {
        // 2024-01-07 was a Sunday
        let stats = aggregate(
            &[],
            &StatsQuery::new(RangePreset::DayOfWeek, chrono_tz::UTC),
            utc(2024, 1, 7, 12, 0),
        );
        let labels: Vec<_> = stats.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
    }

    #[test]
    fn test_month_buckets_group_by_civil_month() {
        let tz = chrono_tz::Asia::Seoul;
        let events = vec![
            // 2024-03-01 08:00 KST
            visit(utc(2024, 2, 29, 23, 0), "203.0.113.1", "/"),
            visit(utc(2024, 3, 15, 3, 0), "203.0.113.1", "/"),
            visit(utc(2024, 2, 10, 3, 0), "203.0.113.9", "/"),
        ];
        let stats = aggregate(
            &events,
            &StatsQuery::new(RangePreset::Month, tz),
            utc(2024, 3, 20, 0, 0),
        );

        let march = stats.last().unwrap();
        assert_eq!(
            march.key,
            BucketKey::Month {
                year: 2024,
                month: 3
            }
        );
        assert_eq!(march.label, "Mar");
        assert_eq!(march.views, 2);
        assert_eq!(march.unique_visitors, 1);

        let february = &stats[stats.len() - 2];
        assert_eq!(february.views, 1);
    }

    #[test]
    fn test_events_outside_window_are_ignored() {
        let events = vec![
            visit(utc(2023, 12, 1, 0, 0), "203.0.113.1", "/"),
            visit(utc(2024, 1, 10, 0, 0), "203.0.113.1", "/"),
        ];
        let stats = aggregate(
            &events,
            &StatsQuery::new(RangePreset::DayOfWeek, chrono_tz::UTC),
            utc(2024, 1, 10, 12, 0),
        );
        assert_eq!(stats.iter().map(|s| s.views).sum::<u64>(), 1);
    }

    #[test]
    fn test_reversed_window_yields_empty() {
        let window = ExplicitWindow {
            start: utc(2024, 3, 5, 0, 0),
            end: utc(2024, 3, 1, 0, 0),
        };
        let query = StatsQuery::new(RangePreset::Daily, chrono_tz::UTC).with_window(window);
        assert!(aggregate(&seoul_events(), &query, utc(2024, 6, 1, 0, 0)).is_empty());
    }

    #[test]
    fn test_unique_never_exceeds_views() {
        let mut events = Vec::new();
        for i in 0..50u32 {
            let ip = format!("198.51.100.{}", i % 7);
            events.push(visit(utc(2024, 1, 1 + i % 10, i % 24, 0), &ip, "/"));
        }
        events.push(visit(utc(2024, 1, 5, 1, 0), "", "/"));
        events.push(visit(utc(2024, 1, 5, 2, 0), "", "/"));

        let stats = aggregate(
            &events,
            &StatsQuery::new(RangePreset::Daily, chrono_tz::UTC),
            utc(2024, 1, 12, 0, 0),
        );
        assert!(stats.iter().all(|s| s.unique_visitors <= s.views));
    }

    #[test]
    fn test_local_exclusion_is_idempotent() {
        let mut events = seoul_events();
        events.push(visit(utc(2024, 1, 2, 1, 0), "::1", "/"));
        let query = StatsQuery::new(RangePreset::Daily, chrono_tz::Asia::Seoul);
        let now = utc(2024, 1, 2, 6, 0);

        let once: Vec<VisitEvent> = events.iter().filter(|e| query.keeps(e)).cloned().collect();
        assert_eq!(aggregate(&events, &query, now), aggregate(&once, &query, now));
    }

    #[test]
    fn test_path_filter_exact_and_contains() {
        let now = utc(2024, 1, 2, 6, 0);
        let tz = chrono_tz::Asia::Seoul;

        let exact = StatsQuery::new(RangePreset::Daily, tz)
            .with_path_filter(PathFilter::Exact("/post/1".to_string()));
        assert_eq!(aggregate(&seoul_events(), &exact, now).last().unwrap().views, 1);

        let contains = StatsQuery::new(RangePreset::Daily, tz)
            .with_path_filter(PathFilter::Contains("/".to_string()));
        assert_eq!(aggregate(&seoul_events(), &contains, now).last().unwrap().views, 3);
    }

    #[test]
    fn test_daily_totals_only_data_days() {
        let events = vec![
            visit(utc(2024, 1, 5, 10, 0), "203.0.113.1", "/"),
            visit(utc(2023, 12, 31, 10, 0), "203.0.113.1", "/"),
            visit(utc(2024, 1, 5, 11, 0), "203.0.113.2", "/"),
            visit(utc(2024, 1, 6, 11, 0), "127.0.0.1", "/"),
        ];
        let query = StatsQuery::new(RangePreset::Daily, chrono_tz::UTC);
        let stats = daily_totals(&events, &query, utc(2024, 1, 5, 12, 0));

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].key, BucketKey::Day(date(2023, 12, 31)));
        assert_eq!(stats[1].views, 2);
        assert_eq!(stats[1].unique_visitors, 2);
        assert!(stats[1].is_today);
    }

    #[test]
    fn test_pathname_stats_fixed_order() {
        let events = vec![
            visit(utc(2024, 1, 1, 0, 0), "203.0.113.1", "/post/1"),
            visit(utc(2024, 1, 1, 0, 0), "203.0.113.1", "/post/2"),
            visit(utc(2024, 1, 1, 0, 0), "203.0.113.2", "/about"),
            visit(utc(2024, 1, 1, 0, 0), "127.0.0.1", "/"),
        ];

        let stats = pathname_stats(&events, false, &LocalSources::default());
        let order: Vec<_> = stats.iter().map(|s| s.pathname).collect();
        assert_eq!(order, PathCategory::ALL);
        assert_eq!(stats[0].count, 0);
        assert_eq!(stats[1].count, 2);
        assert_eq!(stats[1].unique_count, 1);
        assert_eq!(stats[2].count, 0);
        assert_eq!(stats[3].count, 1);

        let with_local = pathname_stats(&events, true, &LocalSources::default());
        assert_eq!(with_local[0].count, 1);
    }
}
