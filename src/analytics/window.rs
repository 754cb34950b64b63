use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::domain::{BucketKey, Granularity, RangePreset};

/// Caller-supplied window. Both ends are instants; the end is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplicitWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExplicitWindow {
    /// Whole civil days `first..=last` in `tz`, end at the last instant of `last`.
    pub fn from_dates(first: NaiveDate, last: NaiveDate, tz: Tz) -> Self {
        Self {
            start: start_of_day(tz, first),
            end: end_of_day(tz, last),
        }
    }
}

/// A concrete run of civil dates and the bucket width used to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketWindow {
    first: NaiveDate,
    last: NaiveDate,
    granularity: Granularity,
}

impl BucketWindow {
    /// Resolve the window for `range`, either from `explicit` or counted back
    /// from today in `tz`. Returns `None` when the explicit start lies after
    /// its end.
    pub fn resolve(
        range: RangePreset,
        explicit: Option<&ExplicitWindow>,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let granularity = range.granularity();

        let (first, last) = match explicit {
            Some(window) => {
                if window.start > window.end {
                    return None;
                }
                (
                    window.start.with_timezone(&tz).date_naive(),
                    window.end.with_timezone(&tz).date_naive(),
                )
            }
            None => {
                let today = today(tz, now);
                match range {
                    RangePreset::DayOfWeek | RangePreset::Daily => {
                        let back = i64::from(range.bucket_count()) - 1;
                        (today - Duration::days(back), today)
                    }
                    RangePreset::Month => {
                        let back = range.bucket_count() as i32 - 1;
                        let (year, month) = shift_months(today.year(), today.month(), -back);
                        (first_of_month(year, month)?, today)
                    }
                }
            }
        };

        Some(Self::new(first, last, granularity))
    }

    /// The last `days` civil days up to and including today.
    pub fn last_days(days: u32, tz: Tz, now: DateTime<Utc>) -> Self {
        let today = today(tz, now);
        let back = i64::from(days.max(1)) - 1;
        Self::new(today - Duration::days(back), today, Granularity::Day)
    }

    /// Month windows always cover whole months.
    fn new(first: NaiveDate, last: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Day => Self {
                first,
                last,
                granularity,
            },
            Granularity::Month => Self {
                first: first_of_month(first.year(), first.month()).unwrap_or(first),
                last: last_of_month(last.year(), last.month()).unwrap_or(last),
                granularity,
            },
        }
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    /// Number of civil days covered, inclusive.
    pub fn day_count(&self) -> i64 {
        self.last.signed_duration_since(self.first).num_days() + 1
    }

    /// Every bucket of the window in chronological order, regardless of data.
    pub fn buckets(&self) -> Vec<BucketKey> {
        match self.granularity {
            Granularity::Day => {
                let mut keys = Vec::with_capacity(self.day_count().max(0) as usize);
                let mut date = self.first;
                while date <= self.last {
                    keys.push(BucketKey::Day(date));
                    match date.succ_opt() {
                        Some(next) => date = next,
                        None => break,
                    }
                }
                keys
            }
            Granularity::Month => {
                let mut keys = Vec::new();
                let (mut year, mut month) = (self.first.year(), self.first.month());
                let end = (self.last.year(), self.last.month());
                while (year, month) <= end {
                    keys.push(BucketKey::Month { year, month });
                    (year, month) = shift_months(year, month, 1);
                }
                keys
            }
        }
    }

    /// Half-open instant range `[start, end)` covering the window in `tz`.
    pub fn bounds(&self, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = match self.last.succ_opt() {
            Some(next) => start_of_day(tz, next),
            None => end_of_day(tz, self.last),
        };
        (start_of_day(tz, self.first), end)
    }
}

/// Today's civil date in `tz`.
pub fn today(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// First instant of `date` in `tz`.
///
/// Ambiguous midnights resolve to the earliest instant. Where midnight falls
/// in a DST gap, the first valid quarter hour after it is used.
pub fn start_of_day(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::default());

    for quarter in 0..=16 {
        let candidate = midnight + Duration::minutes(15 * quarter);
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
    }

    midnight.and_utc()
}

/// Last instant of `date` in `tz`.
pub fn end_of_day(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    match date.succ_opt() {
        Some(next) => start_of_day(tz, next) - Duration::nanoseconds(1),
        None => start_of_day(tz, date) + Duration::days(1) - Duration::nanoseconds(1),
    }
}

fn shift_months(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn last_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = shift_months(year, month, 1);
    first_of_month(next_year, next_month)?.pred_opt()
}
