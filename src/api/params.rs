use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::analytics::{end_of_day, start_of_day, ExplicitWindow, PathFilter};
use crate::domain::{RangePreset, SortOrder, StatsKind};
use crate::error::{Error, Result};

/// Query string of `GET /api/visits`. Everything stays a string until
/// validated so that bad input produces a JSON 400 instead of an extractor
/// rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub days: Option<String>,
    pub range: Option<String>,
    pub pathname: Option<String>,
    pub path_match: Option<String>,
    pub include_local_ips: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub tz: Option<String>,
    pub mask_ips: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub tz: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_kind(value: Option<&str>) -> Result<StatsKind> {
    let value = value.unwrap_or_default().trim();
    StatsKind::from_str(value).ok_or_else(|| Error::validation(format!("Invalid type: {}", value)))
}

pub fn parse_timezone(value: Option<&str>, default: Tz) -> Result<Tz> {
    match non_empty(value) {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| Error::InvalidTimezone(name.to_string())),
        None => Ok(default),
    }
}

pub fn parse_range(value: Option<&str>) -> Result<Option<RangePreset>> {
    non_empty(value)
        .map(|v| {
            RangePreset::from_str(v).ok_or_else(|| Error::validation(format!("Invalid range: {}", v)))
        })
        .transpose()
}

pub fn parse_sort(value: Option<&str>) -> Result<SortOrder> {
    match non_empty(value) {
        Some(v) => {
            SortOrder::from_str(v).ok_or_else(|| Error::validation(format!("Invalid sort: {}", v)))
        }
        None => Ok(SortOrder::default()),
    }
}

/// Anything but an explicit `false` turns the flag on; absence leaves it off.
pub fn parse_include_flag(value: Option<&str>) -> bool {
    match value {
        Some(v) => v.trim() != "false",
        None => false,
    }
}

/// Only an explicit `true` turns the flag on.
pub fn parse_opt_in_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim() == "true")
}

pub fn parse_limit(value: Option<&str>, default: u32, max: u32) -> Result<usize> {
    let limit = match non_empty(value) {
        Some(v) => v
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::validation("limit must be a positive integer"))?,
        None => default,
    };

    Ok(limit.min(max) as usize)
}

/// Legacy relative window. Missing, zero or negative means "all time".
pub fn parse_days(value: Option<&str>, max: u32) -> Result<Option<u32>> {
    let Some(v) = non_empty(value) else {
        return Ok(None);
    };

    let days = v
        .parse::<i64>()
        .map_err(|_| Error::validation("days must be an integer"))?;

    if days <= 0 {
        return Ok(None);
    }
    if days > i64::from(max) {
        return Err(Error::validation(format!(
            "Date range exceeds {} days",
            max
        )));
    }

    Ok(Some(days as u32))
}

pub fn parse_path_filter(path: Option<&str>, mode: Option<&str>) -> Result<Option<PathFilter>> {
    let contains = match non_empty(mode) {
        None | Some("exact") => false,
        Some("contains") => true,
        Some(other) => return Err(Error::validation(format!("Invalid pathMatch: {}", other))),
    };

    Ok(path.filter(|p| !p.is_empty()).map(|p| {
        if contains {
            PathFilter::Contains(p.to_string())
        } else {
            PathFilter::Exact(p.to_string())
        }
    }))
}

/// Case-insensitive pathname pattern for the visitor log.
pub fn parse_pathname_pattern(value: Option<&str>) -> Result<Option<Regex>> {
    non_empty(value)
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .transpose()
        .map_err(Error::from)
}

/// Parse one end of a date window. Every form names a civil day in `tz`: a
/// bare date directly, a local date-time read in `tz`, RFC 3339 converted into
/// `tz`. The start covers its whole day from the first instant, the end up to
/// the last.
pub fn parse_date(value: &str, tz: Tz, is_end: bool) -> Result<DateTime<Utc>> {
    let date = parse_civil_date(value, tz)?;

    Ok(if is_end {
        end_of_day(tz, date)
    } else {
        start_of_day(tz, date)
    })
}

fn parse_civil_date(value: &str, tz: Tz) -> Result<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&tz).date_naive());
    }

    if let Ok(local) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Ok(local.date());
    }

    Err(Error::validation(format!("Invalid date: {}", value)))
}

/// Parse an optional explicit window. Both ends must be given together and
/// the span is capped at `max_days`. A start after the end is not an error.
pub fn parse_window(
    start: Option<&str>,
    end: Option<&str>,
    tz: Tz,
    max_days: u32,
) -> Result<Option<ExplicitWindow>> {
    let (start, end) = match (non_empty(start), non_empty(end)) {
        (None, None) => return Ok(None),
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err(Error::validation(
                "startDate and endDate must be provided together",
            ))
        }
    };

    let window = ExplicitWindow {
        start: parse_date(start, tz, false)?,
        end: parse_date(end, tz, true)?,
    };

    if (window.end - window.start).num_days() > i64::from(max_days) {
        return Err(Error::validation(format!(
            "Date range exceeds {} days",
            max_days
        )));
    }

    Ok(Some(window))
}
