use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::{debug, info};

mod params;

pub use params::{TagsQuery, VisitsQuery};

use crate::analytics::{
    aggregate_window, daily_totals, pathname_stats, popular_tags, BucketWindow, ExplicitWindow,
    StatsQuery, TagWeights,
};
use crate::db;
use crate::domain::{CreateVisit, RangePreset, StatsKind, VisitEvent, VisitLogEntry};
use crate::error::{Error, Result};
use crate::privacy;
use crate::state::AppState;
use crate::ua;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }
    }
}

/// Body of `POST /api/visits`. Missing fields fall back to request headers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitBody {
    #[serde(alias = "pathname")]
    pub path: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Half-open fetch bounds for an explicit window, `None` when it is reversed.
fn explicit_bounds(window: &ExplicitWindow) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    (window.start <= window.end).then(|| (window.start, window.end + Duration::nanoseconds(1)))
}

/// GET /api/visits
pub async fn get_visits(
    State(state): State<AppState>,
    Query(query): Query<VisitsQuery>,
) -> Result<Response> {
    let kind = params::parse_kind(query.kind.as_deref())?;
    let tz = params::parse_timezone(query.tz.as_deref(), state.site_tz)?;
    let now = Utc::now();

    debug!("GET /api/visits type={:?} tz={}", kind, tz);

    match kind {
        StatsKind::Stats => visit_stats(&state, &query, tz, now, RangePreset::Daily, true).await,
        StatsKind::ChartStats => {
            visit_stats(&state, &query, tz, now, RangePreset::DayOfWeek, false).await
        }
        StatsKind::PathnameStats => visit_pathname_stats(&state, &query, tz).await,
        StatsKind::Logs => visit_logs(&state, &query, tz).await,
    }
}

async fn visit_stats(
    state: &AppState,
    query: &VisitsQuery,
    tz: chrono_tz::Tz,
    now: DateTime<Utc>,
    default_range: RangePreset,
    legacy_days: bool,
) -> Result<Response> {
    let max_days = state.settings.max_window_days;
    let explicit = params::parse_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        tz,
        max_days,
    )?;
    let range = params::parse_range(query.range.as_deref())?;
    let days = if legacy_days {
        params::parse_days(query.days.as_deref(), max_days)?
    } else {
        None
    };
    let path_filter =
        params::parse_path_filter(query.pathname.as_deref(), query.path_match.as_deref())?;
    let include_local = params::parse_include_flag(query.include_local_ips.as_deref());

    let mut stats_query = StatsQuery::new(range.unwrap_or(default_range), tz)
        .with_local_sources(include_local, (*state.local_sources).clone());
    if let Some(filter) = path_filter {
        stats_query = stats_query.with_path_filter(filter);
    }

    let window = match explicit {
        Some(window) => {
            stats_query = stats_query.with_window(window);
            stats_query.resolve_window(now)
        }
        None if range.is_some() || !legacy_days => stats_query.resolve_window(now),
        None => match days {
            Some(days) => {
                stats_query.range = RangePreset::Daily;
                Some(BucketWindow::last_days(days, tz, now))
            }
            None => {
                let events = db::fetch_visit_events(&state.pool, None, include_local).await?;
                let stats = daily_totals(&events, &stats_query, now);
                return Ok(Json(ApiResponse::success(stats)).into_response());
            }
        },
    };

    let Some(window) = window else {
        return Ok(Json(ApiResponse::success(Vec::<()>::new())).into_response());
    };

    let events =
        db::fetch_visit_events(&state.pool, Some(window.bounds(tz)), include_local).await?;
    let stats = aggregate_window(&events, &stats_query, &window, now);

    Ok(Json(ApiResponse::success(stats)).into_response())
}

async fn visit_pathname_stats(
    state: &AppState,
    query: &VisitsQuery,
    tz: chrono_tz::Tz,
) -> Result<Response> {
    let explicit = params::parse_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        tz,
        state.settings.max_window_days,
    )?;
    let include_local = params::parse_include_flag(query.include_local_ips.as_deref());

    let events = match explicit.as_ref().map(explicit_bounds) {
        Some(None) => Vec::new(),
        Some(bounds) => db::fetch_visit_events(&state.pool, bounds, include_local).await?,
        None => db::fetch_visit_events(&state.pool, None, include_local).await?,
    };

    let stats = pathname_stats(&events, include_local, &state.local_sources);
    Ok(Json(ApiResponse::success(stats)).into_response())
}

async fn visit_logs(state: &AppState, query: &VisitsQuery, tz: chrono_tz::Tz) -> Result<Response> {
    let settings = &state.settings;
    let explicit = params::parse_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        tz,
        settings.max_window_days,
    )?;
    let pattern = params::parse_pathname_pattern(query.pathname.as_deref())?;
    let order = params::parse_sort(query.sort.as_deref())?;
    let limit = params::parse_limit(
        query.limit.as_deref(),
        settings.default_log_limit,
        settings.max_log_limit,
    )?;
    let include_local = params::parse_include_flag(query.include_local_ips.as_deref());
    let mask_ips = params::parse_opt_in_flag(query.mask_ips.as_deref());

    let bounds = match explicit.as_ref().map(explicit_bounds) {
        Some(None) => return Ok(Json(ApiResponse::success(Vec::<()>::new())).into_response()),
        Some(bounds) => bounds,
        None => None,
    };

    // Rows filtered in Rust must be filtered before the limit applies
    let filters_in_rust =
        pattern.is_some() || (!include_local && !state.local_sources.networks().is_empty());
    let sql_limit = (!filters_in_rust).then_some(limit as i64);

    let visits = db::list_visits(&state.pool, bounds, include_local, order, sql_limit).await?;

    let entries: Vec<VisitLogEntry> = visits
        .into_iter()
        .filter(|v| include_local || !state.local_sources.is_local(&v.source_ip))
        .filter(|v| pattern.as_ref().map_or(true, |re| re.is_match(&v.path)))
        .take(limit)
        .map(|visit| log_entry(visit, state, mask_ips))
        .collect();

    Ok(Json(ApiResponse::success(entries)).into_response())
}

fn log_entry(mut visit: VisitEvent, state: &AppState, mask_ips: bool) -> VisitLogEntry {
    let browser = ua::browser_name(visit.user_agent.as_deref().unwrap_or_default());
    let is_local = state.local_sources.is_local(&visit.source_ip);

    if mask_ips {
        visit.source_ip = privacy::mask_ip(&visit.source_ip);
    }

    VisitLogEntry {
        visit,
        browser,
        is_local,
    }
}

/// POST /api/visits
pub async fn create_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateVisitBody>, JsonRejection>,
) -> Result<Response> {
    let Json(body) = payload.map_err(|rejection| Error::validation(rejection.body_text()))?;

    if state.settings.respect_dnt && privacy::is_dnt_enabled(&headers) {
        debug!("Visit not recorded: DNT/GPC header present");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let path = privacy::request_path(&body.path);
    if path.is_empty() {
        return Err(Error::validation("path is required"));
    }

    let input = CreateVisit {
        timestamp: Utc::now(),
        source_ip: body
            .ip
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .or_else(|| privacy::get_client_ip(&headers))
            .unwrap_or_default(),
        path,
        user_agent: body.user_agent.or_else(|| privacy::get_user_agent(&headers)),
        referrer: body.referrer.or_else(|| privacy::get_referrer(&headers)),
    };

    let visit = db::insert_visit(&state.pool, input).await?;
    debug!("Recorded visit {} to {}", visit.id, visit.path);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(visit))).into_response())
}

/// GET /api/popular-tags
pub async fn get_popular_tags(
    State(state): State<AppState>,
    Query(query): Query<TagsQuery>,
) -> Result<Response> {
    if query.start_date.is_none() || query.end_date.is_none() {
        return Err(Error::validation("startDate and endDate are required"));
    }

    let tz = params::parse_timezone(query.tz.as_deref(), state.site_tz)?;
    let window = params::parse_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        tz,
        state.settings.max_window_days,
    )?
    .ok_or_else(|| Error::validation("startDate and endDate are required"))?;

    let Some((start, end)) = explicit_bounds(&window) else {
        return Ok(Json(ApiResponse::success(Vec::<()>::new())).into_response());
    };

    let posts = db::list_published_posts(&state.pool, start, end).await?;
    let tags = popular_tags(&posts, &TagWeights::default());

    Ok(Json(ApiResponse::success(tags)).into_response())
}

/// GET /api/ip/{ip}
pub async fn lookup_ip(State(state): State<AppState>, Path(raw): Path<String>) -> Result<Response> {
    let ip: IpAddr = raw
        .trim()
        .parse()
        .map_err(|_| Error::InvalidIp(raw.clone()))?;
    let is_local = state.local_sources.is_local(&raw);

    let geo = state.geo.clone();
    let location = state
        .cache
        .get_or_insert_location(ip, move || async move {
            info!("Resolving location for {}", ip);
            geo.locate(ip, is_local)
        })
        .await;

    Ok(Json(ApiResponse::success(location)).into_response())
}

/// GET /health
pub async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

/// All API routes, without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/visits", get(get_visits).post(create_visit))
        .route("/api/popular-tags", get(get_popular_tags))
        .route("/api/ip/{ip}", get(lookup_ip))
        .route("/health", get(health))
        .with_state(state)
}
