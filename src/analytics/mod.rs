//! Visit bucketing and aggregation.
//!
//! Everything in here is pure: callers fetch events, hand them over together
//! with a [`StatsQuery`] and the current instant, and get back gap-filled
//! series.

mod aggregate;
mod filter;
mod tags;
mod window;

pub use aggregate::{aggregate, aggregate_window, daily_totals, pathname_stats, StatsQuery};
pub use filter::{parse_networks, LocalSources, PathFilter, LOCAL_SOURCES};
pub use tags::{popular_tags, TagWeights};
pub use window::{end_of_day, start_of_day, today, BucketWindow, ExplicitWindow};
