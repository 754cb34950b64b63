//! Test data seeder and benchmark for blogstats
//!
//! Fills a database with synthetic visits and tagged posts, then optionally
//! times the statistics queries against it.
//!
//! # Usage
//!
//! ```bash
//! # Seed a persistent database (default: seed.db)
//! cargo run --release --bin seed -- seed
//!
//! # Seed with custom settings
//! cargo run --release --bin seed -- seed --db ./my-test.db --visits 50000 --posts 200 --days 400
//!
//! # Run benchmarks on existing database
//! cargo run --release --bin seed -- bench --db ./seed.db
//!
//! # Then start the server with this database:
//! BLOGSTATS__DATABASE_PATH=./seed.db cargo run --release
//! ```

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_distr::Exp;
use std::path::PathBuf;
use std::time::Instant;

use blogstats::analytics::{
    aggregate_window, daily_totals, pathname_stats, popular_tags, BucketWindow, LocalSources,
    StatsQuery, TagWeights,
};
use blogstats::db::{self, Pool};
use blogstats::domain::{CreatePost, CreateVisit, RangePreset};

const PAGES: &[&str] = &[
    "/",
    "/",
    "/",
    "/post",
    "/post/1",
    "/post/2",
    "/post/3",
    "/post/rust-ownership",
    "/post/axum-in-production",
    "/post/sqlite-tips",
    "/chat",
    "/chat/general",
    "/about",
    "/login",
    "/tags/rust",
];

const REFERRERS: &[&str] = &[
    "",
    "",
    "",
    "https://google.com/search?q=rust+blog",
    "https://duckduckgo.com/?q=axum",
    "https://news.ycombinator.com/item?id=12345",
    "https://reddit.com/r/rust",
    "https://twitter.com/someone/status/123",
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.102 Safari/537.36 Edge/18.18363",
    "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko",
];

const TAGS: &[&str] = &[
    "rust", "axum", "sqlite", "postgres", "web", "async", "tokio", "career", "til", "devops",
];

/// Generate a random IP address with some clustering. A share of traffic
/// comes from the local loopback set.
fn random_ip(rng: &mut impl Rng) -> String {
    if rng.random_range(0..20) == 0 {
        return ["127.0.0.1", "::1", "localhost"][rng.random_range(0..3)].to_string();
    }

    let subnets = [
        "45.33", "104.236", "159.89", "167.99", "68.183", "35.192", "34.102", "52.14",
    ];
    let subnet = subnets[rng.random_range(0..subnets.len())];
    format!(
        "{}.{}.{}",
        subnet,
        rng.random_range(0..8),
        rng.random_range(1..255)
    )
}

/// Generate a random datetime within the last N days, weighted toward recent
fn random_recent_datetime(rng: &mut impl Rng, days_back: u32) -> DateTime<Utc> {
    let now = Utc::now();
    let max_ms = (days_back.max(1) as i64) * 24 * 60 * 60 * 1000;
    // Exponential distribution favoring recent dates
    let exp = Exp::new(3.0 / max_ms as f64).expect("rate is positive");
    let offset_ms = (exp.sample(rng) as i64).min(max_ms);
    now - Duration::milliseconds(offset_ms)
}

fn pick<'a>(rng: &mut impl Rng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

async fn seed_database(pool: &Pool, num_visits: u64, num_posts: usize, days_back: u32) {
    let mut rng = rand::rng();

    println!("Creating {} posts...", num_posts);
    let start = Instant::now();

    for i in 0..num_posts {
        let tag_count = rng.random_range(0..4);
        let tags = (0..tag_count)
            .map(|_| pick(&mut rng, TAGS).to_string())
            .collect();

        db::create_post(
            pool,
            CreatePost {
                title: format!("Post {}", i + 1),
                tags,
                published: rng.random_range(0..10) > 1,
                views: rng.random_range(0..5_000),
                likes: rng.random_range(0..200),
                comments: rng.random_range(0..50),
                created_at: Some(random_recent_datetime(&mut rng, days_back)),
            },
        )
        .await
        .expect("Failed to create post");
    }

    println!("  Created {} posts in {:?}", num_posts, start.elapsed());

    println!("Creating {} visits over the last {} days...", num_visits, days_back);
    let start = Instant::now();

    for i in 0..num_visits {
        let referrer = pick(&mut rng, REFERRERS);

        db::insert_visit(
            pool,
            CreateVisit {
                timestamp: random_recent_datetime(&mut rng, days_back),
                source_ip: random_ip(&mut rng),
                path: pick(&mut rng, PAGES).to_string(),
                user_agent: Some(pick(&mut rng, USER_AGENTS).to_string()),
                referrer: (!referrer.is_empty()).then(|| referrer.to_string()),
            },
        )
        .await
        .expect("Failed to insert visit");

        if (i + 1) % 10_000 == 0 {
            println!("  {} visits...", i + 1);
        }
    }

    println!("  Created {} visits in {:?}", num_visits, start.elapsed());
}

struct BenchResult {
    name: String,
    times: Vec<f64>,
}

impl BenchResult {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            times: Vec::new(),
        }
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.times.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted
    }

    fn mean(&self) -> f64 {
        self.times.iter().sum::<f64>() / self.times.len() as f64
    }

    fn median(&self) -> f64 {
        let sorted = self.sorted();
        sorted[sorted.len() / 2]
    }

    fn p95(&self) -> f64 {
        let sorted = self.sorted();
        sorted[((sorted.len() as f64 * 0.95) as usize).min(sorted.len() - 1)]
    }

    fn max(&self) -> f64 {
        self.times.iter().copied().fold(f64::MIN, f64::max)
    }
}

async fn run_benchmarks(pool: &Pool) {
    let iterations = 30;
    let tz = chrono_tz::Asia::Seoul;
    let local = LocalSources::default();

    println!("\n{}", "=".repeat(70));
    println!("Running Benchmarks ({} iterations each)", iterations);
    println!("{}", "=".repeat(70));

    let mut results: Vec<BenchResult> = Vec::new();

    for range in [RangePreset::DayOfWeek, RangePreset::Daily, RangePreset::Month] {
        let mut bench = BenchResult::new(&format!("Chart stats ({})", range));
        for _ in 0..iterations {
            let start = Instant::now();
            let now = Utc::now();
            let query = StatsQuery::new(range, tz);
            let Some(window) = query.resolve_window(now) else {
                continue;
            };
            let events = db::fetch_visit_events(pool, Some(window.bounds(tz)), false)
                .await
                .expect("Failed to fetch visits");
            let _ = aggregate_window(&events, &query, &window, now);
            bench.times.push(start.elapsed().as_secs_f64() * 1000.0);
        }
        results.push(bench);
    }

    let mut bench = BenchResult::new("Daily totals (all time)");
    for _ in 0..iterations {
        let start = Instant::now();
        let events = db::fetch_visit_events(pool, None, false)
            .await
            .expect("Failed to fetch visits");
        let _ = daily_totals(&events, &StatsQuery::new(RangePreset::Daily, tz), Utc::now());
        bench.times.push(start.elapsed().as_secs_f64() * 1000.0);
    }
    results.push(bench);

    let mut bench = BenchResult::new("Pathname stats (30d)");
    for _ in 0..iterations {
        let start = Instant::now();
        let window = BucketWindow::last_days(30, tz, Utc::now());
        let events = db::fetch_visit_events(pool, Some(window.bounds(tz)), false)
            .await
            .expect("Failed to fetch visits");
        let _ = pathname_stats(&events, false, &local);
        bench.times.push(start.elapsed().as_secs_f64() * 1000.0);
    }
    results.push(bench);

    let mut bench = BenchResult::new("Popular tags (365d)");
    for _ in 0..iterations {
        let start = Instant::now();
        let now = Utc::now();
        let posts = db::list_published_posts(pool, now - Duration::days(365), now)
            .await
            .expect("Failed to fetch posts");
        let _ = popular_tags(&posts, &TagWeights::default());
        bench.times.push(start.elapsed().as_secs_f64() * 1000.0);
    }
    results.push(bench);

    println!(
        "\n{:<32} {:>10} {:>10} {:>10} {:>10}",
        "Query", "Mean", "Median", "P95", "Max"
    );
    println!("{}", "-".repeat(76));
    for result in results.iter().filter(|r| !r.times.is_empty()) {
        println!(
            "{:<32} {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms",
            result.name,
            result.mean(),
            result.median(),
            result.p95(),
            result.max()
        );
    }
}

fn print_usage() {
    eprintln!(
        r#"
Usage: seed <command> [options]

Commands:
  seed     Seed the database with test data
  bench    Run benchmarks on existing database

Options for 'seed':
  --db <path>       Database path (default: seed.db)
  --visits <n>      Number of visits (default: 20000)
  --posts <n>       Number of posts (default: 100)
  --days <n>        Days of history to generate (default: 400)
  --bench           Run benchmarks after seeding

Options for 'bench':
  --db <path>       Database path (default: seed.db)

After seeding, start the server with:
  BLOGSTATS__DATABASE_PATH=./seed.db cargo run --release
"#
    );
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = &args[1];
    let mut db_path = PathBuf::from("seed.db");
    let mut num_visits = 20_000u64;
    let mut num_posts = 100usize;
    let mut days_back = 400u32;
    let mut run_bench = false;

    // Parse arguments
    let mut i = 2;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--db" => {
                db_path = PathBuf::from(value.expect("--db needs a value"));
                i += 1;
            }
            "--visits" => {
                num_visits = value.and_then(|v| v.parse().ok()).expect("Invalid visit count");
                i += 1;
            }
            "--posts" => {
                num_posts = value.and_then(|v| v.parse().ok()).expect("Invalid post count");
                i += 1;
            }
            "--days" => {
                days_back = value.and_then(|v| v.parse().ok()).expect("Invalid days count");
                i += 1;
            }
            "--bench" => {
                run_bench = true;
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    match command.as_str() {
        "seed" => {
            println!("{}", "=".repeat(60));
            println!("blogstats - Data Seeder");
            println!("{}", "=".repeat(60));
            println!("Database: {}", db_path.display());
            println!("Visits: {}", num_visits);
            println!("Posts: {}", num_posts);
            println!("Days of history: {}", days_back);
            println!();

            let pool = db::create_pool(&db_url).await.expect("Failed to create pool");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");

            seed_database(&pool, num_visits, num_posts, days_back).await;

            println!("\nStart the server with:");
            println!(
                "  BLOGSTATS__DATABASE_PATH={} cargo run --release",
                db_path.display()
            );

            if run_bench {
                run_benchmarks(&pool).await;
            }
        }
        "bench" => {
            if !db_path.exists() {
                eprintln!("Database not found: {}", db_path.display());
                eprintln!("Run seeding first: cargo run --release --bin seed -- seed");
                std::process::exit(1);
            }

            let pool = db::create_pool(&db_url).await.expect("Failed to create pool");
            run_benchmarks(&pool).await;
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}
