mod browser;
mod config;
mod crawler;
mod database;
mod error;
mod http_client;
mod models;
mod pacing;
mod parser;
mod proxy;
mod site;
mod table;
#[cfg(test)]
mod testing;

use anyhow::Result;
use browser::{SessionFactory, WebDriverFactory};
use clap::Parser;
use config::{Config, DEFAULT_CONFIG_PATH};
use crawler::{CrawlOrchestrator, CrawlReport};
use database::ResultStore;
use models::League;
use pacing::HumanPacing;
use proxy::ProxyPool;
use site::SiteUrls;
use std::path::Path;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "matchcrawler")]
#[command(about = "Samples matches of a football league season and extracts statistics, coaches and odds", long_about = None)]
struct Args {
    /// Country of the league, e.g. "England"
    #[arg(required_unless_present_any = ["list_proxies", "test_url", "show_run"])]
    country: Option<String>,

    /// Division name, e.g. "Premier League"
    #[arg(required_unless_present_any = ["list_proxies", "test_url", "show_run"])]
    division: Option<String>,

    /// Season, e.g. "2022-2023"
    #[arg(required_unless_present_any = ["list_proxies", "test_url", "show_run"])]
    season: Option<String>,

    /// Path to the YAML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Number of matches to sample (overrides the config)
    #[arg(long)]
    sample_size: Option<usize>,

    /// Output file, `.json` for JSON, anything else for CSV
    #[arg(long)]
    output: Option<String>,

    /// Skip writing the run to the SQLite database
    #[arg(long)]
    no_db: bool,

    /// Fetch and print the proxy list, then exit
    #[arg(long)]
    list_proxies: bool,

    /// Render a URL in the browser and print its HTML
    #[arg(long)]
    test_url: Option<String>,

    /// Save HTML to file when using --test-url
    #[arg(long)]
    save_html: Option<String>,

    /// Print a stored run and its failed matches from the database, then exit
    #[arg(long)]
    show_run: Option<Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create config first (before logging is initialized)
    let mut config = if Path::new(&args.config).exists() {
        Config::load(&args.config)?
    } else {
        eprintln!("No config file found, creating default {}", args.config);
        Config::create_default(&args.config)?;
        Config::load(&args.config)?
    };

    init_tracing(&config);

    if args.list_proxies {
        return list_proxies(&config).await;
    }

    if let Some(run) = args.show_run {
        return show_run(&run, &config);
    }

    if let Some(url) = args.test_url {
        return test_url_render(&url, args.save_html.as_deref(), &config).await;
    }

    if let Some(sample_size) = args.sample_size {
        config.sample_size = sample_size;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }

    let league = match (args.country, args.division, args.season) {
        (Some(country), Some(division), Some(season)) => League::new(&country, &division, &season),
        _ => anyhow::bail!("country, division and season are required"),
    };

    crawl(&league, &config, !args.no_db).await
}

/// Use RUST_LOG if set, otherwise the config's tracing level
fn init_tracing(config: &Config) {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        tracing::info!("Logging level set from RUST_LOG environment variable");
    } else {
        let level = config.tracing_level.to_lowercase();
        let max_level = match level.as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                eprintln!("Invalid tracing level '{}', using 'info'", level);
                tracing::Level::INFO
            }
        };

        tracing_subscriber::fmt().with_max_level(max_level).init();

        tracing::info!("Logging level set to: {} (from config)", level);
    }
}

async fn load_proxies(config: &Config) -> ProxyPool {
    if !config.use_proxies {
        tracing::info!("Proxies disabled, connecting directly");
        return ProxyPool::direct();
    }

    let pool = match http_client::create_http_client(&config.user_agent) {
        Ok(client) => match ProxyPool::fetch(&client, &config.proxy_source_url).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!("Failed to fetch proxy list: {:#}", e);
                ProxyPool::direct()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to build HTTP client for the proxy list: {}", e);
            ProxyPool::direct()
        }
    };

    if pool.is_empty() {
        tracing::warn!("No proxies available, sessions will connect directly");
    } else {
        tracing::info!("Loaded {} proxies", pool.len());
    }
    pool
}

async fn crawl(league: &League, config: &Config, use_db: bool) -> Result<()> {
    tracing::info!("Starting crawl of {}", league);

    let proxies = load_proxies(config).await;
    let site = SiteUrls::new(&config.site_base_url);
    let factory = WebDriverFactory::new(&config.webdriver_url, &config.user_agent, config.headless);
    let pacing = HumanPacing::new(
        config.dwell_seconds.clone(),
        config.decoy_probability,
        site.clone(),
    );

    let orchestrator = CrawlOrchestrator::new(
        &factory,
        &proxies,
        &pacing,
        site,
        config.crawl_settings(),
    )?;
    let report = orchestrator.run(league).await?;

    tracing::info!(
        "Harvested {} ids, sampled {}, extracted {} rows, {} failed",
        report.harvested,
        report.sampled,
        report.table.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        tracing::warn!(
            "Match {} stopped at {}: {}",
            failure.id,
            failure.stage,
            failure.error
        );
    }

    print_summary(&report);

    report.table.save(Path::new(&config.output_path))?;

    if use_db {
        if let Some(parent) = Path::new(&config.database_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut store = ResultStore::new(&config.database_path)?;
        let run = store.save_report(league, &report)?;
        if let Some(summary) = store.get_run(&run)? {
            tracing::info!(
                "Run {} for {} saved at {}: {} rows, {} failed",
                summary.uuid,
                summary.league,
                summary.started_at,
                summary.extracted,
                summary.failed
            );
        }
        tracing::info!("Database now holds {} run(s)", store.run_count()?);
    }

    Ok(())
}

fn print_summary(report: &CrawlReport) {
    println!("{}", "=".repeat(80));
    for row in report.table.rows() {
        let cell = |column: &str| {
            report
                .table
                .get(&row.id, column)
                .map(|value| value.to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        println!(
            "{:<10} {} {}-{} {}",
            row.id,
            cell("home_team"),
            cell("home_goals"),
            cell("away_goals"),
            cell("away_team")
        );
    }
    println!("{}", "=".repeat(80));

    let failed = report.failed_ids();
    if failed.is_empty() {
        println!("All {} matches extracted", report.table.len());
    } else {
        let ids: Vec<String> = failed.iter().map(|id| id.to_string()).collect();
        println!("Failed matches ({}): {}", ids.len(), ids.join(", "));
    }
}

/// Print a stored run and its failures
fn show_run(run: &Uuid, config: &Config) -> Result<()> {
    let store = ResultStore::new(&config.database_path)?;
    let Some(summary) = store.get_run(run)? else {
        anyhow::bail!("No run {} in {}", run, config.database_path);
    };

    println!("Run {} for {}", summary.uuid, summary.league);
    println!("Started at: {}", summary.started_at);
    println!(
        "Harvested {}, sampled {}, extracted {}, failed {}",
        summary.harvested, summary.sampled, summary.extracted, summary.failed
    );
    println!("{}", "=".repeat(80));

    for failure in store.failures_for_run(run)? {
        println!(
            "{:<10} {:<11} {:<18} {}",
            failure.match_id, failure.stage, failure.kind, failure.message
        );
    }
    Ok(())
}

/// Fetch the proxy list and print it
async fn list_proxies(config: &Config) -> Result<()> {
    println!("Fetching proxies from: {}", config.proxy_source_url);
    println!("{}", "=".repeat(80));

    let client = http_client::create_http_client(&config.user_agent)?;
    let pool = ProxyPool::fetch(&client, &config.proxy_source_url).await?;

    for proxy in pool.addresses() {
        println!("{}", proxy);
    }

    println!("{}", "=".repeat(80));
    println!("Total: {} proxies", pool.len());
    Ok(())
}

/// Render a URL through WebDriver and print or save the resulting HTML
async fn test_url_render(url: &str, save_path: Option<&str>, config: &Config) -> Result<()> {
    println!("Testing URL render: {}", url);
    println!("WebDriver: {}", config.webdriver_url);
    println!("User-Agent: {}", config.user_agent);
    println!("{}", "=".repeat(80));

    let factory = WebDriverFactory::new(&config.webdriver_url, &config.user_agent, config.headless);
    let session = factory.create(None).await?;

    let rendered = match session.navigate(url).await {
        Ok(()) => session.page_source().await,
        Err(e) => Err(e),
    };
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }
    let body = rendered?;

    if let Some(path) = save_path {
        std::fs::write(path, &body)?;
        println!("HTML saved to: {}", path);
    } else {
        println!("Page source:");
        println!("{}", "=".repeat(80));
        println!("{}", body);
    }
    println!("{}", "=".repeat(80));
    println!("Total length: {} bytes", body.len());

    let lower_body = body.to_lowercase();
    if lower_body.contains("captcha") || lower_body.contains("cloudflare") {
        println!("\nWARNING: Page may contain CAPTCHA or anti-bot protection!");
    }

    Ok(())
}
