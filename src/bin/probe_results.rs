//! Probe: results endpoint
//!
//! Hits GET <endpoint>?t=<ms> a few times and documents:
//! - HTTP status and latency per request
//! - Top-level fields of the body
//! - Classified outcome and list sizes per category

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use url::Url;

use kynetic_monitor::api::{build_client, build_url, interpret};
use kynetic_monitor::types::{Category, PollOutcome};
use kynetic_monitor::{API_URL_ENV, DEFAULT_API_URL};

#[derive(Parser)]
#[command(name = "probe_results", about = "Inspect the results endpoint")]
struct Cli {
    /// Endpoint URL (defaults to KYNETIC_API_URL, then the built-in URL)
    #[arg(long)]
    url: Option<String>,

    /// Access key to send
    #[arg(long, default_value = "")]
    key: String,

    /// Send the claim flag on the first request
    #[arg(long)]
    claim: bool,

    /// Number of requests
    #[arg(long, default_value_t = 3)]
    count: u32,

    /// Delay between requests in seconds
    #[arg(long, default_value_t = 2)]
    delay: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let raw_url = cli
        .url
        .or_else(|| std::env::var(API_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let endpoint = Url::parse(&raw_url).with_context(|| format!("invalid URL {raw_url:?}"))?;
    let client = build_client(Duration::from_secs(15), true)?;

    println!("=== Probe: results endpoint ===");
    println!("Endpoint: {endpoint}");
    println!();

    for i in 0..cli.count {
        let claim = cli.claim && i == 0;
        let url = build_url(&endpoint, cli.key.trim(), claim, chrono::Utc::now().timestamp_millis());
        println!("--- Request {} (claim={claim}) ---", i + 1);

        let start = Instant::now();
        let resp = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                println!("Transport error: {e}");
                println!();
                tokio::time::sleep(Duration::from_secs(cli.delay)).await;
                continue;
            }
        };
        let status = resp.status();
        let body = resp.text().await?;
        println!("Status: {status}");
        println!("Latency: {:?}", start.elapsed());
        println!("Body size: {} bytes", body.len());

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(obj)) => {
                println!("Fields present:");
                for key in obj.keys() {
                    println!("  - {key}");
                }
            }
            Ok(other) => println!("Body is JSON but not an object: {other}"),
            Err(_) => {
                let preview: String = body.chars().take(200).collect();
                println!("Body is not JSON: {preview}");
            }
        }

        let outcome = interpret(status, &body);
        println!("Outcome: {}", outcome.label());
        match &outcome {
            PollOutcome::Success(p) => {
                println!("Tier: {:?}  User: {:?}  Timestamp: {}", p.tier, p.user, p.timestamp);
                if let Some(err) = &p.error {
                    println!("Key error: {err}");
                }
                for category in Category::ALL {
                    let items = p.data.items(category);
                    let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
                    println!("  {category}: {} item(s) {names:?}", items.len());
                }
                if let Some(first) = p.data.bull.first().or(p.data.bear.first()) {
                    println!("Sample item:");
                    println!("{}", serde_json::to_string_pretty(first)?);
                }
            }
            PollOutcome::Conflict { detail } => println!("Conflict detail: {detail}"),
            PollOutcome::Error(failure) => println!("Failure: {failure:?}"),
            PollOutcome::Waiting => {}
        }
        println!();

        if i + 1 < cli.count {
            tokio::time::sleep(Duration::from_secs(cli.delay)).await;
        }
    }

    Ok(())
}
