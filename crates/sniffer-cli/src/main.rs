//! Sniff - issue HTTP requests and print what the sniffer captured.
//!
//! Starts the process-wide sniffer, sends every URL through the default
//! client concurrently, then prints the captured traffic newest first.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use http::{HeaderName, HeaderValue, Method};
use sniffer_client::{build_request, default_client, CaptureConfig, NetworkSniffer, StoreEvent};
use sniffer_core::TrafficRecord;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long to wait for the last records after all requests returned.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Sniff - send HTTP requests and show the captured traffic
#[derive(Parser, Debug)]
#[command(name = "sniff", version, about)]
struct Args {
    /// URLs to request
    #[arg(required = true)]
    urls: Vec<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request header as "name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Only capture URLs containing this pattern (repeatable)
    #[arg(long, conflicts_with_all = ["ignore", "config"])]
    allow: Vec<String>,

    /// Skip URLs containing this pattern (repeatable)
    #[arg(long, conflicts_with = "config")]
    ignore: Vec<String>,

    /// Load capture configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print records as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Default filter directives: this binary and the sniffer crates at
/// `level`, everything else at warn.
fn log_directives(level: &str) -> String {
    format!("sniff={level},sniffer={level},warn", level = level)
}

/// Initialize logging, optionally with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directives(log_level)));

    if let Some(log_dir) = &args.log_dir {
        if std::fs::create_dir_all(log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("sniff")
                .filename_suffix("log")
                .build(log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
        eprintln!("File logging unavailable in {:?}, using console only", log_dir);
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    None
}

/// Picks the capture configuration from the command line.
fn capture_config(args: &Args) -> anyhow::Result<CaptureConfig> {
    if let Some(path) = &args.config {
        return load_config(path);
    }
    if !args.allow.is_empty() {
        return Ok(CaptureConfig::allow_list(&args.allow));
    }
    if !args.ignore.is_empty() {
        return Ok(CaptureConfig::ignore_list(&args.ignore));
    }
    Ok(CaptureConfig::default())
}

fn load_config(path: &Path) -> anyhow::Result<CaptureConfig> {
    CaptureConfig::from_json_file(path)
        .with_context(|| format!("failed to load capture config from {}", path.display()))
}

/// Parses a curl-style "name: value" header.
fn parse_header(raw: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header {:?} is not \"name: value\"", raw))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("invalid header name in {:?}", raw))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("invalid header value in {:?}", raw))?;
    Ok((name, value))
}

/// Builds one request. Repeated header names are all sent, in order.
fn prepare_request(
    method: &Method,
    url: &str,
    body: &Bytes,
    headers: &[(HeaderName, HeaderValue)],
) -> anyhow::Result<sniffer_client::Request> {
    let mut request = build_request(method.clone(), url, body.clone())
        .with_context(|| format!("invalid URL {:?}", url))?;
    for (name, value) in headers {
        request.headers_mut().append(name.clone(), value.clone());
    }
    Ok(request)
}

fn print_record(record: &TrafficRecord) {
    println!("{} {}", record.id(), record.summary());
    if let Some(error) = record.error() {
        println!("    error: {}", error);
    }
    if let Some(headers) = record.response_headers() {
        for (name, value) in headers {
            println!("    < {}: {}", name, value);
        }
    }
    if let Some(body) = record.response_body() {
        for line in body.lines() {
            println!("    {}", line);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep guard alive for the duration of the program
    let _log_guard = init_logging(&args);
    tracing::debug!("Args: {:?}", args);

    let config = capture_config(&args)?;
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("invalid method {:?}", args.method))?;
    let headers = args
        .headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let body = Bytes::from(args.data.clone().unwrap_or_default());

    let sniffer = NetworkSniffer::start(config);
    let mut events = sniffer.subscribe();
    let client = default_client();

    let mut tasks = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        let request = prepare_request(&method, url, &body, &headers)?;

        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let outcome = match client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    response.into_body().collect().await.map(|bytes| (status, bytes.len()))
                }
                Err(e) => Err(e),
            };
            (url, outcome)
        }));
    }

    for task in tasks {
        let (url, outcome) = task.await.context("request task failed")?;
        match outcome {
            Ok((status, len)) => println!("{} -> {} ({} bytes)", url, status, len),
            Err(e) => println!("{} -> error: {}", url, e),
        }
    }

    // Records land after each caller saw its response; give stragglers a moment.
    let mut inserted = 0;
    while inserted < args.urls.len() {
        match tokio::time::timeout(SETTLE_TIMEOUT, events.next()).await {
            Ok(Some(StoreEvent::Inserted(_))) => inserted += 1,
            Ok(Some(StoreEvent::Cleared)) => {}
            Ok(None) | Err(_) => break,
        }
    }

    let records = sniffer.snapshot();
    if args.json {
        let records: Vec<&TrafficRecord> = records.iter().map(|r| r.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("\nNo traffic captured.");
        return Ok(());
    }

    println!("\nCaptured {} request(s), newest first:", records.len());
    for record in &records {
        print_record(record);
    }

    Ok(())
}
