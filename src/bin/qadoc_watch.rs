//! CLI tool to submit a page for analysis and follow the job to the end.
//!
//! Usage:
//!   cargo run --bin qadoc-watch -- --url https://example.com
//!   cargo run --bin qadoc-watch -- --job <job-id> --output docs.md
//!   cargo run --bin qadoc-watch -- --url https://example.com --priority High

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use qadoc_lib::config::defaults;
use qadoc_lib::models::{CreateJobRequest, JobSnapshot, Priority, TestCaseFilter, TestCaseSummary};
use qadoc_lib::services::test_cases::parse_test_cases;
use qadoc_lib::services::{HttpJobSource, JobPoller, PollOutcome};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

/// What to watch.
enum Target {
    Submit(String),
    Existing(Uuid),
}

struct Options {
    server: String,
    target: Target,
    interval: Duration,
    output: Option<String>,
    filter: TestCaseFilter,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install logger: {}", e);
    }

    let args: Vec<String> = env::args().collect();
    if args
        .iter()
        .any(|a| a == "help" || a == "--help" || a == "-h")
    {
        print_usage();
        return;
    }

    let options = match parse_args(&args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    std::process::exit(run(options).await);
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut server = env::var("QADOC_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
    let mut url = None;
    let mut job = None;
    let mut interval_ms = env::var("QADOC_POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| parse_interval_ms(&v))
        .unwrap_or(defaults::POLL_INTERVAL_MS);
    let mut output = None;
    let mut filter = TestCaseFilter::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args
            .get(i + 1)
            .cloned()
            .ok_or_else(|| format!("{} needs a value", flag))?;
        match flag {
            "--server" | "-s" => server = value,
            "--url" | "-u" => url = Some(value),
            "--job" | "-j" => {
                job = Some(
                    Uuid::parse_str(value.trim())
                        .map_err(|_| format!("'{}' is not a valid job id", value))?,
                )
            }
            "--interval-ms" => {
                interval_ms = parse_interval_ms(&value).ok_or_else(|| format!("'{}' is not a valid interval", value))?
            }
            "--output" | "-o" => output = Some(value),
            "--priority" => {
                filter.priority = Some(
                    Priority::parse(&value)
                        .ok_or_else(|| format!("'{}' is not a priority", value))?,
                )
            }
            "--type" => filter.test_type = Some(value),
            "--feature" => filter.feature = Some(value),
            "--search" => filter.search = Some(value),
            _ => return Err(format!("unknown option {}", flag)),
        }
        i += 2;
    }

    let target = match (url, job) {
        (Some(url), None) => Target::Submit(url),
        (None, Some(job)) => Target::Existing(job),
        (Some(_), Some(_)) => return Err("--url and --job are mutually exclusive".to_string()),
        (None, None) => return Err("one of --url or --job is required".to_string()),
    };

    Ok(Options {
        server,
        target,
        interval: Duration::from_millis(interval_ms),
        output,
        filter,
    })
}

/// Poll interval in milliseconds; zero is not an interval.
fn parse_interval_ms(value: &str) -> Option<u64> {
    value.trim().parse().ok().filter(|ms| *ms > 0)
}

/// Returns the process exit code.
async fn run(options: Options) -> i32 {
    let source = match HttpJobSource::new(&options.server) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error creating client: {}", e);
            return 1;
        }
    };

    let job_id = match options.target {
        Target::Existing(id) => id,
        Target::Submit(url) => {
            let request = CreateJobRequest {
                url,
                auth: None,
                website_context: None,
            };
            match source.submit_job(&request).await {
                Ok(created) => {
                    println!("Job {} submitted", created.job_id);
                    created.job_id
                }
                Err(e) => {
                    eprintln!("Error submitting job: {}", e);
                    return 1;
                }
            }
        }
    };

    let handle = JobPoller::new(job_id, Arc::new(source), options.interval).spawn();
    let mut updates = handle.updates();

    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            if let Some(snapshot) = updates.borrow_and_update().as_ref() {
                print_progress(snapshot);
            }
        }
    });

    let outcome = tokio::select! {
        outcome = handle.outcome() => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            eprintln!("Interrupted; job {} keeps running on the server", job_id);
            printer.abort();
            return 130;
        }
    };
    printer.abort();

    match outcome {
        Ok(PollOutcome::Completed { result, .. }) => {
            let cases = parse_test_cases(&result.markdown);
            let selected = options.filter.apply(&cases);

            println!();
            print_summary(&TestCaseSummary::from_cases(&cases));
            if !options.filter.is_empty() {
                println!("{} test cases match the filter:", selected.len());
            }
            for case in &selected {
                println!("  [{:<6}] {}  {}", case.priority.as_str(), case.id, case.title);
            }

            if let Some(path) = options.output {
                if let Err(e) = tokio::fs::write(&path, &result.markdown).await {
                    eprintln!("Error writing {}: {}", path, e);
                    return 1;
                }
                println!("Markdown written to {}", path);
            }
            0
        }
        Ok(PollOutcome::ResultsUnavailable { error, .. }) => {
            eprintln!("Job completed but its results could not be fetched: {}", error);
            1
        }
        Ok(PollOutcome::Failed { snapshot, error }) => {
            eprintln!(
                "Job failed at {:.0}%: {}",
                snapshot.progress_percent, error
            );
            1
        }
        Ok(PollOutcome::Cancelled { .. }) => 130,
        Err(e) => {
            eprintln!("Poller stopped unexpectedly: {}", e);
            1
        }
    }
}

fn print_progress(snapshot: &JobSnapshot) {
    let counters = &snapshot.counters;
    println!(
        "{:>5.1}%  {:<10}  elements {}/{}  test cases {}/{}",
        snapshot.progress_percent,
        snapshot.phase.as_str(),
        counters.processed_elements,
        counters.total_elements,
        counters.generated_test_cases,
        counters.total_test_cases
    );
}

fn print_summary(summary: &TestCaseSummary) {
    println!(
        "{} test cases (High {}, Medium {}, Low {})",
        summary.total, summary.high, summary.medium, summary.low
    );
    for (test_type, count) in &summary.by_type {
        println!("  {:<20} {}", test_type, count);
    }
}

fn print_usage() {
    eprintln!();
    eprintln!("Usage: qadoc-watch (--url <url> | --job <id>) [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --server, -s <url>     Server root (default {}, or QADOC_SERVER_URL)", DEFAULT_SERVER);
    eprintln!("  --url, -u <url>        Submit this page for analysis");
    eprintln!("  --job, -j <id>         Follow an existing job");
    eprintln!("  --interval-ms <ms>     Poll interval (default {})", defaults::POLL_INTERVAL_MS);
    eprintln!("  --output, -o <file>    Write the Markdown document to a file");
    eprintln!("  --priority <level>     Only list High, Medium or Low test cases");
    eprintln!("  --type <type>          Only list test cases of this type");
    eprintln!("  --feature <feature>    Only list test cases for this feature");
    eprintln!("  --search <text>        Only list test cases whose title or description contains text");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  qadoc-watch --url https://shop.example.com --output shop.md");
    eprintln!("  qadoc-watch --job 0192f1c4-7a8e-7c2d-9f10-3b5e2a6c4d11 --priority High");
    eprintln!();
}
