use anyhow::Result;
use barrage::http_runner;
use barrage_core::{default_concurrency, LoadTestConfig, SaturationPolicy, StopCondition};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 7621;
const DEFAULT_DURATION: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "barrage", version, about = "Rate-controlled HTTP load generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a load test against a target URL
    Run(RunArgs),
    /// Start the control API server
    Serve {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// The URL to load test
    target: String,

    /// Requests per second (fractional rates are valid)
    #[arg(short, long, default_value_t = 1.0)]
    rate: f64,

    /// How long to run for, e.g. "30s" or "5m" (default 10s)
    #[arg(short, long, value_parser = humantime::parse_duration, conflicts_with = "requests")]
    duration: Option<Duration>,

    /// Total number of requests to issue instead of running for a duration
    #[arg(short = 'n', long)]
    requests: Option<u64>,

    /// In-flight request cap; defaults to the rate rounded up
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Drop ticks that fire while saturated instead of queueing them
    #[arg(long)]
    drop_on_saturation: bool,

    /// Hard deadline for the drain after Ctrl-C, e.g. "5s"
    #[arg(long, value_parser = humantime::parse_duration)]
    drain_deadline: Option<Duration>,

    /// Per-request timeout; a request still outstanding at the deadline
    /// counts as a transport failure
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    timeout: Duration,

    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("barrage=info,barrage_runtime=info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { port } => barrage_runtime::serve(port).await?,
        Command::Run(args) => run(args).await?,
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let stop = match (args.duration, args.requests) {
        (_, Some(count)) => StopCondition::Requests(count),
        (Some(duration), None) => StopCondition::Duration(duration),
        (None, None) => StopCondition::Duration(DEFAULT_DURATION),
    };

    let config = LoadTestConfig {
        target: args.target,
        rate: args.rate,
        stop,
        max_concurrency: args
            .concurrency
            .unwrap_or_else(|| default_concurrency(args.rate)),
        on_saturation: if args.drop_on_saturation {
            SaturationPolicy::Drop
        } else {
            SaturationPolicy::Queue
        },
        drain_deadline: args.drain_deadline,
        request_timeout: Some(args.timeout),
    };

    let runner = http_runner(config)?;
    let cancel = runner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; draining in-flight requests");
            cancel.cancel();
        }
    });

    let result = runner.run().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.summary());
    }
    Ok(())
}
