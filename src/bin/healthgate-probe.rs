//! Probe a health endpoint and exit non-zero when it is not healthy.
//!
//! Suitable as a container HEALTHCHECK command.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use reqwest::header::{HeaderValue, ACCEPT};

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Plain,
    Html,
}

impl Format {
    fn accept(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Format::Json => "application/json",
            Format::Plain => "text/plain",
            Format::Html => "text/html",
        })
    }
}

#[derive(Parser)]
#[command(name = "healthgate-probe")]
#[command(about = "Query a healthgate endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8000/healthcheck")]
    url: String,

    #[arg(short, long, value_enum, default_value = "plain")]
    format: Format,

    /// Request timeout in seconds.
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Only set the exit code.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match probe(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("healthgate-probe: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn probe(cli: &Cli) -> Result<bool, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;

    let res = client.get(&cli.url).header(ACCEPT, cli.format.accept()).send().await?;
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-openstack-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let body = res.text().await?;

    if !cli.quiet {
        println!("Status: {}", status);
        println!("Request-Id: {}", request_id);
        println!("{}", body);
    }
    Ok(status.is_success())
}
