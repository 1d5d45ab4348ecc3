//! Calc Sprint E2E driver entry point
//!
//! Prints the scenario verdicts as one JSON line on stdout; logs go to stderr.
//! Run with: calc-sprint-e2e --base-url http://127.0.0.1:8082/

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use calc_sprint_e2e::playwright::{Browser, PlaywrightConfig, PlaywrightHandle};
use calc_sprint_e2e::scenario::to_json_line;
use calc_sprint_e2e::server::{ServerConfig, ServerHandle};
use calc_sprint_e2e::{E2eResult, RunnerConfig, ScenarioResult, ScenarioRunner};

#[derive(Parser, Debug)]
#[command(name = "calc-sprint-e2e")]
#[command(about = "Browser E2E checks for the Calc Sprint game")]
#[command(version)]
struct Args {
    /// Base URL the game is served from
    #[arg(long, env = "CALC_SPRINT_BASE_URL", default_value = "http://127.0.0.1:8082/")]
    base_url: String,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, env = "CALC_SPRINT_BROWSER", default_value = "firefox")]
    browser: Browser,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Node.js executable that runs Playwright
    #[arg(long, env = "CALC_SPRINT_NODE", default_value = "node")]
    node: PathBuf,

    /// Seconds to wait for any single browser command
    #[arg(long, default_value = "60")]
    command_timeout_secs: u64,

    /// Shell command that serves the game, started before the run and
    /// stopped after it
    #[arg(long, value_name = "COMMAND")]
    serve: Option<String>,

    /// Exit with status 1 when any scenario fails
    #[arg(long)]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let results = match run(&args).await {
        Ok(results) => results,
        Err(e) => {
            error!("Run aborted: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    match to_json_line(&results) {
        Ok(line) => println!("{}", line),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    if args.strict && results.iter().any(|r| !r.pass) {
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("calc_sprint_e2e=debug,playwright=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: &Args) -> E2eResult<Vec<ScenarioResult>> {
    let playwright_config = PlaywrightConfig {
        browser: args.browser,
        headless: !args.headed,
        command_timeout: Duration::from_secs(args.command_timeout_secs),
        node_binary: args.node.clone(),
        ..Default::default()
    };
    PlaywrightHandle::check_installed(&playwright_config)?;

    let _server = match &args.serve {
        Some(command) => {
            let config = ServerConfig::new(command, &args.base_url);
            Some(ServerHandle::spawn(config).await?)
        }
        None => None,
    };

    let page = PlaywrightHandle::launch(playwright_config).await?;

    let runner_config = RunnerConfig {
        base_url: args.base_url.clone(),
        ..Default::default()
    };
    let outcome = ScenarioRunner::new(&page, runner_config).run().await;

    if let Err(e) = page.close().await {
        warn!("Failed to close browser cleanly: {}", e);
    }
    outcome
}
