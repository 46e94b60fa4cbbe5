use clap::{Parser, Subcommand};
use colored::*;
use std::process::ExitCode;

use torq::cancel::RunCancellation;
use torq::coordinator::{RunRequest, TestRunCoordinator};
use torq::models::{TestCase, TestRunResult, TestStatus};
use torq::settings::Settings;
use torq::{logger, server};

#[derive(Parser, Debug)]
#[command(name = "torq")]
#[command(
    about = "API test orchestrator: generate test cases from an OpenAPI spec and execute them against a live service.",
    long_about = "API test orchestrator. Generates executable test cases for a REST service \
through an LLM pipeline and executes suites against a live base URL with dependency-aware \
scheduling, variable chaining, assertions, and retries."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP ingress (upload / generate-tests / execute-tests)
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Execute a JSON test suite file against a base URL
    Run {
        /// Path to a JSON file containing an array of test cases
        suite: String,

        /// Base URL of the service under test
        #[arg(short, long)]
        base_url: String,

        /// Print each response body in the summary
        #[arg(short, long)]
        show_responses: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    logger::init_logger();

    let cli = Cli::parse();
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {e}", "Configuration error:".red());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve { port } => {
            let mut settings = settings;
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Err(e) = server::start_server(settings).await {
                eprintln!("{} {e}", "Server error:".red());
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Command::Run {
            suite,
            base_url,
            show_responses,
        } => run_suite(&suite, &base_url, show_responses, settings).await,
    }
}

async fn run_suite(
    suite_path: &str,
    base_url: &str,
    show_responses: bool,
    settings: Settings,
) -> ExitCode {
    let content = match tokio::fs::read_to_string(suite_path).await {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{} cannot read '{suite_path}': {e}", "Error:".red());
            return ExitCode::FAILURE;
        }
    };

    let test_cases: Vec<TestCase> = match serde_json::from_str(&content) {
        Ok(cases) => cases,
        Err(e) => {
            eprintln!("{} '{suite_path}' is not a test suite: {e}", "Error:".red());
            return ExitCode::FAILURE;
        }
    };

    let coordinator = TestRunCoordinator::new(settings.execution.clone());
    let run = coordinator
        .execute(
            RunRequest {
                test_cases,
                base_url: base_url.to_string(),
                ..RunRequest::default()
            },
            RunCancellation::new(),
        )
        .await;

    print_run_results(&run, show_responses);

    if run.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print execution results in a formatted way
fn print_run_results(run: &TestRunResult, show_responses: bool) {
    println!("\n{}", "=== Test Run Results ===".bold().blue());
    println!("Run: {} against {}\n", run.run_id.cyan(), run.base_url);

    for result in &run.test_case_results {
        let status_icon = match result.status {
            TestStatus::Passed => "✓".green(),
            TestStatus::Failed | TestStatus::Error => "✗".red(),
            TestStatus::Skipped => "-".yellow(),
            TestStatus::Blocked => "⊘".yellow(),
            _ => "?".normal(),
        };

        println!(
            "{} {} [{:?}]",
            status_icon,
            result.test_case_name.bold(),
            result.status
        );

        if let Some(response) = &result.response {
            println!(
                "  Status: {} ({}ms, {} retries)",
                response.status_code.to_string().cyan(),
                result.duration_ms.to_string().yellow(),
                result.retry_attempts
            );
            if show_responses && !response.body.is_empty() {
                println!("  Body: {}", response.body);
            }
        }

        if let Some(error) = &result.error_message {
            println!("  {}", error.red());
        }

        for assertion in result.assertion_results.iter().filter(|a| !a.passed) {
            if let Some(message) = &assertion.message {
                println!("  Failed assertion: {}", message.red());
            }
        }
        println!();
    }

    let summary = if run.all_passed() {
        format!("All {} tests passed", run.tests_passed()).green()
    } else {
        format!(
            "{} passed, {} failed, {} skipped, {} blocked, {} error",
            run.tests_passed(),
            run.tests_failed(),
            run.tests_skipped(),
            run.tests_blocked(),
            run.tests_with_error()
        )
        .red()
    };
    println!("{}: {}", "Summary".bold(), summary);
}
