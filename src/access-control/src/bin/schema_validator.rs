//! # Schema Validator
//!
//! Pre-deployment gate: validates every policy file under the root directory
//! against its JSON Schema and exits non-zero if anything is invalid.

use access_control::validator::{all_valid, SchemaValidator, ValidationResult, DEFAULT_SCHEMA_DIR};
use access_control::store::DEFAULT_MAX_CONCURRENCY;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "schema-validator")]
#[command(about = "Validate an access-control policy tree against its JSON Schemas")]
#[command(version)]
struct Args {
    /// Policy root directory
    #[arg(short, long, env = "IAM_ROOT_DIR")]
    root_dir: PathBuf,

    /// Schema directory, relative to the root directory
    #[arg(short, long, default_value = DEFAULT_SCHEMA_DIR)]
    schema_dir: PathBuf,

    /// Scope directories validated concurrently
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    concurrency: usize,
}

fn print_result(result: &ValidationResult) {
    let path = result.file_path.display();
    if result.valid() {
        println!("[√] file://{path}");
        return;
    }

    println!("[x] file://{path}");
    for (i, err) in result.errors().iter().enumerate() {
        println!("  {}. Message: {}", i + 1, err.message);
        if !err.field.is_empty() {
            println!("     Field: {}", err.field);
            println!("     Value: {}", err.value);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let validator =
        SchemaValidator::new(&args.root_dir, &args.schema_dir).with_max_concurrency(args.concurrency);

    let results = match validator.validate_all().await {
        Ok(results) => results,
        Err(err) => {
            error!(error = %err, "Validation could not run");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    for result in &results {
        print_result(result);
    }

    if all_valid(&results) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
