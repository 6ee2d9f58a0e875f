//! Docki CLI - run project commands in reproducible Docker environments

use anyhow::Context;
use clap::Parser;
use docki::cli::Args;
use docki::context::{HostPlatform, Identity};
use docki::{execute_command, DockiError, ExecutionContext, ExecutionMode, InterruptFlag};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let code = match e.downcast_ref::<DockiError>() {
                Some(DockiError::Interrupted) => 130,
                Some(err) => {
                    eprintln!("Error: {}", err);
                    err.exit_code()
                }
                None => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            };
            std::process::exit(code);
        }
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> anyhow::Result<i32> {
    let interrupt = InterruptFlag::install().context("installing the Ctrl+C handler")?;
    let platform = HostPlatform::current();
    let ctx = ExecutionContext {
        mode: match args.output {
            Some(output_dir) => ExecutionMode::Emit { output_dir },
            None => ExecutionMode::Direct,
        },
        platform,
        identity: Identity::for_platform(platform),
        clean: args.clean,
        interrupt,
    };

    let result = execute_command(&args.command.to_command(), &ctx)?;
    if let Some(message) = &result.message {
        println!("{}", message);
    }
    Ok(result.exit_code())
}
