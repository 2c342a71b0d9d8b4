use gumdrop::Options;
use std::process;

use stampede::config::{Cli, Command};
use stampede::{scenario, LoadTest, LoadTestError};

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match Cli::parse_args_default(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}: {}", env!("CARGO_PKG_NAME"), e);
            eprintln!("{}", Cli::usage());
            process::exit(1);
        }
    };

    if cli.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return;
    }

    let configuration = match cli.command {
        Some(Command::Run(configuration)) if !configuration.help => configuration,
        Some(Command::Run(_)) => {
            println!("Usage: {} run <scenario> [OPTIONS]\n", env!("CARGO_PKG_NAME"));
            println!("{}", stampede::config::Configuration::usage());
            return;
        }
        None => {
            println!("{}\n", Cli::usage());
            println!("Commands:");
            println!("{}", Cli::command_list().unwrap_or_default());
            process::exit(if cli.help { 0 } else { 1 });
        }
    };

    match run(configuration).await {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            if e.is_configuration_error() {
                eprintln!(
                    "Run `{} run --help` to list all options.",
                    env!("CARGO_PKG_NAME")
                );
            }
            process::exit(1);
        }
    }
}

// Returns whether every threshold passed.
async fn run(configuration: stampede::config::Configuration) -> Result<bool, LoadTestError> {
    let result = LoadTest::initialize_with_config(configuration)
        .register_scenario(scenario::http_get()?)
        .execute()
        .await?;
    Ok(result.passed)
}
