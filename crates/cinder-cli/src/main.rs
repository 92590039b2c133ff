//! cinder-cli: interactive command-line client.
//!
//! Connects to a RESP2 server over TCP, sends commands, and
//! pretty-prints responses. With no trailing arguments it drops into an
//! interactive REPL; otherwise the arguments are sent as one command.

mod format;
mod repl;

use std::process::ExitCode;

use cinder::{Client, CommandArgs};
use clap::Parser;
use colored::Colorize;

/// Interactive CLI client for RESP2 servers.
#[derive(Parser)]
#[command(name = "cinder-cli", version, about)]
struct Args {
    /// Server hostname.
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port.
    #[arg(short, long, default_value_t = 6379)]
    port: u16,

    /// One-shot mode: a raw command (e.g. `cinder-cli SET key value`).
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinder=warn".into()),
        )
        .init();

    let args = Args::parse();

    // rustyline needs the main thread for terminal I/O, so the runtime
    // lives here and async work goes through block_on
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}", format!("failed to create runtime: {e}").red());
            return ExitCode::FAILURE;
        }
    };

    let client = match rt.block_on(Client::connect(&args.host, args.port)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!(
                "{}",
                format!("could not connect to {}:{}: {e}", args.host, args.port).red()
            );
            return ExitCode::FAILURE;
        }
    };

    if args.command.is_empty() {
        repl::run(&rt, &client, &args.host, args.port);
        ExitCode::SUCCESS
    } else {
        run_oneshot(&rt, &client, &args.command)
    }
}

/// Sends a single command and prints the response.
fn run_oneshot(rt: &tokio::runtime::Runtime, client: &Client, tokens: &[String]) -> ExitCode {
    let Some(args) = CommandArgs::from_tokens(tokens) else {
        eprintln!("{}", "empty command".red());
        return ExitCode::FAILURE;
    };

    match rt.block_on(client.command(args)) {
        Ok(value) => {
            println!("{}", format::format_response(&value));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "(error)".red());
            ExitCode::FAILURE
        }
    }
}
