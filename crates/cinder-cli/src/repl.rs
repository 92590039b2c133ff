//! Interactive REPL.
//!
//! Uses rustyline for readline editing and history. Commands are
//! tokenized and sent raw — no client-side validation, the server
//! handles everything. SUBSCRIBE/PSUBSCRIBE register a printing handler
//! so pushed messages appear as they arrive.

use std::path::PathBuf;

use cinder::{Client, CommandArgs};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::runtime::Runtime;

use crate::format::{format_message, format_response};

/// Runs the interactive loop. Blocks the calling thread; async work is
/// driven through the runtime while pushed messages print from the
/// connection's task on a worker thread.
pub fn run(rt: &Runtime, client: &Client, host: &str, port: u16) {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}", format!("failed to create editor: {e}").red());
            return;
        }
    };

    let history_path = history_file();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    let prompt = format!("{host}:{port}> ");

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let tokens = match tokenize(trimmed) {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        eprintln!("{}", format!("parse error: {e}").red());
                        continue;
                    }
                };

                let Some(first) = tokens.first() else {
                    continue;
                };
                let verb = first.to_ascii_uppercase();
                match verb.as_str() {
                    "EXIT" => break,
                    "QUIT" => {
                        let _ = rt.block_on(client.quit());
                        break;
                    }
                    "SUBSCRIBE" | "PSUBSCRIBE" => {
                        run_subscribe(rt, client, &verb, &tokens[1..]);
                        continue;
                    }
                    "UNSUBSCRIBE" | "PUNSUBSCRIBE" => {
                        run_unsubscribe(rt, client, &verb, &tokens[1..]);
                        continue;
                    }
                    _ => {}
                }

                let Some(args) = CommandArgs::from_tokens(&tokens) else {
                    continue;
                };
                match rt.block_on(client.command(args)) {
                    Ok(value) => println!("{}", format_response(&value)),
                    Err(e) => eprintln!("{} {e}", "(error)".red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}", format!("readline error: {e}").red());
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }
}

fn run_subscribe(rt: &Runtime, client: &Client, verb: &str, channels: &[String]) {
    if channels.is_empty() {
        eprintln!("{}", format!("{verb} needs at least one channel").red());
        return;
    }
    let refs: Vec<&str> = channels.iter().map(String::as_str).collect();
    let handler = |channel: &str, payload: &bytes::Bytes| {
        println!("{}", format_message(channel, payload));
    };

    let result = if verb == "SUBSCRIBE" {
        rt.block_on(client.subscribe(&refs, handler))
    } else {
        rt.block_on(client.psubscribe(&refs, handler))
    };
    match result {
        Ok(_) => println!(
            "{}",
            format!("subscribed to {}", channels.join(", ")).cyan()
        ),
        Err(e) => eprintln!("{} {e}", "(error)".red()),
    }
}

fn run_unsubscribe(rt: &Runtime, client: &Client, verb: &str, channels: &[String]) {
    let refs: Vec<&str> = channels.iter().map(String::as_str).collect();
    let result = if verb == "UNSUBSCRIBE" {
        rt.block_on(client.unsubscribe(&refs))
    } else {
        rt.block_on(client.punsubscribe(&refs))
    };
    match result {
        Ok(()) => println!("{}", "unsubscribed".cyan()),
        Err(e) => eprintln!("{} {e}", "(error)".red()),
    }
}

/// Path for persistent REPL history (`~/.cinder_history`).
fn history_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cinder_history"))
}

/// Splits a command line into tokens, honoring single and double
/// quotes so values with spaces survive intact.
fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                } else if ch == '\\' && q == '"' {
                    match chars.next() {
                        Some(escaped) => current.push(escaped),
                        None => return Err("trailing backslash".into()),
                    }
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err("unterminated quote".into());
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
