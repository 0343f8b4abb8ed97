// advisor-stream: streaming tool-augmented advising over stdio.
// Requests in on stdin, events out on stdout, logs on stderr.

use advisor_server::{AdvisorConfig, Runner};
use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_override: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("advisor-stream {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_override = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("Error: --config requires an argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Try 'advisor-stream --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    // Tracing to stderr only - stdout carries the event protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("advisor=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting advisor-stream {}", env!("CARGO_PKG_VERSION"));

    let config = AdvisorConfig::load_with_precedence(config_override).await?;
    let runner = Runner::from_config(config).await?;

    runner.run(tokio::io::stdin(), tokio::io::stdout()).await
}

fn print_help() {
    println!("advisor-stream {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("USAGE:");
    println!("    advisor-stream [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help             Print help information");
    println!("    -V, --version          Print version information");
    println!("    -c, --config <FILE>    Configuration file (YAML)");
    println!();
    println!("PROTOCOL:");
    println!("    stdin:  one request per line");
    println!("            {{\"message\": \"...\", \"conversation_id\": \"...\", \"history\": [...]}}");
    println!("            {{\"cancel\": true}} cancels the running conversation");
    println!("    stdout: one event per line");
    println!("            {{\"type\": \"thinking|tool_call|tool_result|response|error|complete\",");
    println!("             \"content\": \"...\", \"toolData\": \"...\"}}");
    println!();
    println!("ENVIRONMENT:");
    println!("    ADVISOR_CONFIG    Path to the configuration file");
    println!("    RUST_LOG          Logging filter (default: advisor=info)");
    println!();
    println!("CONFIG LOOKUP:");
    println!("    --config, then ADVISOR_CONFIG, then ./advisor.yaml,");
    println!("    then ~/.config/advisor-stream/advisor.yaml");
}
