//! aigate: submit one task through the gateway from the command line.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use aigate::config::{Config, Secrets};
use aigate::{SubmitOptions, Task, TaskKind};
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// AI request router
#[derive(Parser)]
#[command(name = "aigate")]
#[command(version)]
#[command(about = "Route a prompt to the best available AI provider")]
struct Args {
    /// Config file (default: ~/.aigate/config.toml, then /etc/aigate/config.toml)
    #[arg(short, long, env = "AIGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Task kind: chat, analysis, creative, legal, strategic, operational, coding
    #[arg(short, long, default_value = "chat")]
    kind: TaskKind,

    /// System prompt override
    #[arg(short, long)]
    system: Option<String>,

    #[arg(long, default_value_t = 1000)]
    max_tokens: u32,

    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Per-provider timeout in seconds (overrides the config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Attribute cost to this user
    #[arg(long)]
    user: Option<String>,

    /// Print the usage snapshot as JSON after the response
    #[arg(long)]
    usage: bool,

    /// Prompt (or omit to read from stdin)
    prompt: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let prompt = resolve_text(args.prompt)?;

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let gateway = config.build_gateway(&secrets)?;

    let mut task = Task::new(args.kind, prompt)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature);
    if let Some(system) = args.system {
        task = task.system_prompt(system);
    }
    if let Some(user) = args.user {
        task = task.user_id(user);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut options = SubmitOptions::new().cancel(cancel);
    if let Some(secs) = args.timeout {
        options = options.timeout(Duration::from_secs(secs));
    }

    let result = gateway.submit_with(task, options).await;
    ctrl_c.abort();

    let outcome = match result {
        Ok(response) => {
            println!("{}", response.content);
            eprintln!(
                "[{} / {} | {} tokens | ${:.6} | {:.2}s]",
                response.provider,
                response.model,
                response.tokens.total,
                response.cost,
                response.duration.as_secs_f64()
            );
            if args.usage {
                println!("{}", serde_json::to_string_pretty(&gateway.usage())?);
            }
            Ok(())
        }
        Err(err) => Err(err.into()),
    };

    gateway.shutdown().await;
    outcome
}

/// Resolve the prompt from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => Err("no prompt provided (pass it as an argument or via stdin)".into()),
    }
}
