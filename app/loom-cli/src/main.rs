//! Minimal demonstration binary for the agentic processing loop: wires an
//! in-memory `Storage`, a console `EventBus`, and a deterministic
//! `EchoProvider` stand-in for a real model backend around
//! `loom_loop::Processor`, then drives it from a line-oriented REPL.
//!
//! CLI surface and exit codes beyond this are out of scope per the
//! specification's external-interfaces section.

mod bus;
mod provider;
mod storage;

use anyhow::Context;
use bus::ConsoleEventBus;
use clap::Parser;
use clap::Subcommand;
use loom_loop::Processor;
use loom_loop::Storage;
use loom_protocol::AgentProfile;
use loom_protocol::Message;
use loom_protocol::PermissionMode;
use loom_protocol::Role;
use loom_protocol::Session;
use loom_subagent::AgentRegistry;
use loom_tools::ToolRegistry;
use provider::EchoProvider;
use std::io::BufRead;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use storage::InMemoryStorage;

#[derive(Parser)]
#[command(name = "loom-cli")]
#[command(about = "Demonstration driver for the loom agentic processing loop")]
struct Cli {
    /// Working directory the session reports to the model and resolves
    /// tool paths against.
    #[arg(long, default_value = ".")]
    cwd: PathBuf,

    /// Project config file to load instead of the default search path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single prompt and print the final response.
    Run {
        /// The user message to process.
        prompt: String,
    },
    /// List the agent profiles the Task tool can spawn.
    Agents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("loom_cli=info,loom_loop=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = cli.cwd.canonicalize().unwrap_or(cli.cwd.clone());

    let mut loader = loom_config::ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_project_config_path(path.clone());
    }
    let config = loader.load().context("loading configuration")?;

    let agent_registry = Arc::new(AgentRegistry::new());

    match cli.command {
        Some(Command::Agents) => {
            for name in ["explore", "plan", "general-purpose"] {
                if let Some(definition) = agent_registry.get(name) {
                    println!("{name}: {}", definition.description);
                }
            }
            return Ok(());
        }
        Some(Command::Run { prompt }) => {
            let processor = build_processor(&config, agent_registry);
            let session = Session::new(cwd.to_string_lossy().to_string());
            let session_id = session.id;
            processor.storage().save_session(&session).await.context("saving session")?;
            run_turn(&processor, session_id, &config, &prompt).await?;
        }
        None => {
            let processor = build_processor(&config, agent_registry);
            let session = Session::new(cwd.to_string_lossy().to_string());
            let session_id = session.id;
            processor.storage().save_session(&session).await.context("saving session")?;
            repl(&processor, session_id, &config).await?;
        }
    }

    Ok(())
}

fn build_processor(config: &loom_config::Config, agent_registry: Arc<AgentRegistry>) -> Arc<Processor> {
    let default_model = config.default_model.clone().unwrap_or_else(|| "demo-model".to_string());
    Processor::new(
        Arc::new(InMemoryStorage::new()),
        Arc::new(EchoProvider),
        Arc::new(ConsoleEventBus::default()),
        ToolRegistry::with_builtins(),
        agent_registry,
        default_model.clone(),
        default_model,
    )
}

fn main_agent_profile(config: &loom_config::Config) -> AgentProfile {
    let permission_mode = match config.permissions.mode.as_deref() {
        Some("accept_edits") => PermissionMode::AcceptEdits,
        Some("bypass") => PermissionMode::BypassPermissions,
        Some("plan") => PermissionMode::Plan,
        _ => PermissionMode::BypassPermissions,
    };
    AgentProfile {
        name: "main".to_string(),
        system_prompt: String::new(),
        tools: Vec::new(),
        model: config.default_model.clone(),
        permission_mode,
        category_permissions: config.permissions.category_permissions(),
        permission_rules: config.permissions.permission_rules(),
    }
}

async fn run_turn(
    processor: &Arc<Processor>,
    session_id: ulid::Ulid,
    config: &loom_config::Config,
    prompt: &str,
) -> anyhow::Result<()> {
    let user_message = Message::new(session_id, Role::User, vec![loom_protocol::Part::text(prompt)]);
    processor
        .storage()
        .append_message(&user_message)
        .await
        .context("appending user message")?;

    let agent = main_agent_profile(config);
    let run = {
        let processor = Arc::clone(processor);
        tokio::spawn(async move { processor.process(session_id, agent).await })
    };

    tokio::select! {
        result = run => {
            result.context("processor task panicked")?.context("processing turn")?;
        }
        _ = tokio::signal::ctrl_c() => {
            processor.abort(session_id);
            println!("\n[aborted]");
        }
    }
    Ok(())
}

async fn repl(processor: &Arc<Processor>, session_id: ulid::Ulid, config: &loom_config::Config) -> anyhow::Result<()> {
    println!("loom-cli demonstration REPL. Type a message, `/bash <command>` to exercise the Bash tool, or `quit`.");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        run_turn(processor, session_id, config, line).await?;
    }

    Ok(())
}
