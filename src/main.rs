mod repl;

use research_core::config::AppConfig;
use research_core::model::OpenAiModel;
use research_core::recorder::Recorder;
use research_core::tool_registry::ToolRegistry;
use research_core::AgentLoop;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "research-shell",
    about = "An LLM-driven research assistant with web search, Wikipedia, and note-taking tools",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/research-shell/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a single question and print the answer
    Ask {
        /// The research question
        question: String,

        /// Override the iteration budget for this run
        #[arg(short, long)]
        budget: Option<usize>,

        /// Append the answer to the research log when done
        #[arg(long)]
        save: bool,

        /// Log destination for --save (default: from config)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP server
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "research_shell=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config.
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Apply CLI overrides.
    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.provider.api_base = api_base.clone();
    }

    // Assemble the fixed tool set.
    let mut registry = ToolRegistry::new();
    research_tools::register_all(&mut registry, &config)?;
    let registry = Arc::new(registry);

    tracing::info!(
        "Loaded {} tools, model: {}, endpoint: {}",
        registry.len(),
        config.provider.model,
        config.provider.api_base,
    );

    match cli.command {
        Some(Commands::Ask {
            question,
            budget,
            save,
            output,
        }) => {
            ask_once(&config, registry, &question, budget, save, output).await?;
        }
        Some(Commands::Serve { host, port }) => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            research_server::serve(config, registry).await?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &config)?;
        }
        None => {
            repl::run(config, registry).await?;
        }
    }

    Ok(())
}

/// One-shot research: stream progress to the terminal, print the answer,
/// optionally append it to the research log.
async fn ask_once(
    config: &AppConfig,
    registry: Arc<ToolRegistry>,
    question: &str,
    budget: Option<usize>,
    save: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let model = Arc::new(OpenAiModel::new(config));
    let agent = Arc::new(AgentLoop::new(
        model,
        registry,
        config.agent.max_iterations,
    ));

    println!("\nStarting research...\n");
    let run = match repl::run_question(agent, question, budget).await {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error during research: {}", e);
            std::process::exit(1);
        }
    };

    repl::print_answer(&run);

    if save {
        let path = output.unwrap_or_else(|| config.output.log_path.clone());
        let recorder = Recorder::new(path);
        match recorder.append(&run.answer).await {
            Ok(status) => println!("{}", status),
            Err(e) => eprintln!("Saving failed: {}", e),
        }
    }

    Ok(())
}

fn handle_config_command(action: Option<ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}
