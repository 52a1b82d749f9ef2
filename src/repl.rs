use research_core::config::AppConfig;
use research_core::error::AgentError;
use research_core::history::ResearchHistory;
use research_core::model::OpenAiModel;
use research_core::recorder::Recorder;
use research_core::tool_registry::ToolRegistry;
use research_core::types::{AgentEvent, ResearchRun};
use research_core::AgentLoop;
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::{Config as RlConfig, DefaultEditor};
use std::sync::Arc;
use tokio::sync::mpsc;

const BANNER: &str = r#"
  ╔═══════════════════════════════════════════╗
  ║          research-shell v0.1.0            ║
  ║   LLM-driven research assistant           ║
  ╚═══════════════════════════════════════════╝

  Type a research question and press Enter.
  Commands:
    /history       — List past research runs
    /save          — Append the last answer to the research log
    /clear         — Clear run history
    /tools         — List available tools
    /config        — Show current config
    /help          — Show this help
    /exit          — Quit
"#;

/// Run the interactive prompt.
pub async fn run(config: AppConfig, tool_registry: Arc<ToolRegistry>) -> Result<()> {
    println!("{}", BANNER);
    println!(
        "  Model: {}  |  Endpoint: {}  |  Budget: {} iterations",
        config.provider.model, config.provider.api_base, config.agent.max_iterations
    );
    println!();

    let model = Arc::new(OpenAiModel::new(&config));
    let agent = Arc::new(AgentLoop::new(
        model,
        tool_registry.clone(),
        config.agent.max_iterations,
    ));

    // The prompt owns the run history; it lives exactly as long as this loop.
    let mut history = ResearchHistory::new();
    let recorder = Recorder::new(config.output.log_path.clone());

    // Set up rustyline.
    let rl_config = RlConfig::builder().auto_add_history(true).build();
    let history_path = AppConfig::data_dir().join("repl_history.txt");
    let mut rl = DefaultEditor::with_config(rl_config)?;
    let _ = rl.load_history(&history_path);

    loop {
        match rl.readline("\x1b[1;36mresearch\x1b[0m \x1b[1;32m❯\x1b[0m ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                // Handle slash commands.
                if input.starts_with('/') {
                    let handled = handle_command(
                        input,
                        &mut history,
                        &recorder,
                        &tool_registry,
                        &config,
                    )
                    .await?;
                    if !handled {
                        break; // /exit
                    }
                    continue;
                }

                println!("\n\x1b[0;36mResearching...\x1b[0m\n");
                match run_question(agent.clone(), input, None).await {
                    Ok(run) => {
                        print_answer(&run);
                        history.record(&run);
                    }
                    Err(e @ AgentError::AgentUnavailable(_)) => {
                        eprintln!(
                            "\x1b[0;31m{}\x1b[0m\nCheck the provider api_base and API key \
                             configuration, then try again.",
                            e
                        );
                    }
                    Err(e) => {
                        eprintln!("\x1b[0;31mError during research: {}\x1b[0m", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    // Save prompt history.
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

/// Run one research question, printing progress events as they arrive.
pub async fn run_question(
    agent: Arc<AgentLoop>,
    question: &str,
    budget: Option<usize>,
) -> research_core::Result<ResearchRun> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AgentEvent>();

    let handle = {
        let question = question.to_string();
        tokio::spawn(async move {
            match budget {
                Some(b) => agent.run_with_budget(&question, b, tx).await,
                None => agent.run(&question, tx).await,
            }
        })
    };

    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::ActionStart {
                tool_name,
                tool_input,
                ..
            } => {
                println!(
                    "  \x1b[0;35m⚡ {}\x1b[0m ← {}",
                    tool_name,
                    preview(&tool_input, 80)
                );
            }
            AgentEvent::Observation(result) => {
                let status = if result.is_error {
                    "\x1b[0;31m✗\x1b[0m"
                } else {
                    "\x1b[0;32m✓\x1b[0m"
                };
                println!(
                    "  {} {}",
                    status,
                    preview(&result.observation, 200).replace('\n', "\n    ")
                );
            }
            // The final answer is printed by the caller; fatal errors are
            // surfaced through the join result below.
            AgentEvent::Done(_) | AgentEvent::Error(_) => {}
        }
    }

    handle
        .await
        .map_err(|e| AgentError::Other(anyhow::anyhow!("research task failed: {}", e)))?
}

/// Print the answer banner the way the one-shot flow and the prompt share.
pub fn print_answer(run: &ResearchRun) {
    println!("\n{}", "=".repeat(70));
    println!("RESEARCH RESULTS");
    println!("{}", "=".repeat(70));
    println!("{}", run.answer);
    println!("{}", "=".repeat(70));
    if run.degraded {
        println!("\x1b[1;33m⚠  Run ended early after {} iterations.\x1b[0m", run.iterations_used);
    }
    println!();
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Handle a slash command. Returns `true` to continue the loop, `false` to exit.
async fn handle_command(
    input: &str,
    history: &mut ResearchHistory,
    recorder: &Recorder,
    tool_registry: &ToolRegistry,
    config: &AppConfig,
) -> Result<bool> {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];

    match cmd {
        "/exit" | "/quit" | "/q" => {
            println!("Goodbye!");
            return Ok(false);
        }
        "/history" => {
            if history.is_empty() {
                println!("  No research runs yet.");
            } else {
                for entry in history.entries() {
                    let marker = if entry.degraded { " ⚠" } else { "" };
                    println!(
                        "  {} {}{}",
                        entry.timestamp.format("%Y-%m-%d %H:%M"),
                        preview(&entry.question, 60),
                        marker
                    );
                }
            }
        }
        "/save" => match history.entries().last() {
            Some(entry) => match recorder.append(&entry.answer).await {
                Ok(status) => println!("  {}", status),
                Err(e) => println!("  Saving failed: {}", e),
            },
            None => println!("  Nothing to save yet — ask a question first."),
        },
        "/clear" => {
            history.clear();
            println!("  Cleared run history.");
        }
        "/tools" => {
            let names = tool_registry.names();
            if names.is_empty() {
                println!("  No tools registered.");
            } else {
                println!("  Available tools ({}):", names.len());
                for name in names {
                    if let Some(tool) = tool_registry.get(name) {
                        println!("    • {} — {}", name, tool.description());
                    }
                }
            }
        }
        "/config" => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        "/help" | "/?" => {
            println!("  /history       — List past research runs");
            println!("  /save          — Append the last answer to the research log");
            println!("  /clear         — Clear run history");
            println!("  /tools         — List available tools");
            println!("  /config        — Show current config");
            println!("  /help          — Show this help");
            println!("  /exit          — Quit");
        }
        _ => {
            println!(
                "Unknown command: {}. Type /help for available commands.",
                cmd
            );
        }
    }

    Ok(true)
}
