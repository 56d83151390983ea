//! Side AI - Entry Point
//!
//! Loads a side's AI configuration, optionally applies a file of
//! `[modify_ai]` directives, prints diagnostics and can drop into the AI
//! manager console.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use side_ai::ai::AiManager;
use side_ai::core::config::ManagerConfig;
use side_ai::core::error::{AiError, Result};
use side_ai::core::types::SideNumber;
use side_ai::data::ConfigNode;

/// Side AI - configure and live-reconfigure a side's AI
#[derive(Parser, Debug)]
#[command(name = "side-ai")]
#[command(about = "Inspect and modify a side's AI configuration")]
struct Args {
    /// Side AI configuration (TOML); the default AI is used when omitted
    #[arg(long)]
    ai: Option<PathBuf>,

    /// Side the AI is installed for
    #[arg(long, default_value_t = 1)]
    side: u32,

    /// TOML file with `[[modify_ai]]` directives to apply in order
    #[arg(long)]
    directives: Option<PathBuf>,

    /// Manager settings (TOML)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print every aspect with its current value
    #[arg(long)]
    overview: bool,

    /// Print the component tree (implies --debug)
    #[arg(long)]
    structure: bool,

    /// Print the serialized configuration as TOML
    #[arg(long)]
    dump: bool,

    /// Print the serialized configuration as JSON
    #[arg(long)]
    json: bool,

    /// Read console commands from stdin
    #[arg(long)]
    console: bool,

    /// Enable debug-only diagnostics
    #[arg(long)]
    debug: bool,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = args
        .log
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "side_ai=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter.as_str())
        .init();

    let mut settings = match &args.settings {
        Some(path) => ManagerConfig::load(path)?,
        None => ManagerConfig::default(),
    };
    settings.debug |= args.debug || args.structure;

    let side = SideNumber::new(args.side);
    if !side.is_valid() {
        return Err(AiError::Configuration(format!("invalid side {}", args.side)));
    }

    let mut manager = AiManager::new(settings);
    if let Some(path) = &args.ai {
        if !manager.add_ai_for_side_from_file(side, path, true) {
            return Err(AiError::Configuration(format!(
                "could not load AI from {}",
                path.display()
            )));
        }
    }
    tracing::info!("{}", manager.describe_for_side(side));

    if let Some(path) = &args.directives {
        let file = ConfigNode::from_toml_file(path)?;
        let batch: Vec<ConfigNode> = file.child_range("modify_ai").cloned().collect();
        let report = manager.apply_directive_batch(side, batch);
        println!("Directives: {}", report);
    }

    if args.overview {
        println!("{}", manager.overview_for_side(side));
    }

    if args.structure {
        if let Some(tree) = manager.structure_for_side(side) {
            println!("{}", tree);
        }
    }

    if args.dump {
        println!("{}", manager.to_config(side).to_toml_string()?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&manager.to_config(side))?);
    }

    if args.console {
        run_console(&mut manager, side)?;
    }

    Ok(())
}

/// Feed stdin lines to the AI manager console until EOF or `quit`
fn run_console(manager: &mut AiManager, side: SideNumber) -> Result<()> {
    println!("AI manager console for side {}. Type !help, or quit to exit.", side);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

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
        if line == "quit" || line == "q" {
            break;
        }

        println!("{}", manager.evaluate_command(side, line));
    }
    Ok(())
}
