//! TCR - "Test && Commit || Revert" workflow driver
//!
//! The `tcr` command runs a TCR session over a git workspace.
//!
//! ## Commands
//!
//! - `drive`: watch the sources and run the cycle on every change
//! - `navigate`: follow the driver by pulling the remote periodically
//! - `check`: run exactly one cycle and exit with its status

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use tcr_engine::{
    init_tracing, CommandToolchain, Engine, EngineConfig, KnownLanguage, Language, Message,
    MessageKind, NotifyWatcher, Role, SessionInfo, TcrError, Ui,
};

#[derive(Parser)]
#[command(name = "tcr")]
#[command(version = tcr_engine::VERSION)]
#[command(about = "Test && Commit || Revert workflow driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as the driver: watch the sources, run the cycle on every change
    Drive {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Run as the navigator: pull the driver's commits periodically
    Navigate {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Run one build/test/commit-or-revert pass and exit
    Check {
        #[command(flatten)]
        session: SessionArgs,

        /// Print the cycle outcome as JSON on stdout
        #[arg(long)]
        porcelain: bool,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Workspace to run the session in
    #[arg(short = 'b', long, default_value = ".")]
    base_dir: PathBuf,

    /// Workspace language (rust, go, java); auto-detected when omitted
    #[arg(short, long)]
    language: Option<String>,

    /// Push after every green commit
    #[arg(short = 'p', long)]
    auto_push: bool,

    /// Commit message used for green commits
    #[arg(short, long, default_value = "[TCR] tests passing")]
    message: String,

    /// Mob turn length in seconds (0 uses the built-in default)
    #[arg(short = 't', long, default_value_t = 300)]
    turn_duration: u64,

    /// Countdown announcement period in seconds (0 uses the default)
    #[arg(long, default_value_t = 60)]
    tick_period: u64,

    /// Navigator pull period in seconds
    #[arg(long, default_value_t = 30)]
    polling_period: u64,

    /// Nudge an idle driver after this many seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    inactivity_timeout: u64,

    /// Per-command toolchain timeout in seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    command_timeout: u64,
}

impl SessionArgs {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            base_dir: self.base_dir.clone(),
            commit_message: self.message.clone(),
            turn_duration: Duration::from_secs(self.turn_duration),
            tick_period: Duration::from_secs(self.tick_period),
            polling_period: Duration::from_secs(self.polling_period),
            inactivity_timeout: match self.inactivity_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            auto_push: self.auto_push,
        }
    }

    fn language(&self) -> Result<KnownLanguage, TcrError> {
        match self.language.as_deref() {
            None => KnownLanguage::detect(&self.base_dir),
            Some("rust") => Ok(KnownLanguage::rust(&self.base_dir)),
            Some("go") => Ok(KnownLanguage::go(&self.base_dir)),
            Some("java") => Ok(KnownLanguage::java(&self.base_dir)),
            Some(other) => Err(TcrError::Configuration(format!(
                "unsupported language: {other}"
            ))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.json, level);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            e.downcast_ref::<TcrError>()
                .map(|tcr| tcr.status().return_code())
                .unwrap_or(5)
        }
    };
    std::process::exit(code)
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Drive { session } => cmd_role(session, Role::Driver).await,
        Commands::Navigate { session } => cmd_role(session, Role::Navigator).await,
        Commands::Check { session, porcelain } => cmd_check(session, porcelain).await,
    }
}

/// Wire the real collaborators and build the engine for one session.
fn build_engine(session: &SessionArgs, with_watcher: bool) -> Result<Engine> {
    let language = Arc::new(session.language()?);

    let mut toolchain = CommandToolchain::for_language(language.as_ref(), &session.base_dir)?;
    if session.command_timeout > 0 {
        toolchain = toolchain.with_timeout(Duration::from_secs(session.command_timeout));
    }

    let watcher: Arc<dyn tcr_engine::SourceWatcher> = if with_watcher {
        let filter_language = language.clone();
        Arc::new(NotifyWatcher::new(&language.dirs_to_watch(), move |path| {
            filter_language.is_language_file(path)
        })?)
    } else {
        // One-shot and navigator sessions never wait for a change.
        Arc::new(tcr_engine::IdleWatcher)
    };

    let engine = Engine::new(
        session.engine_config(),
        Arc::new(toolchain),
        Arc::new(tcr_engine::GitCli::new(&session.base_dir)),
        language,
        watcher,
        Arc::new(TerminalUi),
    )?;
    Ok(engine)
}

async fn cmd_role(session: SessionArgs, role: Role) -> Result<i32> {
    let engine = build_engine(&session, role == Role::Driver)?;
    let bus = engine.report_bus();
    let printer = bus.subscribe(print_message);

    let mut handle = match role {
        Role::Driver => engine.run_as_driver().await?,
        Role::Navigator => engine.run_as_navigator().await?,
    };

    tokio::select! {
        joined = &mut handle => {
            joined.context("role loop crashed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, winding down");
            engine.quit();
            handle.await.context("role loop crashed")?;
        }
    }

    bus.unsubscribe(printer).await;
    Ok(engine.return_code())
}

async fn cmd_check(session: SessionArgs, porcelain: bool) -> Result<i32> {
    let engine = build_engine(&session, false)?;
    let bus = engine.report_bus();
    let printer = if porcelain {
        None
    } else {
        Some(bus.subscribe(print_message))
    };

    let outcome = engine.run_cycle_once().await;

    if let Some(printer) = printer {
        bus.unsubscribe(printer).await;
    }
    if porcelain {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(engine.return_code())
}

/// Render one bus message on the terminal.
fn print_message(message: Message) {
    match message.kind {
        MessageKind::Normal => println!("{}", message.text),
        MessageKind::Info => println!("- {}", message.text),
        MessageKind::Title => println!("\n=== {} ===", message.text),
        MessageKind::Event => println!("> {}", message.text),
        MessageKind::Notification => println!("* {}", message.text),
        MessageKind::Warning => eprintln!("! {}", message.text),
        MessageKind::Error => eprintln!("x {}", message.text),
    }
}

/// Terminal-backed UI for role banners and session facts.
struct TerminalUi;

impl Ui for TerminalUi {
    fn show_running_mode(&self, mode: &str) {
        println!("Running in {mode} mode");
    }

    fn notify_role_starting(&self, role: Role) {
        println!("Taking over as {role}");
    }

    fn notify_role_ending(&self, role: Role) {
        println!("Handing over the {role} role");
    }

    fn show_session_info(&self, info: &SessionInfo) {
        println!("Workspace:  {}", info.base_dir.display());
        println!("Language:   {}", info.language);
        println!("Branch:     {}", info.branch);
        println!(
            "Auto-push:  {}",
            if info.auto_push { "on" } else { "off" }
        );
    }

    fn confirm(&self, message: &str, default_answer: bool) -> bool {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return default_answer;
        }
        let hint = if default_answer { "[Y/n]" } else { "[y/N]" };
        print!("{message} {hint} ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer).is_err() {
            return default_answer;
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default_answer,
        }
    }
}
