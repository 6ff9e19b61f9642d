//! Vault orchestrator CLI.
//!
//! Runs the watch → plan → verify → archive cycle once or on an interval
//! against a vault laid out by `orchestrator init`.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use orchestrator::cancel::{CancelFlag, install_ctrlc_handler};
use orchestrator::core::types::{ArchivePolicy, CycleStatus};
use orchestrator::cycle::{CycleContext, CycleSettings, run_cycle};
use orchestrator::exit_codes;
use orchestrator::io::agent::CommandAgent;
use orchestrator::io::config::{CONFIG_FILE_NAME, OrchestratorConfig, load_config};
use orchestrator::io::confirm::StdinConfirm;
use orchestrator::io::item_store::ItemStore;
use orchestrator::io::layout::{InitOptions, VaultPaths, init_vault};
use orchestrator::io::reporter::{Reporter, StatusReporter, SystemClock};
use orchestrator::io::watcher::CommandWatcher;
use orchestrator::logging;
use orchestrator::looping::{LoopSettings, LoopStop, run_continuous};

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version,
    about = "Turn inbox items into plans with an external agent, then archive them"
)]
struct Cli {
    /// Config file (default: `<root>/orchestrator.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vault root; overrides `vault_root` from the config file.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single cycle.
    Once {
        /// Archive policy for this run (default: from config).
        #[arg(long, value_enum)]
        archive: Option<ArchiveArg>,
    },
    /// Run cycles on an interval until Ctrl+C.
    Watch {
        /// Minutes between cycles (default: `poll_interval_mins`).
        #[arg(long)]
        interval_mins: Option<u64>,
        /// Archive policy; `prompt` is not available here.
        #[arg(long, value_enum)]
        archive: Option<WatchArchiveArg>,
        /// Stop after this many cycles.
        #[arg(long)]
        max_cycles: Option<u32>,
    },
    /// Create the vault folders and a default `orchestrator.toml`.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print pending, plans and archived counts.
    Status {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ArchiveArg {
    Always,
    Never,
    Prompt,
}

impl From<ArchiveArg> for ArchivePolicy {
    fn from(arg: ArchiveArg) -> Self {
        match arg {
            ArchiveArg::Always => Self::Always,
            ArchiveArg::Never => Self::Never,
            ArchiveArg::Prompt => Self::Prompt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WatchArchiveArg {
    Always,
    Never,
}

impl From<WatchArchiveArg> for ArchivePolicy {
    fn from(arg: WatchArchiveArg) -> Self {
        match arg {
            WatchArchiveArg::Always => Self::Always,
            WatchArchiveArg::Never => Self::Never,
        }
    }
}

/// What the interactive menu resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Once,
    Watch,
    Exit,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let command = match cli.command {
        Some(command) => command,
        None => match prompt_menu(&mut io::stdin().lock())? {
            MenuChoice::Once => Command::Once { archive: None },
            MenuChoice::Watch => Command::Watch {
                interval_mins: None,
                archive: None,
                max_cycles: None,
            },
            MenuChoice::Exit => return Ok(exit_codes::OK),
        },
    };

    let config = resolve_config(cli.config.as_deref(), cli.root.as_deref())?;
    match command {
        Command::Init { force } => cmd_init(&config, force),
        Command::Status { json } => cmd_status(&config, json),
        Command::Once { archive } => {
            let policy = archive.map_or(config.archive_policy, ArchivePolicy::from);
            cmd_once(config, policy)
        }
        Command::Watch {
            interval_mins,
            archive,
            max_cycles,
        } => {
            let mut config = config;
            if let Some(mins) = interval_mins {
                config.poll_interval_mins = mins;
                config.validate()?;
            }
            let policy = archive.map_or(config.archive_policy, ArchivePolicy::from);
            cmd_watch(config, policy, max_cycles)
        }
    }
}

/// Load the config file and apply `--root`.
///
/// Without `--config` the file is looked up in the vault root (`--root`, or
/// the current directory).
fn resolve_config(config: Option<&Path>, root: Option<&Path>) -> Result<OrchestratorConfig> {
    let config_path = match (config, root) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(root)) => root.join(CONFIG_FILE_NAME),
        (None, None) => PathBuf::from(CONFIG_FILE_NAME),
    };
    let mut cfg = load_config(&config_path)?;
    if let Some(root) = root {
        cfg.vault_root = root.to_path_buf();
    }
    Ok(cfg)
}

fn cmd_init(config: &OrchestratorConfig, force: bool) -> Result<i32> {
    let paths = init_vault(config, &InitOptions { force })?;
    println!("Initialized vault at {}", paths.root.display());
    Ok(exit_codes::OK)
}

fn cmd_status(config: &OrchestratorConfig, json: bool) -> Result<i32> {
    let paths = VaultPaths::from_config(config);
    paths.ensure_exists()?;
    let counts = ItemStore::new(&paths, config.item_extension.clone()).counts()?;
    if json {
        let payload = serde_json::to_string_pretty(&counts).context("serialize status json")?;
        println!("{payload}");
    } else {
        println!("pending:  {}", counts.pending);
        println!("plans:    {}", counts.plans);
        println!("archived: {}", counts.archived);
    }
    Ok(exit_codes::OK)
}

/// Process-wide wiring shared by `once` and `watch`.
struct Runtime {
    paths: VaultPaths,
    store: ItemStore,
    watcher: CommandWatcher,
    agent: CommandAgent,
    reporter: StatusReporter,
    confirm: StdinConfirm,
    cancel: CancelFlag,
}

impl Runtime {
    fn new(config: &OrchestratorConfig) -> Result<Self> {
        let paths = VaultPaths::from_config(config);
        paths.ensure_exists()?;
        let cancel = CancelFlag::new();
        install_ctrlc_handler(&cancel)?;
        Ok(Self {
            store: ItemStore::new(&paths, config.item_extension.clone()),
            watcher: CommandWatcher {
                argv: config.watcher_command.clone(),
                workdir: paths.scripts_dir.clone(),
                timeout: config.watcher_timeout(),
                output_limit_bytes: config.output_limit_bytes,
                cancel: Some(cancel.clone()),
            },
            agent: CommandAgent {
                argv: config.agent_command.clone(),
                prompt_via: config.prompt_via,
                output_limit_bytes: config.output_limit_bytes,
                cancel: Some(cancel.clone()),
            },
            reporter: StatusReporter::new(paths.logs_dir.clone()),
            confirm: StdinConfirm::new(cancel.clone()),
            paths,
            cancel,
        })
    }

    fn context(&self) -> CycleContext<'_> {
        CycleContext {
            store: &self.store,
            watcher: &self.watcher,
            agent: &self.agent,
            reporter: &self.reporter,
            confirm: &self.confirm,
            clock: &SystemClock,
            cancel: &self.cancel,
        }
    }
}

fn cmd_once(config: OrchestratorConfig, policy: ArchivePolicy) -> Result<i32> {
    let runtime = Runtime::new(&config)?;
    runtime.reporter.emit("Orchestrator started (single cycle)");
    runtime
        .reporter
        .emit(&format!("Vault: {}", runtime.paths.root.display()));

    let settings = CycleSettings {
        archive_policy: policy,
        ..CycleSettings::from_config(&config)
    };
    let result = run_cycle(&runtime.context(), &settings)?;
    Ok(match result.status {
        CycleStatus::WatcherFailed => exit_codes::WATCHER_FAILED,
        CycleStatus::Interrupted => exit_codes::INTERRUPTED,
        CycleStatus::Completed | CycleStatus::NoPendingItems => exit_codes::OK,
    })
}

fn cmd_watch(
    config: OrchestratorConfig,
    policy: ArchivePolicy,
    max_cycles: Option<u32>,
) -> Result<i32> {
    let runtime = Runtime::new(&config)?;
    runtime.reporter.emit("Orchestrator started (continuous)");
    runtime
        .reporter
        .emit(&format!("Vault: {}", runtime.paths.root.display()));

    // Nobody is at the terminal between cycles.
    let policy = if policy == ArchivePolicy::Prompt {
        runtime
            .reporter
            .emit("Archive policy 'prompt' is not available in continuous mode, using 'never'");
        ArchivePolicy::Never
    } else {
        policy
    };
    let settings = CycleSettings {
        archive_policy: policy,
        ..CycleSettings::from_config(&config)
    };
    let loop_settings = LoopSettings {
        interval: config.poll_interval(),
        max_cycles,
    };

    let outcome = run_continuous(
        &runtime.context(),
        &settings,
        &loop_settings,
        |_| {},
    )?;
    Ok(match outcome.stop {
        LoopStop::Interrupted => exit_codes::INTERRUPTED,
        LoopStop::MaxCycles => exit_codes::OK,
    })
}

/// Show the mode menu and read one choice. EOF or `3` exits.
fn prompt_menu<R: BufRead>(input: &mut R) -> Result<MenuChoice> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Vault orchestrator").context("write menu")?;
    writeln!(stdout, "  1. Run once").context("write menu")?;
    writeln!(stdout, "  2. Run continuously").context("write menu")?;
    writeln!(stdout, "  3. Exit").context("write menu")?;
    loop {
        write!(stdout, "Choice (1-3): ").context("write menu")?;
        stdout.flush().context("flush menu")?;
        let mut line = String::new();
        if input.read_line(&mut line).context("read menu choice")? == 0 {
            return Ok(MenuChoice::Exit);
        }
        match parse_menu_choice(&line) {
            Some(choice) => return Ok(choice),
            None => writeln!(stdout, "Invalid choice").context("write menu")?,
        }
    }
}

fn parse_menu_choice(line: &str) -> Option<MenuChoice> {
    match line.trim() {
        "1" => Some(MenuChoice::Once),
        "2" => Some(MenuChoice::Watch),
        "3" => Some(MenuChoice::Exit),
        _ => None,
    }
}
