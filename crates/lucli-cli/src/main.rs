mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::deps::DepsCommands;
use commands::modules::ModulesCommands;
use commands::secrets::SecretsCommands;
use commands::server::ServerCommands;
use lucli_core::Engine;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "lucli", version, about = "Per-project CFML application server lifecycle orchestrator")]
struct Cli {
    /// Path to the LuCLI home directory.
    #[arg(long, env = "LUCLI_HOME", default_value = "~/.lucli")]
    home: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start, stop, and inspect per-project server instances.
    Server {
        #[command(subcommand)]
        action: ServerCommands,
    },
    /// Manage user modules under `LUCLI_HOME/modules`.
    Modules {
        #[command(subcommand)]
        action: ModulesCommands,
    },
    /// Resolve and materialize a project's declared dependencies.
    Deps {
        #[command(subcommand)]
        action: DepsCommands,
    },
    /// Manage the encrypted local secret store.
    Secrets {
        #[command(subcommand)]
        action: SecretsCommands,
    },
    /// Evaluate a one-shot CFML expression.
    Cfml { expr: String },
    /// Execute a `.cfs`/`.cfm`/`.cfc` file one-shot.
    Run {
        file: PathBuf,
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Run a JSON-framed request/response daemon.
    Daemon {
        #[arg(long, default_value_t = 4884)]
        port: u16,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions { shell: Shell },
    /// Generate man pages in the specified directory.
    ManPages {
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
    /// Run diagnostic checks on the system and store.
    Doctor,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LUCLI_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    lucli_core::install_signal_handler();

    let home = expand_tilde(&cli.home);
    let json = cli.json;

    // `completions`/`man-pages` render from the `Cli` definition itself and
    // never touch the store.
    if let Commands::Completions { shell } = cli.command {
        commands::completions::run(shell);
        return ExitCode::from(commands::EXIT_SUCCESS);
    }
    if let Commands::ManPages { dir } = &cli.command {
        return ExitCode::from(commands::man_pages::run(dir));
    }

    let engine = match Engine::new(&home) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: could not open LuCLI home at {}: {e}", home.display());
            return ExitCode::from(commands::EXIT_FAILURE);
        }
    };

    let code = match cli.command {
        Commands::Server { action } => dispatch_server(&engine, action, json),
        Commands::Modules { action } => commands::modules::run(&home, &action, json),
        Commands::Deps { action } => commands::deps::run(&engine, &action, json),
        Commands::Secrets { action } => commands::secrets::run(&engine, &action, json),
        Commands::Cfml { expr } => commands::cfml::run(&home, &expr),
        Commands::Run { file, args } => commands::run_file::run(&file, &args),
        Commands::Daemon { port } => commands::daemon::run(&home, port),
        Commands::Doctor => commands::doctor::run(&home),
        Commands::Completions { .. } | Commands::ManPages { .. } => unreachable!("handled above"),
    };

    ExitCode::from(code)
}

#[allow(clippy::too_many_lines, clippy::too_many_arguments)]
fn dispatch_server(engine: &Engine, action: ServerCommands, json: bool) -> u8 {
    match action {
        ServerCommands::Start {
            project_dir,
            name,
            environment,
            base_config_file,
            overrides,
            force,
            dry_run,
            sandbox,
            regenerate_keystore,
        } => commands::server::start::run(
            engine,
            &project_dir,
            name,
            environment,
            base_config_file,
            &overrides,
            force,
            dry_run,
            sandbox,
            regenerate_keystore,
            json,
        ),
        ServerCommands::Stop { name } => commands::server::stop::run(engine, &name, json),
        ServerCommands::Run {
            project_dir,
            name,
            environment,
            overrides,
        } => commands::server::run::run(engine, &project_dir, name, environment, &overrides),
        ServerCommands::Restart { name } => commands::server::restart::run(engine, &name, json),
        ServerCommands::Status { name } => commands::server::status::run(engine, &name, json),
        ServerCommands::List => commands::server::list::run(engine, json),
        ServerCommands::Open { name } => commands::server::open::run(engine, &name),
        ServerCommands::Log { name, lines, follow } => commands::server::log::run(engine, &name, lines, follow),
        ServerCommands::Prune { name, dry_run } => commands::server::prune::run(engine, name, dry_run, json),
        ServerCommands::Monitor { name } => commands::server::monitor::run(engine, &name),
        ServerCommands::Config { action } => commands::server::config::run(&action),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
