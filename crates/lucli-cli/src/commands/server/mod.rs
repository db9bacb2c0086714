pub mod config;
pub mod list;
pub mod log;
pub mod monitor;
pub mod open;
pub mod prune;
pub mod restart;
pub mod run;
pub mod start;
pub mod status;
pub mod stop;

use clap::Subcommand;
use std::path::PathBuf;

use config::ConfigCommands;

/// `lucli server <action>` — spec §6's `server` subtree.
#[derive(Subcommand, Debug)]
pub enum ServerCommands {
    /// Resolve the manifest, provision the runtime, and start the server in the background.
    Start {
        /// Project directory (defaults to the current directory).
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        environment: Option<String>,
        #[arg(long = "config")]
        base_config_file: Option<PathBuf>,
        /// `key=value` manifest overrides, applied last (spec §4.1 step 5).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        sandbox: bool,
        #[arg(long)]
        regenerate_keystore: bool,
    },
    /// Stop a running instance.
    Stop { name: String },
    /// Start the server in the foreground, streaming its logs until interrupted.
    Run {
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        environment: Option<String>,
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Stop then start an instance again.
    Restart { name: String },
    /// Show one instance's current state.
    Status { name: String },
    /// List all known instances.
    List,
    /// Print (or open) the running instance's URL.
    Open { name: String },
    /// Tail an instance's log output.
    Log {
        name: String,
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: usize,
        #[arg(short, long)]
        follow: bool,
    },
    /// Remove provisioned-but-stopped instances and orphaned cache entries.
    Prune {
        name: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print an instance's JMX monitoring endpoint, if enabled.
    Monitor { name: String },
    /// Read or write a manifest key without starting the server.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}
