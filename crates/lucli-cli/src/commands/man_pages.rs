use clap::CommandFactory;
use clap_mangen::Man;
use std::path::Path;

use crate::commands::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::Cli;

/// Render a man page per subcommand into `dir` (spec §6 ambient CLI surface).
pub fn run(dir: &Path) -> u8 {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("error: {e}");
        return EXIT_FAILURE;
    }

    let cmd = Cli::command();
    if let Err(e) = render(&cmd, dir) {
        eprintln!("error: {e}");
        return EXIT_FAILURE;
    }
    println!("wrote man pages to {}", dir.display());
    EXIT_SUCCESS
}

fn render(cmd: &clap::Command, dir: &Path) -> std::io::Result<()> {
    let man = Man::new(cmd.clone());
    let path = dir.join(format!("{}.1", cmd.get_name()));
    let mut out = Vec::new();
    man.render(&mut out)?;
    std::fs::write(path, out)?;

    for sub in cmd.get_subcommands() {
        render(sub, dir)?;
    }
    Ok(())
}
