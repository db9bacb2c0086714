//! `lucli run <file>` (spec §6): execute a `.cfs`/`.cfm`/`.cfc` file
//! one-shot, outside any managed instance.

use crate::commands::EXIT_FAILURE;
use std::path::Path;

pub fn run(file: &Path, args: &[String]) -> u8 {
    if !file.exists() {
        eprintln!("error: no such file: {}", file.display());
        return EXIT_FAILURE;
    }
    crate::commands::cfml::exec_script(file, args)
}
