//! Engine JAR placement: copy or symlink the engine artifact for the
//! selected version into the runtime's library directory (spec §4.6
//! output 5).

use crate::MaterializeError;
use std::path::Path;

pub fn materialize(engine_jar: &Path, lib_dir: &Path, install_method: &str) -> Result<(), MaterializeError> {
    if !engine_jar.exists() {
        return Err(MaterializeError::Template(format!(
            "engine artifact not found at {}",
            engine_jar.display()
        )));
    }
    std::fs::create_dir_all(lib_dir)?;
    let file_name = engine_jar
        .file_name()
        .ok_or_else(|| MaterializeError::Template("engine artifact has no file name".to_owned()))?;
    let dest = lib_dir.join(file_name);

    let _ = std::fs::remove_file(&dest);

    match install_method {
        "symlink" => {
            if symlink(engine_jar, &dest).is_err() {
                std::fs::copy(engine_jar, &dest)?;
            }
        }
        _ => {
            std::fs::copy(engine_jar, &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(not(unix))]
fn symlink(_source: &Path, _dest: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks not supported on this platform",
    ))
}
