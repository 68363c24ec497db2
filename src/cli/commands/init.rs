//! Init command: write a sample configuration file

use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, ImportConfig, sample_config};
use std::path::{Path, PathBuf};

/// Write `.geo-import.toml` into `dir`, refusing to replace an existing
/// file unless `force` is set
pub fn handle_init(dir: &Path, force: bool) -> Result<PathBuf, CliError> {
    let path = dir.join(CONFIG_FILENAME);
    if path.exists() && !force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    // The sample must stay loadable
    ImportConfig::parse(sample_config())?;

    std::fs::create_dir_all(dir)
        .map_err(|e| CliError::FileWriteError(dir.to_path_buf(), e.to_string()))?;
    std::fs::write(&path, sample_config())
        .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;
    println!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = handle_init(dir.path(), false).unwrap();
        assert!(path.exists());
        ImportConfig::load(dir.path()).unwrap();

        assert!(matches!(
            handle_init(dir.path(), false),
            Err(CliError::InvalidArgument(_))
        ));
        handle_init(dir.path(), true).unwrap();
    }
}
