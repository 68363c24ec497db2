//! CLI command implementations

pub mod init;
pub mod inspect;
pub mod reconcile;

use crate::cli::error::CliError;
use crate::config::ImportConfig;
use crate::import::{ImportResult, import_file};
use std::path::{Path, PathBuf};

/// Options shared by the commands that read an upload
#[derive(Debug, Clone)]
pub struct InputArgs {
    pub input: PathBuf,
    /// MIME type to use during format detection
    pub content_type: Option<String>,
    /// Directory holding `.geo-import.toml`
    pub config_dir: PathBuf,
    /// CSV delimiter override
    pub delimiter: Option<char>,
}

/// Read `args.input` with the reader options from the configuration
pub fn read_input(args: &InputArgs) -> Result<(String, ImportResult), CliError> {
    let bytes = load_file(&args.input)?;

    let mut config = ImportConfig::load(&args.config_dir)?;
    if let Some(delimiter) = args.delimiter {
        config.csv.delimiter = delimiter.to_string();
    }
    let options = config.reader_options()?;

    let file_name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let result = import_file(&file_name, args.content_type.as_deref(), &bytes, &options)?;
    Ok((file_name, result))
}

pub(crate) fn load_file(path: &Path) -> Result<Vec<u8>, CliError> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))
}
