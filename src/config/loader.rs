use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::SignerConfig;
use crate::errors::ConfigError;

/// Name of the configuration file searched for in the directory hierarchy.
pub const CONFIG_FILE_NAME: &str = ".signer.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

pub(crate) fn read_config_file(path: &Path) -> Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse a TOML document and validate the result.
pub fn parse_and_validate_config(contents: &str, path: &Path) -> Result<SignerConfig, ConfigError> {
    let config = toml::from_str::<SignerConfig>(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load an explicitly requested config file. Missing files are an error.
pub fn load_config_from_path(path: &Path) -> Result<SignerConfig, ConfigError> {
    let contents = read_config_file(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_and_validate_config(&contents, path)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Directories from `start` upward, at most `max_depth` of them.
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

fn try_load_config_from_path(config_path: &Path) -> Option<Result<SignerConfig, ConfigError>> {
    match read_config_file(config_path) {
        Ok(contents) => {
            let result = parse_and_validate_config(&contents, config_path);
            if result.is_ok() {
                log::debug!("Loaded config from {}", config_path.display());
            }
            Some(result)
        }
        Err(e) => {
            // Only log actual errors, not "file not found"
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to read config file {}: {}", config_path.display(), e);
            }
            None
        }
    }
}

/// Search `start` and its ancestors for `.signer.toml`.
///
/// The first file found wins, and a file that exists but is invalid is an
/// error rather than a silent fallback. Returns the defaults when nothing is
/// found.
pub fn load_config_from(start: PathBuf) -> Result<SignerConfig, ConfigError> {
    directory_ancestors(start, MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            Ok(SignerConfig::default())
        })
}

/// Load configuration from the current directory hierarchy.
pub fn load_config() -> Result<SignerConfig, ConfigError> {
    match std::env::current_dir() {
        Ok(dir) => load_config_from(dir),
        Err(e) => {
            log::warn!("Failed to get current directory: {}. Using default config.", e);
            Ok(SignerConfig::default())
        }
    }
}
