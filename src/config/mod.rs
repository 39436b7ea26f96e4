//! Configuration for `pgjsonl`.
//!
//! Settings come from, in order of precedence:
//! - Command-line flags
//! - Environment variables (`PGHOST`, `PGPORT`, `PGDATABASE`, `PGUSER`,
//!   `PGPASSWORD`), read by clap alongside the flags
//! - A YAML profile (`--config <path>`, or `./pgjsonl.yaml` when present)
//! - Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pgjsonl_lib::model::{DEFAULT_BATCH_SIZE, DEFAULT_SAMPLE_SIZE};
use pgjsonl_lib::{ConnectionParams, PgJsonlError};

use crate::error::{AppError, Result};

/// Profile file picked up from the working directory.
pub const DEFAULT_PROFILE_FILE: &str = "pgjsonl.yaml";

/// Settings read from a YAML profile. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub schema: Option<String>,
    pub batch_size: Option<usize>,
    pub sample_size: Option<usize>,
}

/// Connection values given on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub schema: Option<String>,
}

/// Load the profile named by `--config`, or the default profile if one
/// exists in the working directory.
///
/// # Errors
///
/// Returns `FileNotFound` if an explicit path does not exist, `Io` if it
/// cannot be read, or `Profile` if it is not valid YAML for a profile.
pub fn load_profile(explicit: Option<&Path>) -> Result<Profile> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(PgJsonlError::FileNotFound(path.to_path_buf()).into());
            }
            path.to_path_buf()
        }
        None => {
            let default = PathBuf::from(DEFAULT_PROFILE_FILE);
            if !default.is_file() {
                return Ok(Profile::default());
            }
            default
        }
    };

    let path = dunce::canonicalize(&path).unwrap_or(path);
    let text = fs::read_to_string(&path)?;
    let profile = parse_profile(&text, &path)?;
    tracing::debug!(path = %path.display(), "Loaded profile");
    Ok(profile)
}

/// Parse profile YAML. An empty document is an empty profile.
///
/// # Errors
///
/// Returns `Profile` if the YAML is malformed or has unknown keys.
pub fn parse_profile(text: &str, path: &Path) -> Result<Profile> {
    if text.trim().is_empty() {
        return Ok(Profile::default());
    }
    serde_yaml::from_str(text).map_err(|source| AppError::Profile {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge flags/environment over the profile over the defaults.
#[must_use]
pub fn resolve_connection(overrides: &ConnectionOverrides, profile: &Profile) -> ConnectionParams {
    let defaults = ConnectionParams::default();
    ConnectionParams {
        host: first_of(overrides.host.as_deref(), profile.host.as_deref()).unwrap_or(defaults.host),
        port: overrides.port.or(profile.port).unwrap_or(defaults.port),
        database: first_of(overrides.database.as_deref(), profile.database.as_deref())
            .unwrap_or(defaults.database),
        user: first_of(overrides.username.as_deref(), profile.username.as_deref())
            .unwrap_or(defaults.user),
        password: first_of(overrides.password.as_deref(), profile.password.as_deref()),
        schema: first_of(overrides.schema.as_deref(), profile.schema.as_deref())
            .unwrap_or(defaults.schema),
    }
}

fn first_of(flag: Option<&str>, file: Option<&str>) -> Option<String> {
    flag.or(file).map(str::to_string)
}

/// Batch and sample sizes: flag, then profile, then default.
#[must_use]
pub fn resolve_sizes(
    batch_size: Option<usize>,
    sample_size: Option<usize>,
    profile: &Profile,
) -> (usize, usize) {
    (
        batch_size
            .or(profile.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE),
        sample_size
            .or(profile.sample_size)
            .unwrap_or(DEFAULT_SAMPLE_SIZE),
    )
}
