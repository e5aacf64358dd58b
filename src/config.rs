// src/config.rs

//! Configuration and credential loading utilities.
//!
//! Settings come from a TOML file (see [`Config`]); secrets come from the
//! environment or the `env.secret` file next to it, so they never end up in
//! the config or the checkpoint file, except for the Instagram session which
//! is cached in the checkpoint.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, Platform};

pub const INSTAGRAM_SESSION_VAR: &str = "INSTAGRAM_SESSIONID";
pub const TWITTER_BEARER_VAR: &str = "TWITTER_BEARER";
pub const RAPIDAPI_KEY_VAR: &str = "RAPIDAPI_KEY";

/// Dotenv-style file read for secrets the environment does not provide.
pub const ENV_FILE: &str = "./env.secret";

/// Platform secrets.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub instagram_session: Option<String>,
    pub twitter_bearer: Option<String>,
    pub rapidapi_key: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment, then from `env_file`.
    ///
    /// Variables set in the environment take precedence. A missing file is
    /// not an error.
    pub fn load(env_file: &Path) -> Result<Self> {
        Self::load_with(env_file, |key| std::env::var(key).ok())
    }

    fn load_with(env_file: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file_vars = read_env_file(env_file)?;
        Ok(Self::from_lookup(|key| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file_vars.get(key).cloned())
        }))
    }

    /// Read credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            instagram_session: get(INSTAGRAM_SESSION_VAR),
            twitter_bearer: get(TWITTER_BEARER_VAR),
            rapidapi_key: get(RAPIDAPI_KEY_VAR),
        }
    }

    /// Secret required by a platform that has no other way to authenticate.
    pub fn require(&self, platform: Platform) -> Result<&str> {
        let (value, var) = match platform {
            Platform::Twitter => (&self.twitter_bearer, TWITTER_BEARER_VAR),
            Platform::Tiktok => (&self.rapidapi_key, RAPIDAPI_KEY_VAR),
            Platform::Instagram => (&self.instagram_session, INSTAGRAM_SESSION_VAR),
        };
        value
            .as_deref()
            .ok_or_else(|| AppError::auth(format!("{} is not set", var)))
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let invalid = |e: dotenvy::Error| AppError::config(format!("{}: {}", path.display(), e));
    match dotenvy::from_filename_iter(path) {
        Ok(iter) => {
            let vars = iter.collect::<std::result::Result<HashMap<_, _>, _>>().map_err(invalid)?;
            log::debug!("Loaded {} variables from {}", vars.len(), path.display());
            Ok(vars)
        }
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(invalid(e)),
    }
}

/// Load configuration, falling back to defaults, and validate it.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    config.validate()?;
    Ok(config)
}
