//! Environment-driven settings for the studio.
//!
//! `.env` loading happens in the binary; this module only reads variables.

use std::env;
use std::path::PathBuf;

use crate::gemini::DEFAULT_API_BASE;

pub const API_BASE_ENV: &str = "GEMINI_API_BASE";
pub const STYLES_ENV: &str = "INFOGRAPH_STYLES";
pub const SESSION_ENV: &str = "INFOGRAPH_SESSION";
pub const DEFAULT_SESSION_PATH: &str = ".infograph/session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    pub api_base: String,
    pub styles_path: Option<PathBuf>,
    pub session_path: PathBuf,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            styles_path: None,
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
        }
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            api_base: non_empty(API_BASE_ENV)
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            styles_path: non_empty(STYLES_ENV).map(PathBuf::from),
            session_path: non_empty(SESSION_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.session_path),
        }
    }
}
