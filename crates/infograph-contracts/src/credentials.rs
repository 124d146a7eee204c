//! API key resolution.
//!
//! Two candidates exist: one injected by the deployment at runtime and one
//! captured when the binary was built. The runtime candidate wins unless it is
//! blank or still carries the placeholder written by deployment templates.

use std::env;
use std::fmt;

use thiserror::Error;

pub const PLACEHOLDER_SENTINEL: &str = "KEY_HOLDER";
pub const REMOTE_KEY_ENV: &str = "INFOGRAPH_API_KEY";

const LOCAL_BUILD_KEY: Option<&str> = option_env!("INFOGRAPH_LOCAL_API_KEY");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("API Key not found. Please check .env file (Local) or deployment variables.")]
    MissingCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Remote,
    Local,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Remote => "remote",
            KeySource::Local => "local",
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct KeySources {
    pub remote: Option<String>,
    pub local: Option<String>,
}

impl fmt::Debug for KeySources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySources")
            .field("remote", &self.remote.as_ref().map(|_| "<redacted>"))
            .field("local", &self.local.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl KeySources {
    pub fn new(remote: Option<String>, local: Option<String>) -> Self {
        Self { remote, local }
    }

    /// Runtime variable as the remote candidate, build-time value as the local one.
    pub fn from_environment() -> Self {
        Self {
            remote: env::var(REMOTE_KEY_ENV).ok(),
            local: LOCAL_BUILD_KEY.map(str::to_string),
        }
    }

    /// Whether resolution would succeed. Silent, unlike [`resolve_api_key`].
    pub fn has_usable_key(&self) -> bool {
        self.pick().is_some()
    }

    fn pick(&self) -> Option<(&str, KeySource)> {
        if let Some(remote) = self.remote.as_deref().and_then(usable_remote) {
            return Some((remote, KeySource::Remote));
        }
        self.local
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|local| (local, KeySource::Local))
    }

    /// Put an interactively selected key ahead of whatever the environment supplied.
    pub fn with_selected(mut self, selected: Option<&str>) -> Self {
        if let Some(selected) = selected.and_then(usable_remote) {
            self.remote = Some(selected.to_string());
        }
        self
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub value: String,
    pub source: KeySource,
}

impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

pub fn resolve_api_key(sources: &KeySources) -> Result<ResolvedKey, CredentialError> {
    match sources.pick() {
        Some((value, source)) => {
            match source {
                KeySource::Remote => tracing::info!(source = "remote", "using deployment API key"),
                KeySource::Local => tracing::info!(source = "local", "using build-time API key"),
            }
            Ok(ResolvedKey {
                value: value.to_string(),
                source,
            })
        }
        None => {
            tracing::error!("API key missing from both deployment and build-time sources");
            Err(CredentialError::MissingCredential)
        }
    }
}

fn usable_remote(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == PLACEHOLDER_SENTINEL {
        return None;
    }
    Some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::{resolve_api_key, CredentialError, KeySource, KeySources, PLACEHOLDER_SENTINEL};

    fn sources(remote: Option<&str>, local: Option<&str>) -> KeySources {
        KeySources::new(remote.map(str::to_string), local.map(str::to_string))
    }

    #[test]
    fn unusable_remote_candidates_fall_back_to_local() {
        for remote in [Some(""), Some("   "), Some(PLACEHOLDER_SENTINEL), None] {
            let resolved = resolve_api_key(&sources(remote, Some("local-key"))).unwrap();
            assert_eq!(resolved.value, "local-key", "remote candidate {remote:?}");
            assert_eq!(resolved.source, KeySource::Local);
        }
    }

    #[test]
    fn usable_remote_wins_regardless_of_local() {
        for local in [Some("local-key"), Some(""), None] {
            let resolved = resolve_api_key(&sources(Some("abc"), local)).unwrap();
            assert_eq!(resolved.value, "abc");
            assert_eq!(resolved.source, KeySource::Remote);
        }
    }

    #[test]
    fn both_absent_is_missing_credential() {
        for (remote, local) in [
            (Some(""), Some("")),
            (None, None),
            (Some(PLACEHOLDER_SENTINEL), Some("  ")),
        ] {
            assert_eq!(
                resolve_api_key(&sources(remote, local)).err(),
                Some(CredentialError::MissingCredential)
            );
        }
    }

    #[test]
    fn has_usable_key_agrees_with_resolution() {
        for (remote, local) in [
            (Some("abc"), None),
            (Some(PLACEHOLDER_SENTINEL), Some("local-key")),
            (Some("  "), Some(" ")),
            (None, None),
        ] {
            let candidates = sources(remote, local);
            assert_eq!(
                candidates.has_usable_key(),
                resolve_api_key(&candidates).is_ok(),
                "{remote:?} / {local:?}"
            );
        }
        assert!(!sources(Some(PLACEHOLDER_SENTINEL), None).has_usable_key());
    }

    #[test]
    fn selected_key_overrides_environment_remote() {
        let resolved = resolve_api_key(
            &sources(Some("env-key"), Some("local-key")).with_selected(Some("picked")),
        )
        .unwrap();
        assert_eq!(resolved.value, "picked");

        let unchanged = sources(Some("env-key"), None).with_selected(Some(" "));
        assert_eq!(unchanged.remote.as_deref(), Some("env-key"));
    }

    #[test]
    fn debug_output_never_contains_key_material() {
        let rendered = format!("{:?}", sources(Some("secret-remote"), Some("secret-local")));
        assert!(!rendered.contains("secret"));
        let resolved = resolve_api_key(&sources(Some("secret-remote"), None)).unwrap();
        assert!(!format!("{resolved:?}").contains("secret"));
    }
}
