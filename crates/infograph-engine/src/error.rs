use infograph_contracts::{CatalogError, CredentialError, ValidationError};
use thiserror::Error;

pub const ACCESS_DENIED_MESSAGE: &str = "Access Denied: Please ensure you select an API key from a project with the Gemini 3 Pro Image API enabled and active billing (https://ai.google.dev/gemini-api/docs/billing).";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("unknown style '{0}'")]
    UnknownStyle(String),

    #[error("{}", ACCESS_DENIED_MESSAGE)]
    AccessDenied { reauth_prompted: bool },

    #[error("No image data found in response.")]
    NoImageInResponse,

    #[error("{message}")]
    Transport { message: String },

    #[error("a generation request is already in flight")]
    Busy,
}

impl GenerationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Stable short name used in event logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "validation",
            GenerationError::Credential(_) => "missing_credential",
            GenerationError::UnknownStyle(_) => "unknown_style",
            GenerationError::AccessDenied { .. } => "access_denied",
            GenerationError::NoImageInResponse => "no_image_in_response",
            GenerationError::Transport { .. } => "transport",
            GenerationError::Busy => "busy",
        }
    }

    /// Expected user-input states, as opposed to failures of the request.
    pub fn is_user_input(&self) -> bool {
        matches!(self, GenerationError::Validation(_))
    }
}

impl From<CatalogError> for GenerationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownStyle(id) => GenerationError::UnknownStyle(id),
            other => GenerationError::transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use infograph_contracts::{CatalogError, CredentialError, ValidationError};

    use super::GenerationError;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            GenerationError::from(ValidationError::MissingImage).to_string(),
            "Please provide the base sketch (Image)."
        );
        assert!(GenerationError::from(CredentialError::MissingCredential)
            .to_string()
            .starts_with("API Key not found."));
        assert!(GenerationError::AccessDenied {
            reauth_prompted: true
        }
        .to_string()
        .starts_with("Access Denied:"));
        assert_eq!(
            GenerationError::transport("connection reset").to_string(),
            "connection reset"
        );
    }

    #[test]
    fn kinds_and_catalog_conversion() {
        assert!(GenerationError::from(ValidationError::MissingConcept).is_user_input());
        assert!(!GenerationError::NoImageInResponse.is_user_input());
        assert_eq!(GenerationError::Busy.kind(), "busy");

        let unknown = GenerationError::from(CatalogError::UnknownStyle("x".to_string()));
        assert!(matches!(unknown, GenerationError::UnknownStyle(ref id) if id == "x"));
        assert_eq!(
            GenerationError::from(CatalogError::Empty).kind(),
            "transport"
        );
    }
}
