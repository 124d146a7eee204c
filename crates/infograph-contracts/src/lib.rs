//! Data contracts for the infographic studio.
//!
//! Nothing in this crate touches the network: the engine crate owns the
//! outbound call, this crate owns everything that has to be decided before it.

pub mod credentials;
pub mod events;
pub mod prompt;
pub mod request;
pub mod session;
pub mod styles;

pub use credentials::{resolve_api_key, CredentialError, KeySource, KeySources, ResolvedKey};
pub use events::{EventPayload, EventWriter};
pub use prompt::{compose_prompt, Attachment, AttachmentRole, ComposedPrompt};
pub use request::{
    GenerationRequest, InlineImage, InputContent, InputType, Language, Submission,
    ValidationError,
};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use styles::{CatalogError, StyleCatalog, StyleRecord};
