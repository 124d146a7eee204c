//! Generation engine: turns a validated submission into one generated image.

pub mod config;
pub mod error;
pub mod gate;
pub mod gemini;
pub mod orchestrator;
pub mod studio;

pub use config::StudioConfig;
pub use error::GenerationError;
pub use gate::{InFlightGate, InFlightGuard};
pub use gemini::{DownstreamStatusError, GenerationTransport, HttpTransport};
pub use orchestrator::{CredentialSelector, GeneratedImage, Orchestrator};
pub use studio::Studio;
