//! End-to-end submission pipeline.
//!
//! validation -> style lookup -> credential selection -> key resolution ->
//! prompt composition -> one generation call. The in-flight gate is held for
//! the whole pipeline and released on every exit path.

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use infograph_contracts::events::{
    GENERATION_FAILED, GENERATION_STARTED, GENERATION_SUCCEEDED, REAUTH_REQUESTED,
};
use infograph_contracts::{
    compose_prompt, resolve_api_key, ComposedPrompt, EventPayload, EventWriter,
    GenerationRequest, KeySources, SessionStore, StyleCatalog, Submission,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::GenerationError;
use crate::gate::InFlightGate;
use crate::gemini::aspect_ratio_for;
use crate::orchestrator::{CredentialSelector, GeneratedImage, Orchestrator};

pub struct Studio {
    catalog: StyleCatalog,
    orchestrator: Orchestrator,
    sessions: Arc<dyn SessionStore>,
    key_sources: KeySources,
    selector: Option<Arc<dyn CredentialSelector>>,
    events: Option<EventWriter>,
    gate: InFlightGate,
}

impl Studio {
    pub fn new(
        catalog: StyleCatalog,
        orchestrator: Orchestrator,
        sessions: Arc<dyn SessionStore>,
        key_sources: KeySources,
    ) -> Self {
        Self {
            catalog,
            orchestrator,
            sessions,
            key_sources,
            selector: None,
            events: None,
            gate: InFlightGate::new(),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn CredentialSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    pub fn gate(&self) -> &InFlightGate {
        &self.gate
    }

    /// Validation and composition only; no credential or network activity.
    pub fn preview(
        &self,
        submission: Submission,
    ) -> Result<(GenerationRequest, ComposedPrompt), GenerationError> {
        let request = submission.validate()?;
        let style = self.catalog.get(&request.style_id)?;
        let composed = compose_prompt(&request, style);
        Ok((request, composed))
    }

    pub fn submit(&self, submission: Submission) -> Result<GeneratedImage, GenerationError> {
        let _guard = self.gate.try_acquire()?;
        let request_id = uuid::Uuid::new_v4().to_string();

        let (request, composed) = self.preview(submission)?;
        self.ensure_credential();

        let result = self.generate(&request_id, &request, &composed);
        match &result {
            Ok(image) => self.emit(GENERATION_SUCCEEDED, success_payload(&request_id, image)),
            Err(err) => {
                if let GenerationError::AccessDenied {
                    reauth_prompted: true,
                } = err
                {
                    self.emit(REAUTH_REQUESTED, payload(json!({ "request_id": request_id })));
                }
                self.emit(
                    GENERATION_FAILED,
                    payload(json!({
                        "request_id": request_id,
                        "error_kind": err.kind(),
                        "message": err.to_string(),
                    })),
                );
            }
        }
        result
    }

    fn generate(
        &self,
        request_id: &str,
        request: &GenerationRequest,
        composed: &ComposedPrompt,
    ) -> Result<GeneratedImage, GenerationError> {
        let selected = self.selected_key();
        let key = resolve_api_key(&self.key_sources.clone().with_selected(selected.as_deref()))?;

        let input_type = request.input_type();
        tracing::info!(
            request_id,
            input_type = input_type.as_str(),
            style_id = %request.style_id,
            language = request.language.as_str(),
            key_source = key.source.as_str(),
            attachments = composed.attachments.len(),
            "starting generation"
        );
        self.emit(
            GENERATION_STARTED,
            payload(json!({
                "request_id": request_id,
                "input_type": input_type.as_str(),
                "style_id": request.style_id,
                "language": request.language.as_str(),
                "aspect_ratio": aspect_ratio_for(input_type),
                "model": self.orchestrator.model(),
                "prompt_sha256": prompt_digest(&composed.text),
                "attachments": composed.attachments.len(),
            })),
        );

        self.orchestrator.generate(
            composed,
            input_type,
            &key.value,
            self.selector.as_deref(),
        )
    }

    fn ensure_credential(&self) {
        let Some(selector) = self.selector.as_deref() else {
            return;
        };
        match selector.has_selected_credential() {
            Ok(true) => {}
            Ok(false) => {
                if let Err(err) = selector.select_credential() {
                    tracing::warn!(error = %err, "credential selection skipped");
                }
            }
            Err(err) => tracing::warn!(error = %err, "credential selection state unavailable"),
        }
    }

    fn selected_key(&self) -> Option<String> {
        match self.sessions.load() {
            Ok(session) => session.and_then(|session| session.selected_api_key),
            Err(err) => {
                tracing::warn!(error = %err, "session unavailable; using environment keys");
                None
            }
        }
    }

    fn emit(&self, event_type: &str, payload: EventPayload) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event_type, payload) {
            tracing::warn!(event_type, error = %err, "failed to append event");
        }
    }
}

fn success_payload(request_id: &str, image: &GeneratedImage) -> EventPayload {
    let bytes = BASE64.decode(image.base64_payload().as_bytes()).ok();
    let dims = bytes.as_deref().and_then(image_dimensions);
    payload(json!({
        "request_id": request_id,
        "mime_type": image.mime_type(),
        "bytes": bytes.as_ref().map(Vec::len),
        "width": dims.map(|(width, _)| width),
        "height": dims.map(|(_, height)| height),
    }))
}

fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn prompt_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn payload(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}
