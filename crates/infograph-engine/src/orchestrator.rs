use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use infograph_contracts::{ComposedPrompt, InputType};

use crate::error::GenerationError;
use crate::gemini::{
    build_payload, error_chain_text, first_inline_image, to_data_uri, DownstreamStatusError,
    GenerationTransport, IMAGE_MODEL, RESULT_MIME_TYPE,
};

const AUTH_FAILURE_MARKERS: [&str; 4] = [
    "PERMISSION_DENIED",
    "403",
    "Requested entity was not found",
    "404",
];

/// The interactive surface able to solicit a new API key from the user.
pub trait CredentialSelector: Send + Sync {
    fn has_selected_credential(&self) -> anyhow::Result<bool>;
    fn select_credential(&self) -> anyhow::Result<()>;
}

/// A generated image as a self-contained `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub data_uri: String,
}

impl GeneratedImage {
    pub fn mime_type(&self) -> &'static str {
        RESULT_MIME_TYPE
    }

    pub fn base64_payload(&self) -> &str {
        self.data_uri
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    pub fn decode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(BASE64.decode(self.base64_payload().as_bytes())?)
    }
}

/// Issues exactly one generation call per request. Holds no per-request state.
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn GenerationTransport>,
    model: String,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn GenerationTransport>) -> Self {
        Self {
            transport,
            model: IMAGE_MODEL.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate(
        &self,
        prompt: &ComposedPrompt,
        input_type: InputType,
        api_key: &str,
        reauth: Option<&dyn CredentialSelector>,
    ) -> Result<GeneratedImage, GenerationError> {
        let payload = build_payload(prompt, input_type);
        let response = match self.transport.generate_content(&self.model, api_key, &payload) {
            Ok(response) => response,
            Err(err) => return Err(self.classify_failure(&err, reauth)),
        };

        match first_inline_image(&response) {
            Some(data) => Ok(GeneratedImage {
                data_uri: to_data_uri(data),
            }),
            None => {
                tracing::warn!(model = %self.model, "response carried no inline image data");
                Err(GenerationError::NoImageInResponse)
            }
        }
    }

    fn classify_failure(
        &self,
        err: &anyhow::Error,
        reauth: Option<&dyn CredentialSelector>,
    ) -> GenerationError {
        let message = error_chain_text(err, 2000);
        tracing::error!(model = %self.model, error = %message, "generation call failed");
        // A downstream status answer is judged on its status and body alone.
        let classified = match err.downcast_ref::<DownstreamStatusError>() {
            Some(status) => status.to_string(),
            None => message.clone(),
        };
        if !is_auth_failure(&classified) {
            return GenerationError::transport(message);
        }

        let reauth_prompted = match reauth {
            Some(selector) => {
                if let Err(select_err) = selector.select_credential() {
                    tracing::warn!(error = %select_err, "credential re-selection failed");
                }
                true
            }
            None => false,
        };
        GenerationError::AccessDenied { reauth_prompted }
    }
}

pub fn is_auth_failure(message: &str) -> bool {
    AUTH_FAILURE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use serde_json::{json, Value};

    use super::CredentialSelector;
    use crate::gemini::GenerationTransport;

    pub(crate) enum StubReply {
        Image(String),
        TextOnly,
        Fail(String),
    }

    pub(crate) struct StubTransport {
        reply: StubReply,
        pub(crate) calls: AtomicUsize,
        pub(crate) last_payload: Mutex<Option<Value>>,
        pub(crate) last_key: Mutex<Option<String>>,
    }

    impl StubTransport {
        pub(crate) fn new(reply: StubReply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                last_payload: Mutex::new(None),
                last_key: Mutex::new(None),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl GenerationTransport for StubTransport {
        fn generate_content(&self, _model: &str, api_key: &str, payload: &Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(payload.clone());
            *self.last_key.lock().unwrap() = Some(api_key.to_string());
            match &self.reply {
                StubReply::Image(data) => Ok(json!({
                    "candidates": [{
                        "content": {
                            "parts": [
                                { "text": "Rendered." },
                                { "inlineData": { "mimeType": "image/png", "data": data } }
                            ]
                        }
                    }]
                })),
                StubReply::TextOnly => Ok(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that." }] } }]
                })),
                StubReply::Fail(message) => Err(anyhow!(message.clone())),
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingSelector {
        pub(crate) selected: Mutex<bool>,
        pub(crate) prompts: AtomicUsize,
    }

    impl CountingSelector {
        pub(crate) fn already_selected() -> Self {
            Self {
                selected: Mutex::new(true),
                prompts: AtomicUsize::new(0),
            }
        }

        pub(crate) fn prompt_count(&self) -> usize {
            self.prompts.load(Ordering::SeqCst)
        }
    }

    impl CredentialSelector for CountingSelector {
        fn has_selected_credential(&self) -> Result<bool> {
            Ok(*self.selected.lock().unwrap())
        }

        fn select_credential(&self) -> Result<()> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            *self.selected.lock().unwrap() = true;
            Ok(())
        }
    }
}
