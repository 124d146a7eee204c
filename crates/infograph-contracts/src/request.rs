use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ATTACHMENT_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InputType {
    Text,
    Csv,
    Image,
    Whitepaper,
}

impl InputType {
    pub const ALL: [InputType; 4] = [
        InputType::Text,
        InputType::Csv,
        InputType::Image,
        InputType::Whitepaper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "TEXT",
            InputType::Csv => "CSV",
            InputType::Image => "IMAGE",
            InputType::Whitepaper => "WHITEPAPER",
        }
    }
}

/// Output language for every piece of text rendered inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Vietnamese,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Vietnamese => "Vietnamese",
        }
    }
}

/// Base64 image payload as captured from the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub data: String,
    pub mime_type: Option<String>,
}

impl InlineImage {
    pub fn new(data: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            mime_type,
        }
    }

    pub fn mime_type_or_default(&self) -> &str {
        self.mime_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ATTACHMENT_MIME)
    }
}

/// The one active input shape of a request. The discriminant is the input type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputContent {
    Text {
        concept: String,
    },
    Csv {
        data: String,
    },
    Image {
        primary: InlineImage,
    },
    Whitepaper {
        concept: String,
        data: String,
        conclusion: String,
    },
}

impl InputContent {
    pub fn input_type(&self) -> InputType {
        match self {
            InputContent::Text { .. } => InputType::Text,
            InputContent::Csv { .. } => InputType::Csv,
            InputContent::Image { .. } => InputType::Image,
            InputContent::Whitepaper { .. } => InputType::Whitepaper,
        }
    }
}

/// A validated request, built fresh per submission and consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub content: InputContent,
    pub logo: Option<InlineImage>,
    pub style_id: String,
    pub language: Language,
    pub additional_instructions: Option<String>,
}

impl GenerationRequest {
    pub fn input_type(&self) -> InputType {
        self.content.input_type()
    }

    /// Trimmed refinement text, `None` when blank.
    pub fn refinement(&self) -> Option<&str> {
        self.additional_instructions
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please describe the concept for the artisan.")]
    MissingConcept,
    #[error("Please provide the data ledger (CSV).")]
    MissingCsv,
    #[error("Please provide the base sketch (Image).")]
    MissingImage,
    #[error("Please provide the Core Concept (Layer I).")]
    MissingLayerConcept,
    #[error("Please provide supporting Data (Layer II).")]
    MissingLayerData,
    #[error("Please provide the Conclusion (Layer III).")]
    MissingLayerConclusion,
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingConcept => "text_content",
            ValidationError::MissingCsv => "text_content",
            ValidationError::MissingImage => "file_data",
            ValidationError::MissingLayerConcept => "layer_concept",
            ValidationError::MissingLayerData => "layer_data",
            ValidationError::MissingLayerConclusion => "layer_conclusion",
        }
    }
}

/// Loose form state as gathered by input capture.
///
/// Every field is optional because a form keeps values for all input modes
/// at once; [`Submission::validate`] keeps only the fields of the active mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub input_type: InputType,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub layer_concept: Option<String>,
    #[serde(default)]
    pub layer_data: Option<String>,
    #[serde(default)]
    pub layer_conclusion: Option<String>,
    #[serde(default)]
    pub file_data: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub logo_data: Option<String>,
    #[serde(default)]
    pub logo_mime_type: Option<String>,
    pub style_id: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub additional_instructions: Option<String>,
}

impl Submission {
    pub fn new(input_type: InputType, style_id: impl Into<String>) -> Self {
        Self {
            input_type,
            text_content: None,
            layer_concept: None,
            layer_data: None,
            layer_conclusion: None,
            file_data: None,
            mime_type: None,
            logo_data: None,
            logo_mime_type: None,
            style_id: style_id.into(),
            language: Language::default(),
            additional_instructions: None,
        }
    }

    /// Reject incomplete input before any credential or network work happens.
    pub fn validate(self) -> Result<GenerationRequest, ValidationError> {
        let content = match self.input_type {
            InputType::Text => InputContent::Text {
                concept: non_blank(self.text_content).ok_or(ValidationError::MissingConcept)?,
            },
            InputType::Csv => InputContent::Csv {
                data: non_blank(self.text_content).ok_or(ValidationError::MissingCsv)?,
            },
            InputType::Image => {
                let data = non_blank(self.file_data).ok_or(ValidationError::MissingImage)?;
                InputContent::Image {
                    primary: InlineImage::new(data, self.mime_type),
                }
            }
            InputType::Whitepaper => {
                let concept =
                    non_blank(self.layer_concept).ok_or(ValidationError::MissingLayerConcept)?;
                let data = non_blank(self.layer_data).ok_or(ValidationError::MissingLayerData)?;
                let conclusion = non_blank(self.layer_conclusion)
                    .ok_or(ValidationError::MissingLayerConclusion)?;
                InputContent::Whitepaper {
                    concept,
                    data,
                    conclusion,
                }
            }
        };

        let logo = non_blank(self.logo_data).map(|data| InlineImage::new(data, self.logo_mime_type));

        Ok(GenerationRequest {
            content,
            logo,
            style_id: self.style_id,
            language: self.language,
            additional_instructions: self.additional_instructions,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
