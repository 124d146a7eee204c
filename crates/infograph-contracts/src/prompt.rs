//! Prompt composition.
//!
//! Section order matters to the downstream model: language requirements
//! first, then the content, the brand mark, user refinements, the style and
//! finally the verification directive. The prompt text is always sent ahead
//! of the attachments.

use crate::request::{GenerationRequest, InlineImage, InputContent, Language};
use crate::styles::StyleRecord;

pub const REFINEMENT_HEADER: &str = "ADDITIONAL REFINEMENT INSTRUCTIONS FROM USER:";
pub const REFINEMENT_FOOTER: &str = "Strictly follow these specific guidelines during generation.";
pub const STYLE_HEADER: &str = "DESIGN STYLE INSTRUCTIONS:";
pub const VIETNAMESE_DIACRITICS_DIRECTIVE: &str = "Ensure all Vietnamese characters and diacritics (like ă, â, đ, ê, ô, ơ, ư and tone marks) are rendered accurately, clearly, and with correct typography.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentRole {
    Primary,
    Logo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub role: AttachmentRole,
    pub data: String,
    pub mime_type: String,
}

impl Attachment {
    fn from_inline(role: AttachmentRole, image: &InlineImage) -> Self {
        Self {
            role,
            data: image.data.clone(),
            mime_type: image.mime_type_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

pub fn compose_prompt(request: &GenerationRequest, style: &StyleRecord) -> ComposedPrompt {
    let mut text = header(request.language);
    let mut attachments = Vec::new();

    match &request.content {
        InputContent::Text { concept } => push_text_concept(&mut text, concept),
        InputContent::Csv { data } => push_csv_data(&mut text, data),
        InputContent::Image { primary } => {
            attachments.push(Attachment::from_inline(AttachmentRole::Primary, primary));
            push_image_foundation(&mut text);
        }
        InputContent::Whitepaper {
            concept,
            data,
            conclusion,
        } => push_whitepaper_layers(&mut text, concept, data, conclusion),
    }

    if let Some(logo) = request.logo.as_ref() {
        attachments.push(Attachment::from_inline(AttachmentRole::Logo, logo));
        text.push_str("\nI have also provided a brand logo image. Please professionally integrate this logo into the infographic, placing it in a logical branding position (like a corner) where it is visible but does not obscure the main content. ");
    }

    if let Some(refinement) = request.refinement() {
        text.push_str(&format!(
            "\n\n{REFINEMENT_HEADER}\n{refinement}\n{REFINEMENT_FOOTER}"
        ));
    }

    text.push_str(&format!("\n\n{STYLE_HEADER}\n{}", style.prompt_modifier));
    text.push_str(&format!(
        "\n\nIf the topic involves geography, cities, or specific buildings, use Google Search to verify accurate map layouts and architectural details. The final output must be a single cohesive image that strictly adheres to the described aesthetic and maintains perfect legibility for all text elements in {}.",
        request.language.as_str()
    ));

    ComposedPrompt { text, attachments }
}

fn header(language: Language) -> String {
    let mut text = format!(
        "Perform thorough research to generate a high-quality, factually accurate, and detailed infographic image.\nCRITICAL INSTRUCTION: All text within the infographic MUST be in {}. ",
        language.as_str()
    );
    if language == Language::Vietnamese {
        text.push_str(VIETNAMESE_DIACRITICS_DIRECTIVE);
        text.push(' ');
    }
    text
}

fn push_text_concept(text: &mut String, concept: &str) {
    text.push_str(&format!(
        "\nThe core concept/idea to research and visualize is: \"{concept}\". "
    ));
}

fn push_csv_data(text: &mut String, data: &str) {
    text.push_str(&format!(
        "\nThe data to visualize (provided in CSV format) is: \n{data}\n. "
    ));
}

fn push_image_foundation(text: &mut String) {
    text.push_str("\nUse the provided primary image as the background and visual foundation. ");
}

fn push_whitepaper_layers(text: &mut String, concept: &str, data: &str, conclusion: &str) {
    text.push_str(&format!(
        "\nGenerate a complex, multi-layered visual summary (Whitepaper Style). Structure the image with the following distinct visual layers:

1. **LAYER 1: FOUNDATION (Background/Context)**:
   Visualize the core concept: \"{concept}\".
   Make this the setting or the foundational structure of the image.

2. **LAYER 2: EVIDENCE (Middle Ground/Detail)**:
   Visualize the supporting data and mechanism: \"{data}\".
   Integrate charts, floating metrics, or mechanical details that prove the concept.

3. **LAYER 3: CONCLUSION (Foreground/Action)**:
   Visualize the key takeaway or call to action: \"{conclusion}\".
   This should be the most prominent, high-contrast element (e.g., a stamp, a glowing artifact, or a bold header).

Blend these three layers into a single cohesive, high-density infographic."
    ));
}
