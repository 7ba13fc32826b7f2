//! Prompt templates for the transcription and structuring calls.

use certidao_core::Field;

pub const VISION_PROMPT: &str = "\
Extract all text from this Brazilian property registry document (certidão de imóvel). \
Read all visible text carefully, including registry numbers, names, addresses, CPF, dates, \
and property details.";

/// Build the prompt asking the text model to restructure a transcription
/// into the fixed field set as a single JSON object.
pub fn structuring_prompt(text: &str) -> String {
    let fields: String = Field::ALL
        .iter()
        .map(|f| format!("- {} ({})\n", f.json_key(), f.description()))
        .collect();

    format!(
        "Extract the following property registry details from the Brazilian certidão de imóvel \
         text and return them as a structured JSON object.\n\
         \n\
         Fields to extract:\n\
         {fields}\
         \n\
         Input text:\n\
         {text}\n\
         \n\
         Return ONLY a valid JSON object, no extra text or explanations. Use null for missing fields.\n"
    )
}
