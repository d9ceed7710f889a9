//! Prompts sent to the transcription model.
//!
//! Every prompt lives here so wording changes touch exactly one file and
//! tests can inspect the text without a live service. Callers override the
//! system prompt through [`crate::config::TranscriptionConfig::system_prompt`];
//! the per-page instruction is always built by [`page_prompt`].
//!
//! Prompts are written in English for model performance but tell the model
//! to keep the document's own language and orthography.

/// Default system prompt: fidelity rules for handwritten archival pages.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert paleographer and archivist specialising in handwritten historical documents from municipal and notarial archives.

Strict transcription rules:
1. Transcribe ALL visible text with maximum fidelity, preserving the original language and orthography, including archaic spellings, abbreviations, and grammatical errors.
2. Preserve the document structure: titles, numbered clauses, paragraphs, marginal notes, signatures, and stamps.
3. Mark fully illegible words as [illegible].
4. Mark partially legible words as [illegible: <best_guess>] when a guess is possible.
5. Do NOT correct, modernise, or paraphrase any text.
6. Do NOT add interpretations, summaries, or commentary inside the transcription.
7. Respond ONLY with the transcription text, with no preamble or closing remarks."#;

/// Build the per-page user instruction sent alongside the page image.
pub fn page_prompt(page_number: usize, total_pages: usize, document_title: &str) -> String {
    format!(
        "[Page {page_number} of {total_pages}]\n\
         Source document: {document_title}\n\
         \n\
         Transcribe the handwritten text from this scanned page with maximum fidelity.\n\
         Preserve the original language and all document structure as described in your instructions."
    )
}
