//! Grounding prompt for document-based question answering.
//!
//! The whole document travels with every question: there is no chunking or
//! retrieval, and prior turns are never replayed. The request text is always
//!
//! ```text
//! <instruction>
//!
//! --- DOCUMENT CONTENT START ---
//!
//! <document text>
//!
//! --- DOCUMENT CONTENT END ---
//!
//! User's Question: <prompt>
//! ```

/// Default grounding instruction placed before the document.
///
/// Overridden by [`crate::config::ChatConfig::grounding_instruction`].
pub const GROUNDING_INSTRUCTION: &str = "You are an expert assistant. Your task is to answer the user's question based *only* on the content of the document provided below. Do not use any external knowledge or information. If the answer cannot be found within the document, you must state that the information is not available in the provided text.";

/// Opening delimiter around the document text.
pub const DOCUMENT_START: &str = "--- DOCUMENT CONTENT START ---";

/// Closing delimiter around the document text.
pub const DOCUMENT_END: &str = "--- DOCUMENT CONTENT END ---";

/// Label introducing the user's question.
pub const QUESTION_LABEL: &str = "User's Question:";

/// Assemble the text part of a model request.
pub fn grounded_prompt(instruction: &str, document: &str, question: &str) -> String {
    format!(
        "{instruction}\n\n{DOCUMENT_START}\n\n{document}\n\n{DOCUMENT_END}\n\n{QUESTION_LABEL} {question}"
    )
}
