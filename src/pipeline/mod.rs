//! Service boundaries around the conversation state manager.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ Document          (file selection)
//! encode ──▶ ImageAttachment ─┐
//! Document + prompt ──────────┴──▶ llm   (message submission)
//! ```
//!
//! 1. [`input`]   — load the selected file's bytes and check the PDF signature
//! 2. [`extract`] — pdfium text + page count; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]  — base64-wrap user images for the multimodal request
//! 4. [`llm`]     — grounded model query; the only stage with network I/O

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
