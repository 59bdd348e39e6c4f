//! Conversation state manager.
//!
//! [`ChatSession`] owns the one [`SessionState`] of the process and is the only
//! thing allowed to mutate it. Presentation code reads snapshots and calls two
//! entry points: [`ChatSession::select_file`] and [`ChatSession::send_message`].
//!
//! ## Two axes
//!
//! ```text
//! document:  NoDocument ──select──▶ Processing ──ok──▶ Ready
//!                 ▲                     │
//!                 └──────── err ────────┘ (Failed: error slot set)
//!
//! query (Ready only):  Idle ──send──▶ AwaitingResponse ──settled──▶ Idle
//! ```
//!
//! Each async entry point is a synchronous `begin_*` transition, one
//! suspension point, and a synchronous `finish_*` transition. Whatever
//! `begin_*` did (clearing the conversation, appending the user message) is
//! published before the extractor or the model is awaited.
//!
//! ## Document epochs
//!
//! Every file selection bumps `epoch`. A model reply computed against an older
//! epoch is discarded on arrival, so no message ever refers to a document
//! other than the loaded one.

use crate::error::{ExtractionError, QueryError, Rejected, SessionError};
use crate::pipeline::extract::DocumentExtractor;
use crate::pipeline::llm::{ModelClient, QueryRequest};
use crate::types::{
    Document, DocumentSummary, ExtractedText, ImageAttachment, Message, SelectedFile, Transcript,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Prefix of the model message appended when a query fails.
pub const QUERY_FAILURE_PREFIX: &str = "Sorry, I encountered an error:";

/// Everything the presentation layer can observe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub document: Option<Arc<Document>>,
    /// Append-only while a document stays loaded; cleared on file selection.
    pub messages: Vec<Message>,
    pub is_processing_pdf: bool,
    pub is_model_loading: bool,
    pub pdf_error: Option<ExtractionError>,
    pub model_error: Option<QueryError>,
    /// Incremented on every file selection.
    pub epoch: u64,
}

/// Position on the document axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPhase {
    NoDocument,
    Processing,
    Ready,
    Failed,
}

/// Position on the query axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    AwaitingResponse,
}

impl SessionState {
    pub fn document_phase(&self) -> DocumentPhase {
        if self.is_processing_pdf {
            DocumentPhase::Processing
        } else if self.document.is_some() {
            DocumentPhase::Ready
        } else if self.pdf_error.is_some() {
            DocumentPhase::Failed
        } else {
            DocumentPhase::NoDocument
        }
    }

    pub fn query_phase(&self) -> QueryPhase {
        if self.is_model_loading {
            QueryPhase::AwaitingResponse
        } else {
            QueryPhase::Idle
        }
    }

    /// Whether the upload affordance should be enabled.
    pub fn can_select_file(&self) -> bool {
        !self.is_processing_pdf
    }

    /// Whether the send affordance should be enabled.
    pub fn can_send(&self) -> bool {
        self.document.is_some() && !self.is_model_loading
    }

    pub fn transcript(&self) -> Transcript {
        Transcript {
            document: self.document.as_deref().map(DocumentSummary::from),
            messages: self.messages.clone(),
        }
    }
}

/// An extraction started by [`ChatSession::begin_extraction`].
///
/// The only way to settle the document axis is to hand this back to
/// [`ChatSession::finish_extraction`].
#[derive(Debug)]
#[must_use = "a pending extraction keeps the busy flag set until it is finished"]
pub struct PendingExtraction {
    epoch: u64,
    filename: String,
}

impl PendingExtraction {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// A query accepted by [`ChatSession::begin_query`] and not yet settled.
///
/// Hand it back to [`ChatSession::finish_query`] together with the result.
#[derive(Debug)]
#[must_use = "a pending query keeps the busy flag set until it is finished"]
pub struct PendingQuery {
    epoch: u64,
    document: Arc<Document>,
    prompt: String,
    image: Option<ImageAttachment>,
}

impl PendingQuery {
    /// The request to send to the model client.
    pub fn request(&self) -> QueryRequest<'_> {
        QueryRequest {
            document_text: &self.document.content,
            prompt: &self.prompt,
            image: self.image.as_ref(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// The conversation coordinator.
///
/// Entry points take `&self`; the state lives in a `watch` channel so every
/// transition is published to subscribers as it happens. Share the session
/// behind an `Arc` to drive it from several tasks.
pub struct ChatSession<X, C> {
    extractor: X,
    client: C,
    state: watch::Sender<SessionState>,
}

impl<X, C> ChatSession<X, C>
where
    X: DocumentExtractor,
    C: ModelClient,
{
    pub fn new(extractor: X, client: C) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            extractor,
            client,
            state,
        }
    }

    /// Borrow the current state.
    ///
    /// Do not hold the returned guard across an `.await`: it blocks every
    /// transition until dropped.
    pub fn state(&self) -> watch::Ref<'_, SessionState> {
        self.state.borrow()
    }

    /// Clone the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receive every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn transcript(&self) -> Transcript {
        self.state.borrow().transcript()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    // ── Document axis ────────────────────────────────────────────────────

    /// Load `file` as the active document, discarding the previous document
    /// and the whole conversation.
    pub async fn select_file(&self, file: SelectedFile) -> Result<Arc<Document>, SessionError> {
        let pending = self.begin_extraction(&file.name)?;
        info!("Processing '{}' (epoch {})", file.name, pending.epoch);

        let result = self.extractor.extract(&file).await;
        self.finish_extraction(pending, result)
    }

    /// Enter `Processing`: clear document, messages and the extraction error,
    /// and bump the epoch.
    pub fn begin_extraction(&self, filename: &str) -> Result<PendingExtraction, Rejected> {
        let mut outcome = Err(Rejected::ExtractionInFlight);
        self.state.send_if_modified(|s| {
            if s.is_processing_pdf {
                return false;
            }
            s.is_processing_pdf = true;
            s.pdf_error = None;
            s.document = None;
            s.messages.clear();
            s.epoch += 1;
            outcome = Ok(PendingExtraction {
                epoch: s.epoch,
                filename: filename.to_string(),
            });
            true
        });
        outcome
    }

    /// Leave `Processing` with the extractor's result.
    ///
    /// A result with no pages is a `NoPages` failure whichever extractor
    /// produced it. A token that no longer matches the in-flight extraction
    /// is dropped without touching state.
    pub fn finish_extraction(
        &self,
        pending: PendingExtraction,
        result: Result<ExtractedText, ExtractionError>,
    ) -> Result<Arc<Document>, SessionError> {
        let PendingExtraction { epoch, filename } = pending;
        let outcome = result.and_then(|text| {
            if text.page_count == 0 {
                return Err(ExtractionError::NoPages {
                    name: filename.clone(),
                });
            }
            Ok(Arc::new(Document {
                filename: filename.clone(),
                content: text.content,
                page_count: text.page_count,
            }))
        });

        let applied = self.state.send_if_modified(|s| {
            if !s.is_processing_pdf || s.epoch != epoch {
                return false;
            }
            s.is_processing_pdf = false;
            match &outcome {
                Ok(doc) => s.document = Some(Arc::clone(doc)),
                Err(e) => s.pdf_error = Some(e.clone()),
            }
            true
        });

        if !applied {
            warn!("Discarding extraction of '{}' for epoch {}", filename, epoch);
            return Err(SessionError::Superseded);
        }
        match &outcome {
            Ok(doc) => info!("Document ready: '{}' ({} pages)", doc.filename, doc.page_count),
            Err(e) => warn!("Extraction of '{}' failed: {}", filename, e),
        }
        Ok(outcome?)
    }

    // ── Query axis ───────────────────────────────────────────────────────

    /// Ask the model about the loaded document.
    ///
    /// The user message is appended before the model is called. On failure
    /// the error is stored, a model message wrapping it is appended, and the
    /// error is also returned.
    pub async fn send_message(
        &self,
        prompt: &str,
        image: Option<ImageAttachment>,
    ) -> Result<Message, SessionError> {
        let pending = self.begin_query(prompt, image)?;
        let result = self.client.generate(pending.request()).await;
        self.finish_query(pending, result)
    }

    /// Enter `AwaitingResponse`: append the user message and set the busy flag.
    pub fn begin_query(
        &self,
        prompt: &str,
        image: Option<ImageAttachment>,
    ) -> Result<PendingQuery, Rejected> {
        if prompt.trim().is_empty() {
            return Err(Rejected::EmptyPrompt);
        }

        let mut outcome = Err(Rejected::NoDocument);
        self.state.send_if_modified(|s| {
            let Some(document) = s.document.as_ref().map(Arc::clone) else {
                return false;
            };
            if s.is_model_loading {
                outcome = Err(Rejected::QueryInFlight);
                return false;
            }
            s.messages.push(Message::user(prompt, image.clone()));
            s.is_model_loading = true;
            s.model_error = None;
            outcome = Ok(PendingQuery {
                epoch: s.epoch,
                document,
                prompt: prompt.to_string(),
                image,
            });
            true
        });

        if let Ok(ref pending) = outcome {
            debug!(
                "Query accepted (epoch {}, {} prompt chars, image={})",
                pending.epoch,
                pending.prompt.len(),
                pending.image.is_some()
            );
        }
        outcome
    }

    /// Leave `AwaitingResponse` with the model client's result.
    pub fn finish_query(
        &self,
        pending: PendingQuery,
        result: Result<String, QueryError>,
    ) -> Result<Message, SessionError> {
        let mut outcome = Err(SessionError::Superseded);
        self.state.send_modify(|s| {
            s.is_model_loading = false;
            if s.epoch != pending.epoch {
                return;
            }
            outcome = match result {
                Ok(text) => {
                    let message = Message::model(text);
                    s.messages.push(message.clone());
                    Ok(message)
                }
                Err(e) => {
                    s.messages
                        .push(Message::model(format!("{QUERY_FAILURE_PREFIX} {e}")));
                    s.model_error = Some(e.clone());
                    Err(SessionError::Query(e))
                }
            };
        });

        if matches!(outcome, Err(SessionError::Superseded)) {
            warn!(
                "Discarding reply for epoch {}: document changed",
                pending.epoch
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticExtractor;

    impl DocumentExtractor for StaticExtractor {
        async fn extract(&self, _file: &SelectedFile) -> Result<ExtractedText, ExtractionError> {
            Ok(ExtractedText {
                content: "Hello\n\n".into(),
                page_count: 1,
            })
        }
    }

    struct EchoClient;

    impl ModelClient for EchoClient {
        async fn generate(&self, request: QueryRequest<'_>) -> Result<String, QueryError> {
            Ok(format!("echo: {}", request.prompt))
        }
    }

    fn session() -> ChatSession<StaticExtractor, EchoClient> {
        ChatSession::new(StaticExtractor, EchoClient)
    }

    fn loaded() -> ChatSession<StaticExtractor, EchoClient> {
        let s = session();
        let pending = s.begin_extraction("a.pdf").unwrap();
        s.finish_extraction(
            pending,
            Ok(ExtractedText {
                content: "Hello\n\n".into(),
                page_count: 1,
            }),
        )
        .unwrap();
        s
    }

    #[test]
    fn phases_follow_flags() {
        let mut st = SessionState::default();
        assert_eq!(st.document_phase(), DocumentPhase::NoDocument);
        st.is_processing_pdf = true;
        assert_eq!(st.document_phase(), DocumentPhase::Processing);
        st.is_processing_pdf = false;
        st.pdf_error = Some(ExtractionError::Internal("x".into()));
        assert_eq!(st.document_phase(), DocumentPhase::Failed);
        assert_eq!(st.query_phase(), QueryPhase::Idle);
        assert!(!st.can_send());
    }

    #[test]
    fn second_extraction_is_rejected_while_first_runs() {
        let s = session();
        let first = s.begin_extraction("a.pdf").unwrap();
        assert_eq!(first.epoch(), 1);
        assert_eq!(
            s.begin_extraction("b.pdf").unwrap_err(),
            Rejected::ExtractionInFlight
        );
        assert!(!s.state().can_select_file());
    }

    #[test]
    fn mismatched_extraction_token_is_ignored() {
        let s = loaded();
        let pending = s.begin_query("Q", None).unwrap();
        s.finish_query(pending, Ok("A".into())).unwrap();

        let forged = PendingExtraction {
            epoch: 7,
            filename: "b.pdf".into(),
        };
        let err = s
            .finish_extraction(
                forged,
                Ok(ExtractedText {
                    content: "B\n\n".into(),
                    page_count: 1,
                }),
            )
            .unwrap_err();
        assert_eq!(err, SessionError::Superseded);

        let st = s.snapshot();
        assert_eq!(st.document.as_ref().unwrap().filename, "a.pdf");
        assert_eq!(st.messages.len(), 2);
        assert_eq!(st.epoch, 1);
    }

    #[test]
    fn zero_pages_fail_for_any_extractor() {
        let s = session();
        let pending = s.begin_extraction("empty.pdf").unwrap();
        let err = s
            .finish_extraction(
                pending,
                Ok(ExtractedText {
                    content: String::new(),
                    page_count: 0,
                }),
            )
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::Extraction(ExtractionError::NoPages {
                name: "empty.pdf".into()
            })
        );
        let st = s.snapshot();
        assert!(st.document.is_none());
        assert_eq!(st.document_phase(), DocumentPhase::Failed);
    }

    #[test]
    fn begin_query_appends_user_message_synchronously() {
        let s = loaded();
        let pending = s.begin_query("What?", None).unwrap();

        let st = s.snapshot();
        assert_eq!(st.messages, vec![Message::user("What?", None)]);
        assert_eq!(st.query_phase(), QueryPhase::AwaitingResponse);
        assert_eq!(pending.request().document_text, "Hello\n\n");

        assert_eq!(s.begin_query("again", None).unwrap_err(), Rejected::QueryInFlight);
        s.finish_query(pending, Ok("ok".into())).unwrap();
        assert_eq!(s.snapshot().messages.len(), 2);
    }

    #[test]
    fn failure_wraps_error_text() {
        let s = loaded();
        let pending = s.begin_query("Q", None).unwrap();
        let err = s
            .finish_query(pending, Err(QueryError::api("quota")))
            .unwrap_err();
        assert_eq!(err, SessionError::Query(QueryError::api("quota")));

        let st = s.snapshot();
        assert_eq!(
            st.messages.last().unwrap().text,
            "Sorry, I encountered an error: Error from API: quota"
        );
        assert_eq!(st.model_error.unwrap().to_string(), "Error from API: quota");
        assert!(!st.is_model_loading);
    }

    #[test]
    fn stale_reply_is_discarded() {
        let s = loaded();
        let pending = s.begin_query("Q", None).unwrap();

        // a new file is selected while the query is in flight
        let _next = s.begin_extraction("b.pdf").unwrap();

        let err = s.finish_query(pending, Ok("late".into())).unwrap_err();
        assert_eq!(err, SessionError::Superseded);

        let st = s.snapshot();
        assert!(st.messages.is_empty());
        assert!(!st.is_model_loading);
    }

    #[tokio::test]
    async fn entry_points_round_trip() {
        let s = session();
        let doc = s.select_file(SelectedFile::from_bytes("a.pdf", Vec::<u8>::new())).await.unwrap();
        assert_eq!(doc.filename, "a.pdf");

        let reply = s.send_message("hi", None).await.unwrap();
        assert_eq!(reply, Message::model("echo: hi"));
        assert_eq!(s.transcript().messages.len(), 2);
    }
}
