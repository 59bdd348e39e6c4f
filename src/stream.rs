//! Streaming view of a session: emit state as transitions happen.
//!
//! A presentation layer that renders reactively (terminal spinner, web view,
//! GUI binding) subscribes here instead of polling. The stream yields the
//! current state first, then one item per published transition. Slow
//! consumers skip intermediate states and always see the latest.

use crate::pipeline::extract::DocumentExtractor;
use crate::pipeline::llm::ModelClient;
use crate::session::{ChatSession, SessionState};
use futures::future;
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

/// Which busy flags are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusyStatus {
    pub processing_pdf: bool,
    pub model_loading: bool,
}

impl BusyStatus {
    pub fn of(state: &SessionState) -> Self {
        Self {
            processing_pdf: state.is_processing_pdf,
            model_loading: state.is_model_loading,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.processing_pdf && !self.model_loading
    }
}

impl<X, C> ChatSession<X, C>
where
    X: DocumentExtractor,
    C: ModelClient,
{
    /// Stream of state snapshots, starting with the current one.
    pub fn updates(&self) -> WatchStream<SessionState> {
        WatchStream::new(self.subscribe())
    }
}

/// Reduce a state stream to busy-flag changes, dropping repeats.
pub fn busy_changes<S>(updates: S) -> impl Stream<Item = BusyStatus>
where
    S: Stream<Item = SessionState>,
{
    updates
        .map(|state| BusyStatus::of(&state))
        .scan(None, |last: &mut Option<BusyStatus>, status| {
            let changed = *last != Some(status);
            *last = Some(status);
            future::ready(Some(changed.then_some(status)))
        })
        .filter_map(future::ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn state(pdf: bool, model: bool) -> SessionState {
        SessionState {
            is_processing_pdf: pdf,
            is_model_loading: model,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn repeats_are_dropped() {
        let input = stream::iter(vec![
            state(false, false),
            state(true, false),
            state(true, false),
            state(false, false),
            state(false, true),
            state(false, true),
            state(false, false),
        ]);
        let out: Vec<BusyStatus> = busy_changes(input).collect().await;
        let flags: Vec<(bool, bool)> = out
            .iter()
            .map(|s| (s.processing_pdf, s.model_loading))
            .collect();
        assert_eq!(
            flags,
            vec![
                (false, false),
                (true, false),
                (false, false),
                (false, true),
                (false, false)
            ]
        );
    }

    #[test]
    fn idle_when_no_flag_set() {
        assert!(BusyStatus::default().is_idle());
        assert!(!BusyStatus::of(&state(true, false)).is_idle());
    }
}
