use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    error::{IngestError, TransportAbort},
    item::{IngestItem, IngestOutput},
    session::IngestSession,
    store::IngestStore,
};

/// Messages read from the client side of a streaming exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestCommand<K> {
    Item(IngestItem<K>),
    EndOfInput,
    Abort(TransportAbort),
}

/// Sending half of a spawned session. Dropping it without calling
/// [`finish`](Self::finish) aborts the session.
#[derive(Debug)]
pub struct IngestInput<K> {
    tx: mpsc::Sender<IngestCommand<K>>,
}

impl<K> IngestInput<K> {
    /// Queues one item; waits while the session's input buffer is full.
    pub async fn send(&self, item: IngestItem<K>) -> Result<(), IngestError> {
        self.tx
            .send(IngestCommand::Item(item))
            .await
            .map_err(|_| IngestError::Disconnected)
    }

    /// Signals end of input. The output stream then yields the summary.
    pub async fn finish(self) -> Result<(), IngestError> {
        self.tx
            .send(IngestCommand::EndOfInput)
            .await
            .map_err(|_| IngestError::Disconnected)
    }

    pub async fn abort(self, reason: TransportAbort) -> Result<(), IngestError> {
        self.tx
            .send(IngestCommand::Abort(reason))
            .await
            .map_err(|_| IngestError::Disconnected)
    }
}

/// Receiving half of a spawned session: one [`IngestOutput::Item`] per item
/// in submission order, then exactly one [`IngestOutput::Summary`]. An
/// aborted session closes with a trailing [`IngestOutput::Aborted`].
#[derive(Debug)]
pub struct IngestOutputStream<R> {
    rx: mpsc::Receiver<IngestOutput<R>>,
}

impl<R> IngestOutputStream<R> {
    pub async fn recv(&mut self) -> Option<IngestOutput<R>> {
        self.rx.recv().await
    }
}

impl<R> Stream for IngestOutputStream<R> {
    type Item = IngestOutput<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Drives `session` from `commands` until end of input or an abort, writing
/// every result to `results`. Returns the finished session.
///
/// A closed command channel counts as an abort. A closed result channel means
/// the reader left, which also aborts the session.
pub async fn run_session<S: IngestStore>(
    mut session: IngestSession<S>,
    mut commands: mpsc::Receiver<IngestCommand<S::ParentKey>>,
    results: mpsc::Sender<IngestOutput<S::Record>>,
) -> IngestSession<S> {
    loop {
        let command = commands.recv().await.unwrap_or_else(|| {
            IngestCommand::Abort(TransportAbort::new("input closed before end of input"))
        });
        match command {
            IngestCommand::Item(item) => {
                let result = match session.submit(item).await {
                    Ok(result) => result,
                    Err(err) => {
                        debug!("stopping ingest loop: {err}");
                        break;
                    }
                };
                if results.send(IngestOutput::Item(result)).await.is_err() {
                    session.abort(TransportAbort::new("result stream closed"));
                    break;
                }
            }
            IngestCommand::EndOfInput => {
                if let Ok(summary) = session.end_of_input() {
                    let _ = results.send(IngestOutput::Summary(summary)).await;
                }
                break;
            }
            IngestCommand::Abort(reason) => {
                let summary = session.abort(reason.clone());
                if results.send(IngestOutput::Summary(summary)).await.is_ok() {
                    let _ = results.send(IngestOutput::Aborted(reason)).await;
                }
                break;
            }
        }
    }
    session
}

/// Spawns `session` on the current runtime behind a pair of bounded
/// channels of `capacity` messages each.
pub fn spawn_session<S>(
    session: IngestSession<S>,
    capacity: usize,
) -> (IngestInput<S::ParentKey>, IngestOutputStream<S::Record>)
where
    S: IngestStore + 'static,
{
    let capacity = capacity.max(1);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let (result_tx, result_rx) = mpsc::channel(capacity);
    tokio::spawn(run_session(session, command_rx, result_tx));
    (
        IngestInput { tx: command_tx },
        IngestOutputStream { rx: result_rx },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;

    use super::*;
    use crate::{
        item::{FailureKind, IngestSummary},
        session::{
            SessionState,
            tests::{MemoryStore, item},
        },
    };

    #[tokio::test]
    async fn streams_results_then_summary() {
        let store = Arc::new(MemoryStore::with_authors([1]).seed(1, "taken"));
        let (input, output) = spawn_session(IngestSession::new(store), 2);

        let writer = tokio::spawn(async move {
            for item in [
                item("A", 1, "isbn-a"),
                item("B", 99, "isbn-b"),
                item("C", 1, "taken"),
                item("D", 1, "isbn-d"),
            ] {
                input.send(item).await.unwrap();
            }
            input.finish().await.unwrap();
        });

        let outputs: Vec<_> = output.collect().await;
        writer.await.unwrap();

        assert_eq!(outputs.len(), 5);
        let kinds: Vec<_> = outputs[..4]
            .iter()
            .map(|output| match output {
                IngestOutput::Item(result) => result.outcome.failure().map(|f| f.kind),
                other => panic!("unexpected output before summary: {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                None,
                Some(FailureKind::ReferenceNotFound),
                Some(FailureKind::DuplicateKey),
                None,
            ]
        );
        assert_eq!(
            outputs[4],
            IngestOutput::Summary(IngestSummary {
                succeeded: 2,
                failed: 2
            })
        );
    }

    #[tokio::test]
    async fn dropped_input_aborts() {
        let store = Arc::new(MemoryStore::with_authors([1]));
        let (command_tx, command_rx) = mpsc::channel(4);
        let (result_tx, mut result_rx) = mpsc::channel(4);

        command_tx
            .send(IngestCommand::Item(item("A", 1, "a")))
            .await
            .unwrap();
        drop(command_tx);

        let session = run_session(IngestSession::new(store.clone()), command_rx, result_tx).await;
        assert_eq!(session.state(), SessionState::Aborted);
        assert_eq!(store.books.lock().len(), 1);

        assert!(matches!(result_rx.recv().await, Some(IngestOutput::Item(_))));
        assert_eq!(
            result_rx.recv().await,
            Some(IngestOutput::Summary(IngestSummary {
                succeeded: 1,
                failed: 0
            }))
        );
        let Some(IngestOutput::Aborted(abort)) = result_rx.recv().await else {
            panic!("expected an abort marker after the summary");
        };
        assert_eq!(abort.reason(), "input closed before end of input");
        assert_eq!(result_rx.recv().await, None);
    }

    #[tokio::test]
    async fn explicit_abort_reports_partial_summary() {
        let store = Arc::new(MemoryStore::with_authors([1]));
        let (input, output) = spawn_session(IngestSession::new(store), 4);

        input.send(item("A", 1, "a")).await.unwrap();
        input.send(item("B", 1, "a")).await.unwrap();
        input
            .abort(TransportAbort::new("client cancelled"))
            .await
            .unwrap();

        let outputs: Vec<_> = output.collect().await;
        assert_eq!(outputs.len(), 4);
        assert_eq!(
            outputs[2],
            IngestOutput::Summary(IngestSummary {
                succeeded: 1,
                failed: 1
            })
        );
        assert_eq!(
            outputs[3],
            IngestOutput::Aborted(TransportAbort::new("client cancelled"))
        );
    }

    #[tokio::test]
    async fn finished_session_has_no_abort_marker() {
        let store = Arc::new(MemoryStore::with_authors([1]));
        let (input, output) = spawn_session(IngestSession::new(store), 4);

        input.send(item("A", 1, "a")).await.unwrap();
        input.finish().await.unwrap();

        let outputs: Vec<_> = output.collect().await;
        assert_eq!(outputs.len(), 2);
        assert!(outputs[1].is_summary());
        assert!(!outputs.iter().any(IngestOutput::is_aborted));
    }

    #[tokio::test]
    async fn send_after_session_ends() {
        let store = Arc::new(MemoryStore::with_authors([1]));
        let (command_tx, command_rx) = mpsc::channel(4);
        let (result_tx, result_rx) = mpsc::channel(4);
        let input = IngestInput { tx: command_tx };
        drop(result_rx);

        input.send(item("A", 1, "a")).await.unwrap();
        let session = run_session(IngestSession::new(store), command_rx, result_tx).await;
        assert_eq!(session.state(), SessionState::Aborted);
        assert_eq!(
            input.send(item("B", 1, "b")).await.unwrap_err(),
            IngestError::Disconnected
        );
    }
}
