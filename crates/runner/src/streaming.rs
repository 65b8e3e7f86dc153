//! Runner driven by event-stream model calls.

use futures::StreamExt;
use futures::stream::BoxStream;
use messages::{MessageAccumulator, MessageRequest, StreamEvent};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::state::{RunState, RunnerCore, Step};
use crate::{Error, Result};

/// Events of one model call, in arrival order.
///
/// The response is appended to the conversation only after the stream has
/// been drained to its end. The iteration is counted when the model call is
/// issued on first poll. Dropping the stream after that leaves the turn
/// uncommitted while the counter has already advanced; resuming from there
/// is not supported.
pub type TurnEvents<'a> = BoxStream<'a, Result<StreamEvent>>;

/// Drives a run one streamed response at a time.
pub struct StreamingToolRunner {
    core: RunnerCore,
}

impl StreamingToolRunner {
    pub(crate) fn new(core: RunnerCore) -> Self {
        Self { core }
    }

    pub fn state(&self) -> &RunState {
        self.core.state()
    }

    /// Stream the events of the next step.
    ///
    /// Nothing happens until the stream is first polled. Tool uses from the
    /// previous turn are dispatched before the model is called. The stream
    /// is empty when the run is already complete. Failures arrive as a
    /// single trailing `Err` item.
    pub fn next_turn_streaming<'a>(&'a mut self, cancel: &'a CancellationToken) -> TurnEvents<'a> {
        Box::pin(async_stream::stream! {
            let request = match self.core.prepare(cancel).await {
                Ok(Step::Call(request)) => request,
                Ok(Step::Completed) => return,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let mut events = self.call_streaming(request, cancel);
            while let Some(item) = events.next().await {
                yield item;
            }
        })
    }

    /// Iterate over the remaining turns of the run.
    ///
    /// Each turn's events must be dropped before the next turn is
    /// requested.
    pub fn all_turns_streaming<'a>(&'a mut self, cancel: &'a CancellationToken) -> TurnCursor<'a> {
        TurnCursor {
            runner: self,
            cancel,
            done: false,
        }
    }

    fn call_streaming<'a>(
        &'a mut self,
        request: MessageRequest,
        cancel: &'a CancellationToken,
    ) -> TurnEvents<'a> {
        Box::pin(async_stream::stream! {
            let iteration = match self.core.start_call(cancel) {
                Ok(iteration) => iteration,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let service = self.core.service();
            let opened = tokio::select! {
                biased;
                result = service.create_stream(&request) => {
                    result.map_err(|source| Error::Model { iteration, source })
                }
                _ = cancel.cancelled() => Err(Error::Cancelled),
            };
            let mut events = match opened {
                Ok(events) => events,
                Err(e) => {
                    warn!(iteration, error = %e, "failed to open event stream");
                    yield Err(self.core.fail(e));
                    return;
                }
            };

            let mut accumulator = MessageAccumulator::new();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some(Err(Error::Cancelled)),
                    next = events.next() => {
                        next.map(|item| item.map_err(|source| Error::Stream { iteration, source }))
                    }
                };
                match next {
                    Some(Ok(event)) => {
                        if let Err(e) = accumulator.accumulate(&event) {
                            warn!(iteration, error = %e, "failed to accumulate event");
                            yield Err(self.core.fail(e.into()));
                            return;
                        }
                        yield Ok(event);
                    }
                    Some(Err(e)) => {
                        warn!(iteration, error = %e, "event stream ended with error");
                        yield Err(self.core.fail(e));
                        return;
                    }
                    None => break,
                }
            }
            drop(events);

            match accumulator.finish() {
                Ok(message) => self.core.commit(message),
                Err(e) => {
                    warn!(iteration, error = %e, "incomplete response");
                    yield Err(self.core.fail(e.into()));
                }
            }
        })
    }
}

/// Pull cursor over the turns of a streaming run.
///
/// Produced by [`StreamingToolRunner::all_turns_streaming`]. The events
/// returned by [`next`](Self::next) borrow the cursor, so the borrow checker
/// enforces one turn at a time.
pub struct TurnCursor<'a> {
    runner: &'a mut StreamingToolRunner,
    cancel: &'a CancellationToken,
    done: bool,
}

impl TurnCursor<'_> {
    /// Prepare the next step and return its events.
    ///
    /// Returns `None` once the run is complete. A failed preparation is
    /// returned once and ends the cursor.
    pub async fn next(&mut self) -> Option<Result<TurnEvents<'_>>> {
        if self.done {
            return None;
        }
        match self.runner.core.prepare(self.cancel).await {
            Ok(Step::Call(request)) => Some(Ok(self.runner.call_streaming(request, self.cancel))),
            Ok(Step::Completed) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    pub fn state(&self) -> &RunState {
        self.runner.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use messages::mock::{MockReply, MockService, message_events, reply};
    use messages::{
        AccumulateError, ContentBlock, EventStream, Message, MessageParam, MessageService,
        ServiceError,
    };
    use serde_json::json;

    use crate::RunnerBuilder;

    fn runner(service: &MockService) -> StreamingToolRunner {
        RunnerBuilder::new(
            Arc::new(service.clone()),
            MessageRequest::new("m", 256).message(MessageParam::user("hi")),
        )
        .build_streaming()
        .unwrap()
    }

    #[tokio::test]
    async fn yields_events_in_order_and_commits_after_drain() {
        let message = reply(vec![ContentBlock::text("hello")]);
        let service = MockService::new(vec![message.clone()]);
        let mut runner = runner(&service);
        let cancel = CancellationToken::new();

        let events: Vec<_> = runner
            .next_turn_streaming(&cancel)
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(events, message_events(&message));
        assert_eq!(runner.state().last_response(), Some(&message));
        assert_eq!(runner.state().conversation().len(), 2);

        let rest: Vec<_> = runner.next_turn_streaming(&cancel).collect().await;
        assert!(rest.is_empty());
        assert!(runner.state().is_completed());
    }

    #[tokio::test]
    async fn mid_stream_failure_is_trailing_error() {
        let message = reply(vec![ContentBlock::text("partial")]);
        let service = MockService::scripted(vec![MockReply::FailMidStream {
            message,
            after: 3,
            error: ServiceError::Network("reset".into()),
        }]);
        let mut runner = runner(&service);
        let cancel = CancellationToken::new();

        let items: Vec<_> = runner.next_turn_streaming(&cancel).collect().await;
        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(Result::is_ok));
        assert_eq!(
            items[3],
            Err(Error::Stream {
                iteration: 1,
                source: ServiceError::Network("reset".into())
            })
        );
        assert_eq!(runner.state().conversation().len(), 1);
        assert!(!runner.state().is_completed());
    }

    #[tokio::test]
    async fn cancellation_ends_delivery() {
        let service = MockService::scripted(vec![MockReply::Pending]);
        let mut runner = runner(&service);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let items: Vec<_> = runner.next_turn_streaming(&cancel).collect().await;
        assert_eq!(items, vec![Err(Error::Cancelled)]);
        assert_eq!(runner.state().last_error(), Some(&Error::Cancelled));
    }

    /// Replays a fixed event list on every streaming call.
    struct Replay(Vec<StreamEvent>);

    #[async_trait::async_trait]
    impl MessageService for Replay {
        async fn create(&self, _: &MessageRequest) -> std::result::Result<Message, ServiceError> {
            Err(ServiceError::InvalidResponse("streaming only".into()))
        }

        async fn create_stream(
            &self,
            _: &MessageRequest,
        ) -> std::result::Result<EventStream, ServiceError> {
            Ok(Box::pin(futures::stream::iter(self.0.clone().into_iter().map(Ok))))
        }
    }

    fn replay_runner(events: Vec<StreamEvent>) -> StreamingToolRunner {
        RunnerBuilder::new(
            Arc::new(Replay(events)),
            MessageRequest::new("m", 256).message(MessageParam::user("hi")),
        )
        .build_streaming()
        .unwrap()
    }

    #[tokio::test]
    async fn empty_stream_is_accumulation_error() {
        let mut runner = replay_runner(Vec::new());
        let cancel = CancellationToken::new();

        let items: Vec<_> = runner.next_turn_streaming(&cancel).collect().await;
        assert_eq!(
            items,
            vec![Err(Error::Accumulate(AccumulateError::NotStarted {
                event: "end of stream"
            }))]
        );
        assert_eq!(runner.state().conversation().len(), 1);
    }

    #[tokio::test]
    async fn malformed_event_ends_turn_immediately() {
        let message = reply(vec![ContentBlock::text("hello")]);
        let mut events = message_events(&message);
        events.remove(0);
        let mut runner = replay_runner(events);
        let cancel = CancellationToken::new();

        let items: Vec<_> = runner.next_turn_streaming(&cancel).collect().await;
        assert_eq!(
            items,
            vec![Err(Error::Accumulate(AccumulateError::NotStarted {
                event: "content_block_start"
            }))]
        );
        assert!(runner.state().last_response().is_none());
    }

    #[tokio::test]
    async fn cursor_yields_one_event_stream_per_call() {
        let service = MockService::new(vec![
            reply(vec![ContentBlock::tool_use("t1", "lookup", json!({"q": 1}))]),
            reply(vec![ContentBlock::text("done")]),
        ]);
        let mut runner = runner(&service);
        let cancel = CancellationToken::new();

        let mut turns = 0;
        let mut cursor = runner.all_turns_streaming(&cancel);
        while let Some(events) = cursor.next().await {
            let events: Vec<_> = events.unwrap().collect().await;
            assert!(events.iter().all(Result::is_ok));
            turns += 1;
        }
        assert_eq!(turns, 2);
        assert!(cursor.state().is_completed());
        assert!(cursor.next().await.is_none());

        // user, assistant tool use, tool result, assistant answer
        assert_eq!(runner.state().conversation().len(), 4);
        assert_eq!(service.call_count().await, 2);
    }

    #[tokio::test]
    async fn cancelled_cursor_ends_without_calling_model() {
        let service = MockService::new(vec![reply(vec![ContentBlock::text("hello")])]);
        let mut runner = runner(&service);
        let cancelled = CancellationToken::new();
        cancelled.cancel();

        {
            let mut cursor = runner.all_turns_streaming(&cancelled);
            assert!(matches!(cursor.next().await, Some(Err(Error::Cancelled))));
            assert!(cursor.next().await.is_none());
            assert_eq!(cursor.state().iterations(), 0);
        }
        assert_eq!(service.call_count().await, 0);

        let events: Vec<_> = runner
            .next_turn_streaming(&CancellationToken::new())
            .collect()
            .await;
        assert!(events.iter().all(Result::is_ok));
        assert_eq!(runner.state().iterations(), 1);
        assert_eq!(service.call_count().await, 1);
    }

    #[tokio::test]
    async fn events_polled_after_cancel_make_no_call() {
        let service = MockService::new(vec![reply(vec![ContentBlock::text("hello")])]);
        let mut runner = runner(&service);
        let cancel = CancellationToken::new();

        {
            let mut cursor = runner.all_turns_streaming(&cancel);
            let events = cursor.next().await.unwrap().unwrap();
            cancel.cancel();
            let items: Vec<_> = events.collect().await;
            assert_eq!(items, vec![Err(Error::Cancelled)]);
            assert!(matches!(cursor.next().await, Some(Err(Error::Cancelled))));
            assert!(cursor.next().await.is_none());
        }
        assert_eq!(runner.state().iterations(), 0);
        assert_eq!(service.call_count().await, 0);
    }
}
