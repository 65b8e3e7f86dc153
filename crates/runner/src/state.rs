//! Run state and the step logic shared by both runners.

use std::sync::Arc;

use messages::{Message, MessageParam, MessageRequest, MessageService, Role};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Error;
use crate::tools::{ToolRegistry, dispatch};

/// Read-only view of a run's progress.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    conversation: Vec<MessageParam>,
    iterations: usize,
    max_iterations: usize,
    completed: bool,
    last_response: Option<Message>,
    last_error: Option<Error>,
}

impl RunState {
    /// Every turn so far, oldest first.
    pub fn conversation(&self) -> &[MessageParam] {
        &self.conversation
    }

    /// Model calls issued so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Model call limit; zero means unbounded.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn last_response(&self) -> Option<&Message> {
        self.last_response.as_ref()
    }

    /// The most recent failure, if any step has failed.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }
}

/// Outcome of preparing a step.
pub(crate) enum Step {
    /// The run is over; no call is needed.
    Completed,
    /// Call the model with this request.
    Call(MessageRequest),
}

pub(crate) struct RunnerCore {
    service: Arc<dyn MessageService>,
    registry: ToolRegistry,
    template: MessageRequest,
    state: RunState,
}

impl RunnerCore {
    /// The template's messages seed the conversation.
    pub(crate) fn new(
        service: Arc<dyn MessageService>,
        registry: ToolRegistry,
        mut template: MessageRequest,
        max_iterations: usize,
    ) -> Self {
        let conversation = std::mem::take(&mut template.messages);
        Self {
            service,
            registry,
            template,
            state: RunState {
                conversation,
                max_iterations,
                ..RunState::default()
            },
        }
    }

    pub(crate) fn state(&self) -> &RunState {
        &self.state
    }

    pub(crate) fn service(&self) -> Arc<dyn MessageService> {
        Arc::clone(&self.service)
    }

    /// Advance to the next model call.
    ///
    /// Runs the tool uses of the latest assistant turn first. Marks the run
    /// completed when that turn has none or the iteration cap is reached.
    /// The iteration counter is left alone; see [`start_call`](Self::start_call).
    pub(crate) async fn prepare(&mut self, cancel: &CancellationToken) -> Result<Step, Error> {
        if self.state.completed {
            return Ok(Step::Completed);
        }

        let state = &self.state;
        if state.max_iterations > 0 && state.iterations >= state.max_iterations {
            info!(
                iterations = state.iterations,
                max_iterations = state.max_iterations,
                "iteration cap reached"
            );
            self.state.completed = true;
            return Ok(Step::Completed);
        }

        if let Some(turn) = self.state.conversation.last()
            && turn.role == Role::Assistant
        {
            match dispatch(&self.registry, turn, cancel).await {
                Ok(Some(results)) => self.state.conversation.push(results),
                Ok(None) => {
                    info!(iterations = self.state.iterations, "run completed");
                    self.state.completed = true;
                    return Ok(Step::Completed);
                }
                Err(e) => {
                    warn!(error = %e, "tool dispatch aborted");
                    return Err(self.fail(e));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(self.fail(Error::Cancelled));
        }
        Ok(Step::Call(self.request()))
    }

    /// Count a model call that is about to be issued.
    ///
    /// Fails without counting when `cancel` has already fired. Callers must
    /// poll the service call before anything else once this returns `Ok`.
    pub(crate) fn start_call(&mut self, cancel: &CancellationToken) -> Result<usize, Error> {
        if cancel.is_cancelled() {
            return Err(self.fail(Error::Cancelled));
        }
        self.state.iterations += 1;
        debug!(
            iteration = self.state.iterations,
            turns = self.state.conversation.len(),
            "calling model"
        );
        Ok(self.state.iterations)
    }

    /// Append a model response to the conversation.
    pub(crate) fn commit(&mut self, response: Message) {
        debug!(
            iteration = self.state.iterations,
            stop_reason = ?response.stop_reason,
            tool_uses = response.tool_uses().len(),
            "model responded"
        );
        self.state.conversation.push(response.to_param());
        self.state.last_response = Some(response);
    }

    /// Record a failed step and hand the error back.
    pub(crate) fn fail(&mut self, error: Error) -> Error {
        self.state.last_error = Some(error.clone());
        error
    }

    fn request(&self) -> MessageRequest {
        let mut request = self.template.clone();
        request.messages = self.state.conversation.clone();
        request.tools = self.registry.definitions();
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messages::ContentBlock;
    use messages::mock::{MockService, reply};
    use serde_json::json;

    fn core(conversation: Vec<MessageParam>, max_iterations: usize) -> RunnerCore {
        RunnerCore::new(
            Arc::new(MockService::default()),
            ToolRegistry::default(),
            MessageRequest::new("m", 256).messages(conversation),
            max_iterations,
        )
    }

    #[tokio::test]
    async fn user_turn_goes_straight_to_a_call() {
        let mut core = core(vec![MessageParam::user("hi")], 0);
        let cancel = CancellationToken::new();
        let Step::Call(request) = core.prepare(&cancel).await.unwrap() else {
            panic!("expected a call");
        };
        assert_eq!(request.messages.len(), 1);
        assert_eq!(core.state().iterations(), 0);
        assert_eq!(core.start_call(&cancel).unwrap(), 1);
        assert_eq!(core.state().iterations(), 1);
    }

    #[tokio::test]
    async fn final_answer_completes_without_call() {
        let mut core = core(vec![MessageParam::user("hi")], 0);
        core.prepare(&CancellationToken::new()).await.unwrap();
        core.start_call(&CancellationToken::new()).unwrap();
        core.commit(reply(vec![ContentBlock::text("hello")]));

        assert!(matches!(
            core.prepare(&CancellationToken::new()).await.unwrap(),
            Step::Completed
        ));
        assert!(core.state().is_completed());
        assert_eq!(core.state().iterations(), 1);
        assert_eq!(core.state().conversation().len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_use_adds_result_turn_before_call() {
        let mut core = core(vec![MessageParam::user("weather?")], 0);
        core.prepare(&CancellationToken::new()).await.unwrap();
        core.start_call(&CancellationToken::new()).unwrap();
        core.commit(reply(vec![ContentBlock::tool_use("t1", "get_weather", json!({}))]));

        let Step::Call(request) = core.prepare(&CancellationToken::new()).await.unwrap() else {
            panic!("expected a call");
        };
        assert_eq!(request.messages.len(), 3);
        let result = request.messages[2].content[0].as_tool_result().unwrap();
        assert!(result.is_error);
        assert_eq!(core.state().iterations(), 1);
    }

    #[tokio::test]
    async fn cap_completes_without_call() {
        let mut core = core(vec![MessageParam::user("hi")], 1);
        core.prepare(&CancellationToken::new()).await.unwrap();
        core.start_call(&CancellationToken::new()).unwrap();
        core.commit(reply(vec![ContentBlock::tool_use("t1", "x", json!({}))]));

        assert!(matches!(
            core.prepare(&CancellationToken::new()).await.unwrap(),
            Step::Completed
        ));
        assert_eq!(core.state().iterations(), 1);
        assert_eq!(core.state().conversation().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_dispatch_records_error() {
        let mut core = core(vec![MessageParam::user("hi")], 0);
        core.prepare(&CancellationToken::new()).await.unwrap();
        core.start_call(&CancellationToken::new()).unwrap();
        core.commit(reply(vec![ContentBlock::tool_use("t1", "x", json!({}))]));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = match core.prepare(&cancel).await {
            Err(e) => e,
            Ok(_) => panic!("expected cancellation"),
        };
        assert_eq!(err, Error::Cancelled);
        assert_eq!(core.state().last_error(), Some(&Error::Cancelled));
        assert_eq!(core.state().conversation().len(), 2);
        assert!(!core.state().is_completed());
    }

    #[tokio::test]
    async fn cancelled_before_call_counts_nothing() {
        let mut core = core(vec![MessageParam::user("hi")], 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        for _ in 0..3 {
            assert!(matches!(core.prepare(&cancel).await, Err(Error::Cancelled)));
        }
        assert_eq!(core.state().iterations(), 0);
        assert_eq!(core.state().last_error(), Some(&Error::Cancelled));

        let Step::Call(_) = core.prepare(&CancellationToken::new()).await.unwrap() else {
            panic!("expected a call");
        };
        assert!(!core.state().is_completed());
    }

    #[tokio::test]
    async fn start_call_refuses_cancelled_token() {
        let mut core = core(vec![MessageParam::user("hi")], 0);
        let cancel = CancellationToken::new();
        core.prepare(&cancel).await.unwrap();

        cancel.cancel();
        assert_eq!(core.start_call(&cancel), Err(Error::Cancelled));
        assert_eq!(core.state().iterations(), 0);
    }
}
