//! Runner driven by whole-response model calls.

use futures::Stream;
use messages::Message;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::state::{RunState, RunnerCore, Step};
use crate::{Error, Result};

/// Drives a run one complete response at a time.
///
/// Operations take `&mut self`, so a run has a single driver.
pub struct ToolRunner {
    core: RunnerCore,
}

impl ToolRunner {
    pub(crate) fn new(core: RunnerCore) -> Self {
        Self { core }
    }

    pub fn state(&self) -> &RunState {
        self.core.state()
    }

    /// Execute one step of the run.
    ///
    /// Returns `Ok(None)` once the run is complete, without calling the
    /// model. Dispatch and model-call failures are returned and recorded;
    /// the step can be retried.
    pub async fn next_turn(&mut self, cancel: &CancellationToken) -> Result<Option<Message>> {
        let request = match self.core.prepare(cancel).await? {
            Step::Completed => return Ok(None),
            Step::Call(request) => request,
        };

        let iteration = self.core.start_call(cancel)?;
        let service = self.core.service();
        // Poll the call first so a counted iteration is always issued.
        let response = tokio::select! {
            biased;
            result = service.create(&request) => {
                result.map_err(|source| Error::Model { iteration, source })
            }
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };

        match response {
            Ok(message) => {
                self.core.commit(message.clone());
                Ok(Some(message))
            }
            Err(e) => {
                warn!(iteration, error = %e, "model call failed");
                Err(self.core.fail(e))
            }
        }
    }

    /// Step until the run completes and return the final response.
    ///
    /// When no call was needed, returns the last response already in the
    /// run.
    pub async fn run_to_completion(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Message>> {
        let mut last = None;
        while let Some(message) = self.next_turn(cancel).await? {
            last = Some(message);
        }
        Ok(last.or_else(|| self.state().last_response().cloned()))
    }

    /// Lazily yield each new response until the run completes.
    ///
    /// A failed step is yielded once and ends the sequence. Dropping the
    /// sequence early leaves the run where it stopped; it can be resumed.
    pub fn all<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = Result<Message>> + 'a {
        async_stream::stream! {
            loop {
                match self.next_turn(cancel).await {
                    Ok(Some(message)) => {
                        yield Ok(message);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}
