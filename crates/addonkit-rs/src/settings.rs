//! The configuration settings state machine.
//!
//! A [`SettingsManager`] dispatches each request to the handler registered
//! for the continuation state's `configurationState` name. Handlers either
//! complete the flow (success or error) or delegate to an external page and
//! resume later at the same endpoint; either way the machine itself holds no
//! per-flow state between requests.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::{FlowError, FlowErrorKind},
    inputs::{resolve_inputs, validate_return_to},
    model::{ContinuationState, FlowData, HttpRequest, Response},
    response::complete_with_error,
};

/// Handler for one named configuration state.
#[async_trait]
pub trait StateHandler: Send + Sync {
    async fn handle(
        &self,
        request: HttpRequest,
        state: ContinuationState,
        data: FlowData,
    ) -> Result<Response, FlowError>;
}

/// Adapter letting a plain async function act as a [`StateHandler`].
pub struct FnStateHandler<F>(pub F);

#[async_trait]
impl<F, Fut> StateHandler for FnStateHandler<F>
where
    F: Fn(HttpRequest, ContinuationState, FlowData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, FlowError>> + Send + 'static,
{
    async fn handle(
        &self,
        request: HttpRequest,
        state: ContinuationState,
        data: FlowData,
    ) -> Result<Response, FlowError> {
        (self.0)(request, state, data).await
    }
}

/// Builder for [`SettingsManager`].
#[derive(Default)]
pub struct SettingsManagerBuilder {
    states: HashMap<String, Arc<dyn StateHandler>>,
    initial_state: Option<String>,
}

impl SettingsManagerBuilder {
    /// Registers a handler under a configuration state name.
    pub fn state(mut self, name: impl Into<String>, handler: impl StateHandler + 'static) -> Self {
        self.states.insert(name.into(), Arc::new(handler));
        self
    }

    /// Registers a plain async function under a configuration state name.
    pub fn state_fn<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HttpRequest, ContinuationState, FlowData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, FlowError>> + Send + 'static,
    {
        self.state(name, FnStateHandler(handler))
    }

    /// Names the state a flow-start request enters.
    pub fn initial_state(mut self, name: impl Into<String>) -> Self {
        self.initial_state = Some(name.into());
        self
    }

    pub fn build(self) -> SettingsManager {
        if let Some(initial) = &self.initial_state
            && !self.states.contains_key(initial)
        {
            // Flow-start requests will terminate with UnsupportedState.
            warn!(initial_state = %initial, "initial configuration state has no registered handler");
        }
        SettingsManager {
            states: self.states,
            initial_state: self.initial_state,
        }
    }
}

/// Stateless dispatcher for the multi-step configuration flow.
pub struct SettingsManager {
    states: HashMap<String, Arc<dyn StateHandler>>,
    initial_state: Option<String>,
}

impl SettingsManager {
    pub fn builder() -> SettingsManagerBuilder {
        SettingsManagerBuilder::default()
    }

    /// Handles one request of the configuration flow.
    ///
    /// Never fails: every error is converted into an error completion, which
    /// redirects back to the caller when a return destination is resolvable
    /// and answers the request directly otherwise.
    pub async fn handle(&self, request: &HttpRequest) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(error) => complete_with_error(request, &error),
        }
    }

    async fn dispatch(&self, request: &HttpRequest) -> Result<Response, FlowError> {
        validate_return_to(request)?;
        let (state, data) = resolve_inputs(request, self.initial_state.as_deref())?;
        debug!(
            configuration_state = %state.configuration_state,
            "dispatching configuration state"
        );
        let handler = self.states.get(&state.configuration_state).ok_or_else(|| {
            FlowError::new(FlowErrorKind::UnsupportedState(
                state.configuration_state.clone(),
            ))
            .with_state(state.clone())
        })?;
        handler
            .handle(request.clone(), state.clone(), data)
            .await
            // Keep the redirect-on-error path available even when the handler
            // raised a bare error.
            .map_err(|error| error.ensure_state(&state))
    }
}
