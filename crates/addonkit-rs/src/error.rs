use thiserror::Error;

use crate::model::ContinuationState;

/// Error kinds raised by the configuration flow machinery.
///
/// These are status-bearing values rather than transport failures: each kind
/// maps to the HTTP status the hosting platform should surface, and the
/// messages are operator-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowErrorKind {
    #[error("Malformed 'data' parameter")]
    MalformedData,

    #[error("Malformed 'state' parameter")]
    MalformedState,

    #[error(
        "State consistency error. Initial configuration state is not specified, and 'state' parameter is missing."
    )]
    MissingInitialState,

    #[error("Missing 'data.{0}' input parameter")]
    MissingField(&'static str),

    #[error("Either the 'returnTo' or 'state' parameter must be present.")]
    MissingEntryParameter,

    #[error(
        "The specified 'returnTo' URL '{return_to}' does not match any of the allowed returnTo URLs of the '{component}' add-on component. If this is a valid request, add the specified 'returnTo' URL to the 'fusebit_allowed_return_to' configuration property of the '{component}' add-on component."
    )]
    ReturnToNotAllowed { return_to: String, component: String },

    #[error("Unsupported configuration state '{0}'")]
    UnsupportedState(String),

    #[error("Not found")]
    NotFound,

    /// Failure reported back by a delegated third-party step.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Internal(String),
}

impl FlowErrorKind {
    pub fn status(&self) -> u16 {
        match self {
            Self::MalformedData
            | Self::MalformedState
            | Self::MissingInitialState
            | Self::MissingField(_)
            | Self::MissingEntryParameter
            | Self::UnsupportedState(_) => 400,
            Self::ReturnToNotAllowed { .. } => 403,
            Self::NotFound => 404,
            Self::Upstream { status, .. } => *status,
            Self::Internal(_) => 500,
        }
    }
}

/// A flow error, optionally carrying the continuation state that was in
/// effect when it was raised.
///
/// The carried state lets the error completion still redirect back to the
/// original caller instead of answering the intermediate request directly.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct FlowError {
    pub kind: FlowErrorKind,
    pub state: Option<ContinuationState>,
}

impl FlowError {
    pub fn new(kind: FlowErrorKind) -> Self {
        Self { kind, state: None }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Internal(message.into()))
    }

    pub fn with_state(mut self, state: ContinuationState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches `state` unless the error already carries one.
    pub fn ensure_state(mut self, state: &ContinuationState) -> Self {
        if self.state.is_none() {
            self.state = Some(state.clone());
        }
        self
    }

    pub fn status(&self) -> u16 {
        self.kind.status()
    }
}

impl From<FlowErrorKind> for FlowError {
    fn from(kind: FlowErrorKind) -> Self {
        Self::new(kind)
    }
}
