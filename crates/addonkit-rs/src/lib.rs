//! SDK for add-on components embedded in a hosting platform.
//!
//! Two cooperating pieces:
//!
//! - a **configuration state machine**: a stateless, redirect-carried
//!   continuation protocol letting a sequence of handlers (including detours
//!   through third-party authorization pages) build up a data record before
//!   final installation, and
//! - a **lifecycle dispatcher** routing install/uninstall/configure requests
//!   to caller-supplied handlers.
//!
//! The companion `addonkit-rs-storage` crate provides the durable-state
//! client used by installed components.
//!
//! No flow state is ever persisted server-side: [`ContinuationState`] and
//! [`FlowData`] round-trip through the client inside the `state` and `data`
//! query parameters as opaque tokens (see [`token`]).

pub mod error;
pub mod inputs;
pub mod lifecycle;
pub mod model;
pub mod response;
pub mod settings;
pub mod token;

pub use error::{FlowError, FlowErrorKind};
pub use inputs::{ALLOWED_RETURN_TO_KEY, resolve_inputs, validate_return_to};
pub use lifecycle::{FnLifecycleHandler, LifecycleHandler, LifecycleManager, LifecycleManagerBuilder};
pub use model::{
    ContinuationState, FlowData, HttpRequest, REQUIRED_FLOW_FIELDS, Response, ResponseHeaders,
};
pub use response::{complete_with_error, complete_with_success, redirect, self_url};
pub use settings::{FnStateHandler, SettingsManager, SettingsManagerBuilder, StateHandler};
pub use token::{MalformedToken, decode_token, encode_token};
