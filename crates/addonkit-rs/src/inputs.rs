//! Input resolution: turning an inbound request into a `(state, data)` pair.

use serde_json::Value;
use tracing::debug;

use crate::{
    error::{FlowError, FlowErrorKind},
    model::{ContinuationState, FlowData, HttpRequest, REQUIRED_FLOW_FIELDS},
    token::decode_token,
};

/// Configuration key holding the comma-separated allow-list of `returnTo`
/// destinations. A pattern ending in `*` matches by prefix.
pub const ALLOWED_RETURN_TO_KEY: &str = "fusebit_allowed_return_to";

/// Validates the requested `returnTo` destination against the component's
/// configured allow-list.
///
/// Skipped entirely when the request carries no `returnTo` (resume steps
/// never re-validate). An empty allow-list matches nothing.
pub fn validate_return_to(request: &HttpRequest) -> Result<(), FlowError> {
    let Some(return_to) = request.query.get("returnTo") else {
        return Ok(());
    };
    let allowed = request
        .configuration
        .get(ALLOWED_RETURN_TO_KEY)
        .map(String::as_str)
        .unwrap_or("");
    let matched = allowed.split(',').any(|pattern| {
        if pattern == return_to {
            return true;
        }
        match pattern.strip_suffix('*') {
            Some(stem) => return_to.starts_with(stem),
            None => false,
        }
    });
    if matched {
        Ok(())
    } else {
        Err(FlowErrorKind::ReturnToNotAllowed {
            return_to: return_to.clone(),
            component: request.component(),
        }
        .into())
    }
}

/// Resolves the incoming request into a continuation state and flow data.
///
/// `returnTo` present selects the flow-start branch, `state` present the
/// resume branch; neither is an error. When the request itself reports an
/// upstream failure (`status=error`), the propagated failure is raised with
/// the resolved state attached so the error completion can still reach the
/// original caller.
pub fn resolve_inputs(
    request: &HttpRequest,
    initial_state: Option<&str>,
) -> Result<(ContinuationState, FlowData), FlowError> {
    let data: FlowData = match request.query.get("data") {
        Some(raw) => decode_token(raw).map_err(|_| FlowErrorKind::MalformedData)?,
        None => FlowData::new(),
    };

    let state = if let Some(return_to) = request.query.get("returnTo") {
        // Start of the add-on component interaction.
        let Some(initial) = initial_state else {
            return Err(FlowErrorKind::MissingInitialState.into());
        };
        for field in REQUIRED_FLOW_FIELDS {
            if !is_present(data.get(field)) {
                return Err(FlowErrorKind::MissingField(field).into());
            }
        }
        ContinuationState {
            configuration_state: initial.to_string(),
            return_to: return_to.clone(),
            return_to_state: request.query.get("state").cloned(),
        }
    } else if let Some(raw) = request.query.get("state") {
        // Continuation, e.g. a form post from a settings page or a return
        // from a delegated third-party step.
        decode_token(raw).map_err(|_| FlowErrorKind::MalformedState)?
    } else {
        return Err(FlowErrorKind::MissingEntryParameter.into());
    };

    if request.query.get("status").is_some_and(|s| s == "error") {
        let status = data
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok())
            .unwrap_or(500);
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unspecified error")
            .to_string();
        debug!(status, %message, "upstream step reported an error");
        return Err(FlowError::new(FlowErrorKind::Upstream { status, message }).with_state(state));
    }

    Ok((state, data))
}

// Falsy values (null, "", false, 0) all count as missing.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(_) => true,
    }
}
