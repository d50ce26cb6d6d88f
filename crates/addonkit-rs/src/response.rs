//! Completion and delegation responses.

use tracing::{debug, warn};
use url::form_urlencoded;

use crate::{
    error::FlowError,
    model::{ContinuationState, FlowData, HttpRequest, Response},
    token::encode_token,
};

fn append_query(url: &str, pairs: &[(&str, &str)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{}", serializer.finish())
}

/// Terminal success: redirects to the caller's `returnTo` with the
/// accumulated flow data and the echoed caller token.
pub fn complete_with_success(state: &ContinuationState, data: &FlowData) -> Response {
    let mut pairs = vec![
        ("status", "success".to_string()),
        ("data", encode_token(data)),
    ];
    if let Some(return_to_state) = &state.return_to_state {
        pairs.push(("state", return_to_state.clone()));
    }
    let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
    Response::redirect(append_query(&state.return_to, &borrowed))
}

/// Terminal error.
///
/// When a return destination is resolvable, from the error's carried state or
/// from the request's own `returnTo`, the error still travels back to the
/// caller as a redirect; otherwise it is answered directly.
pub fn complete_with_error(request: &HttpRequest, error: &FlowError) -> Response {
    warn!(status = error.status(), error = %error, "completing flow with error");
    let return_to = error
        .state
        .as_ref()
        .map(|s| s.return_to.clone())
        .or_else(|| request.query.get("returnTo").cloned());
    let echoed_state = error
        .state
        .as_ref()
        .and_then(|s| s.return_to_state.clone())
        .or_else(|| {
            // Only initial requests carry the caller's own opaque token.
            if request.query.contains_key("returnTo") {
                request.query.get("state").cloned()
            } else {
                None
            }
        });
    let body = serde_json::json!({
        "status": error.status(),
        "message": error.to_string(),
    });
    match return_to {
        Some(return_to) => {
            let mut pairs = vec![("status", "error".to_string()), ("data", encode_token(&body))];
            if let Some(echoed) = echoed_state {
                pairs.push(("state", echoed));
            }
            let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
            Response::redirect(append_query(&return_to, &borrowed))
        }
        None => Response::with_body(error.status(), body),
    }
}

/// Delegates the flow to an external page and arranges to be resumed at this
/// component's own `configure` endpoint in `next_state`.
pub fn redirect(
    request: &HttpRequest,
    mut state: ContinuationState,
    data: &FlowData,
    redirect_url: &str,
    next_state: &str,
) -> Response {
    state.configuration_state = next_state.to_string();
    debug!(url = redirect_url, next_state, "delegating to external page");
    let return_to = format!("{}/configure", self_url(request));
    let location = append_query(
        redirect_url,
        &[
            ("returnTo", return_to.as_str()),
            ("state", encode_token(&state).as_str()),
            ("data", encode_token(data).as_str()),
        ],
    );
    Response::redirect(location)
}

/// Reconstructs the component's own base URL from forwarding headers,
/// falling back to the request scheme.
pub fn self_url(request: &HttpRequest) -> String {
    let host = request
        .headers
        .get("host")
        .map(String::as_str)
        .unwrap_or_default();
    let scheme = request
        .headers
        .get("x-forwarded-proto")
        .and_then(|proto| proto.split(',').next())
        .map(str::trim)
        .unwrap_or(request.scheme.as_str());
    format!(
        "{scheme}://{host}/v1/run/{}/{}/{}",
        request.subscription_id, request.boundary_id, request.function_id
    )
}
