//! Basic data types shared across the configuration flow machinery.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Continuation state carried across client-mediated redirects.
///
/// The state machine is stateless on the server side: the entire flow state
/// travels in the `state` query parameter as an encoded token and is
/// re-derived from the request on every call. Handlers receive it by value
/// and never share it between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationState {
    /// Name of the next configuration state handler to run.
    pub configuration_state: String,
    /// URL to redirect to when the flow completes.
    pub return_to: String,
    /// Opaque caller token echoed back verbatim on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to_state: Option<String>,
}

/// Open, caller-defined mapping accumulated by the handler chain.
pub type FlowData = serde_json::Map<String, serde_json::Value>;

/// Fields every flow-start request must carry in its `data` payload,
/// in the fixed order they are validated.
pub const REQUIRED_FLOW_FIELDS: [&str; 6] = [
    "baseUrl",
    "accountId",
    "subscriptionId",
    "boundaryId",
    "functionId",
    "templateName",
];

/// Inbound request as seen by the add-on component.
///
/// This is a plain value type: the SDK is transport-agnostic and the hosting
/// platform (or a test) is responsible for mapping its native request shape
/// onto it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    /// Request path, without the query string.
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    /// Request-scoped configuration of the add-on component itself,
    /// including `fusebit_allowed_return_to`.
    pub configuration: HashMap<String, String>,
    /// Scheme used when no `x-forwarded-proto` header is present.
    pub scheme: String,
    pub subscription_id: String,
    pub boundary_id: String,
    pub function_id: String,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: String::new(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: None,
            configuration: HashMap::new(),
            scheme: "https".to_string(),
            subscription_id: String::new(),
            boundary_id: String::new(),
            function_id: String::new(),
        }
    }
}

impl HttpRequest {
    /// Component identity used in operator-facing error messages.
    pub fn component(&self) -> String {
        format!("{}/{}", self.boundary_id, self.function_id)
    }
}

/// Response shape every handler returns to the hosting platform.
///
/// Redirects are 300-class with a `location` header; everything else sets
/// `status` and an optional JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<ResponseHeaders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseHeaders {
    pub location: String,
}

impl Response {
    /// 302 redirect to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            headers: Some(ResponseHeaders {
                location: location.into(),
            }),
            body: None,
        }
    }

    pub fn with_body(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: None,
            body: Some(body),
        }
    }

    /// Location header, if this is a redirect response.
    pub fn location(&self) -> Option<&str> {
        self.headers.as_ref().map(|h| h.location.as_str())
    }
}
