use std::collections::HashMap;

use addonkit_rs::{
    ALLOWED_RETURN_TO_KEY, ContinuationState, FlowData, FlowError, HttpRequest, SettingsManager,
    complete_with_success, decode_token, encode_token, redirect,
};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn flow_data() -> FlowData {
    let Value::Object(map) = json!({
        "baseUrl": "https://api.example.com",
        "accountId": "abc",
        "subscriptionId": "def",
        "boundaryId": "ghi",
        "functionId": "jkl",
        "templateName": "mno",
    }) else {
        unreachable!()
    };
    map
}

fn start_request(allow_list: &str) -> HttpRequest {
    HttpRequest {
        method: "GET".to_string(),
        path: "/abc/dev/configure".to_string(),
        query: HashMap::from([
            ("returnTo".to_string(), "https://contoso.com".to_string()),
            ("state".to_string(), "abc".to_string()),
            ("data".to_string(), encode_token(&flow_data())),
        ]),
        configuration: HashMap::from([(
            ALLOWED_RETURN_TO_KEY.to_string(),
            allow_list.to_string(),
        )]),
        ..Default::default()
    }
}

fn location_query(response: &addonkit_rs::Response) -> (url::Url, HashMap<String, String>) {
    let location = response.location().expect("redirect location");
    let url = url::Url::parse(location).expect("valid location URL");
    let query = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    (url, query)
}

fn success_manager() -> SettingsManager {
    SettingsManager::builder()
        .initial_state("initial")
        .state_fn("initial", |_request, state, mut data| async move {
            data.insert("inner".to_string(), json!("handled"));
            Ok(complete_with_success(&state, &data))
        })
        .build()
}

#[tokio::test]
async fn initial_state_completes_with_success_redirect() {
    init_tracing();
    let manager = success_manager();
    let response = manager.handle(&start_request("*")).await;

    assert_eq!(response.status, 302);
    let (url, query) = location_query(&response);
    assert_eq!(url.host_str(), Some("contoso.com"));
    assert_eq!(query.get("status").map(String::as_str), Some("success"));
    assert_eq!(query.get("state").map(String::as_str), Some("abc"));

    let data: FlowData = decode_token(query.get("data").unwrap()).unwrap();
    let mut expected = flow_data();
    expected.insert("inner".to_string(), json!("handled"));
    assert_eq!(data, expected);
}

#[tokio::test]
async fn disallowed_return_to_completes_with_error_redirect() {
    init_tracing();
    let manager = success_manager();
    let response = manager
        .handle(&start_request("https://foo.com,https://bar.com"))
        .await;

    assert_eq!(response.status, 302);
    let (url, query) = location_query(&response);
    assert_eq!(url.host_str(), Some("contoso.com"));
    assert_eq!(query.get("status").map(String::as_str), Some("error"));

    let body: Value = decode_token(query.get("data").unwrap()).unwrap();
    assert_eq!(body["status"], json!(403));
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("does not match any of the allowed returnTo URLs")
    );
}

#[tokio::test]
async fn missing_allow_list_rejects_every_destination() {
    init_tracing();
    let manager = success_manager();
    let mut request = start_request("*");
    request.configuration.clear();
    let response = manager.handle(&request).await;

    assert_eq!(response.status, 302);
    let (_, query) = location_query(&response);
    assert_eq!(query.get("status").map(String::as_str), Some("error"));
    let body: Value = decode_token(query.get("data").unwrap()).unwrap();
    assert_eq!(body["status"], json!(403));
}

#[tokio::test]
async fn unregistered_state_completes_with_unsupported_state_error() {
    init_tracing();
    let manager = SettingsManager::builder().initial_state("initial").build();
    let response = manager.handle(&start_request("*")).await;

    assert_eq!(response.status, 302);
    let (url, query) = location_query(&response);
    assert_eq!(url.host_str(), Some("contoso.com"));
    assert_eq!(query.get("status").map(String::as_str), Some("error"));
    assert_eq!(query.get("state").map(String::as_str), Some("abc"));

    let body: Value = decode_token(query.get("data").unwrap()).unwrap();
    assert_eq!(body["status"], json!(400));
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Unsupported configuration state 'initial'")
    );
}

#[tokio::test]
async fn resume_request_dispatches_to_the_carried_state() {
    init_tracing();
    let resume_state = ContinuationState {
        configuration_state: "second".to_string(),
        return_to: "https://contoso.com".to_string(),
        return_to_state: Some("abc".to_string()),
    };
    let request = HttpRequest {
        path: "/abc/dev/configure".to_string(),
        query: HashMap::from([
            ("state".to_string(), encode_token(&resume_state)),
            ("data".to_string(), encode_token(&flow_data())),
        ]),
        ..Default::default()
    };

    let manager = SettingsManager::builder()
        .initial_state("initial")
        .state_fn("second", |_request, state, data| async move {
            assert_eq!(state.configuration_state, "second");
            Ok(complete_with_success(&state, &data))
        })
        .build();

    let response = manager.handle(&request).await;
    assert_eq!(response.status, 302);
    let (_, query) = location_query(&response);
    assert_eq!(query.get("status").map(String::as_str), Some("success"));
    assert_eq!(query.get("state").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn upstream_error_still_reaches_the_original_caller() {
    init_tracing();
    let resume_state = ContinuationState {
        configuration_state: "await_auth".to_string(),
        return_to: "https://contoso.com".to_string(),
        return_to_state: Some("abc".to_string()),
    };
    let request = HttpRequest {
        path: "/abc/dev/configure".to_string(),
        query: HashMap::from([
            ("state".to_string(), encode_token(&resume_state)),
            (
                "data".to_string(),
                encode_token(&json!({"status": 409, "message": "authorization was declined"})),
            ),
            ("status".to_string(), "error".to_string()),
        ]),
        ..Default::default()
    };

    let manager = SettingsManager::builder()
        .initial_state("initial")
        .state_fn("await_auth", |_request, _state, _data| async move {
            panic!("handler must not run for an upstream error");
        })
        .build();

    let response = manager.handle(&request).await;
    assert_eq!(response.status, 302);
    let (url, query) = location_query(&response);
    assert_eq!(url.host_str(), Some("contoso.com"));
    assert_eq!(query.get("status").map(String::as_str), Some("error"));
    assert_eq!(query.get("state").map(String::as_str), Some("abc"));

    let body: Value = decode_token(query.get("data").unwrap()).unwrap();
    assert_eq!(
        body,
        json!({"status": 409, "message": "authorization was declined"})
    );
}

#[tokio::test]
async fn handler_error_is_converted_to_error_completion() {
    init_tracing();
    let manager = SettingsManager::builder()
        .initial_state("initial")
        .state_fn("initial", |_request, _state, _data| async move {
            Err::<addonkit_rs::Response, _>(FlowError::internal("backend unavailable"))
        })
        .build();

    let response = manager.handle(&start_request("*")).await;
    assert_eq!(response.status, 302);
    let (_, query) = location_query(&response);
    assert_eq!(query.get("status").map(String::as_str), Some("error"));
    let body: Value = decode_token(query.get("data").unwrap()).unwrap();
    assert_eq!(body, json!({"status": 500, "message": "backend unavailable"}));
}

#[tokio::test]
async fn delegation_redirects_and_arranges_resume() {
    init_tracing();
    let manager = SettingsManager::builder()
        .initial_state("initial")
        .state_fn("initial", |request, state, data| async move {
            Ok(redirect(
                &request,
                state,
                &data,
                "https://authorize.example.com/grant",
                "await_auth",
            ))
        })
        .build();

    let mut request = start_request("*");
    request
        .headers
        .insert("host".to_string(), "api.example.com".to_string());
    request.subscription_id = "def".to_string();
    request.boundary_id = "ghi".to_string();
    request.function_id = "jkl".to_string();

    let response = manager.handle(&request).await;
    assert_eq!(response.status, 302);
    let (url, query) = location_query(&response);
    assert_eq!(url.host_str(), Some("authorize.example.com"));
    assert_eq!(
        query.get("returnTo").map(String::as_str),
        Some("https://api.example.com/v1/run/def/ghi/jkl/configure")
    );

    let state: ContinuationState = decode_token(query.get("state").unwrap()).unwrap();
    assert_eq!(
        state,
        ContinuationState {
            configuration_state: "await_auth".to_string(),
            return_to: "https://contoso.com".to_string(),
            return_to_state: Some("abc".to_string()),
        }
    );
    let data: FlowData = decode_token(query.get("data").unwrap()).unwrap();
    assert_eq!(data, flow_data());
}

#[tokio::test]
async fn missing_entry_parameters_answer_directly() {
    init_tracing();
    let manager = success_manager();
    let response = manager.handle(&HttpRequest::default()).await;

    // No returnTo is resolvable, so the error cannot be redirect-carried.
    assert_eq!(response.status, 400);
    assert!(response.headers.is_none());
    let body = response.body.unwrap();
    assert_eq!(body["status"], json!(400));
    assert_eq!(
        body["message"],
        json!("Either the 'returnTo' or 'state' parameter must be present.")
    );
}
