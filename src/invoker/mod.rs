//! Action invoker
//!
//! Builds the action request URL, submits it either as a navigation (custom
//! response) or as an in-place call, and normalizes every in-place result into
//! an [`ActionOutcome`]. Nothing network related escapes as an error.

mod navigator;
mod params;

pub use navigator::{DownloadNavigator, Navigator};
pub use params::{NoParams, ParamAppender, SelectedRows};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::action::{ActionOutcome, ActionRequest, CorrelationToken, TargetScope};
use crate::error::{ActionError, Result};

/// Shortest time an in-place action keeps the waiting UI visible
pub const MIN_VISIBLE_DURATION: Duration = Duration::from_millis(500);

/// Shown for any non-2xx status other than 400
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// Query parameter carrying the correlation token
pub const ACTION_LOG_KEY_PARAM: &str = "actionLogKey";

/// How a submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Handed to the navigator; the response replaces the page
    Navigated,
    /// In-place call finished
    Completed(ActionOutcome),
}

#[async_trait]
pub trait ActionSubmitter: Send + Sync {
    async fn submit(&self, request: &ActionRequest, token: &CorrelationToken) -> Submission;
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    msg: Option<Value>,
}

pub struct ActionInvoker {
    http: Client,
    action_url: Url,
    row_action_url: Url,
    appender: Arc<dyn ParamAppender>,
    navigator: Arc<dyn Navigator>,
    min_visible: Duration,
}

impl ActionInvoker {
    pub fn new(action_url: Url, row_action_url: Url) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ActionError::HttpClient(e.to_string()))?;
        let navigator = Arc::new(DownloadNavigator::new(http.clone(), None));
        Ok(Self {
            http,
            action_url,
            row_action_url,
            appender: Arc::new(NoParams),
            navigator,
            min_visible: MIN_VISIBLE_DURATION,
        })
    }

    pub fn with_param_appender(mut self, appender: Arc<dyn ParamAppender>) -> Self {
        self.appender = appender;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_min_visible(mut self, min_visible: Duration) -> Self {
        self.min_visible = min_visible;
        self
    }

    /// Shared HTTP client, so navigators can reuse its cookie store
    pub fn http_client(&self) -> &Client {
        &self.http
    }

    pub fn build_url(&self, request: &ActionRequest, token: &CorrelationToken) -> Url {
        let mut url = match request.scope() {
            TargetScope::Row => self.row_action_url.clone(),
            TargetScope::Collection => self.action_url.clone(),
        };

        let mut extra = Vec::new();
        self.appender.append(request, &mut extra);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", request.name());
            query.append_pair(ACTION_LOG_KEY_PARAM, &token.to_string());
            for (key, value) in &extra {
                query.append_pair(key, value);
            }
        }
        url
    }

    async fn execute(&self, request: &ActionRequest, url: Url) -> ActionOutcome {
        let (outcome, ()) = tokio::join!(
            self.send(request, url),
            tokio::time::sleep(self.min_visible)
        );
        outcome
    }

    async fn send(&self, request: &ActionRequest, url: Url) -> ActionOutcome {
        let builder = match request.form() {
            Some(form) => self.http.post(url).multipart(form.to_multipart()),
            None => self.http.get(url),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Action '{}' request failed: {}", request.name(), e);
                return ActionOutcome::error(request, e.to_string());
            }
        };

        let status = response.status();
        tracing::debug!("Action '{}' responded {}", request.name(), status);

        if status.is_success() {
            match Self::read_message(response).await {
                Ok(msg) => ActionOutcome::success(request, msg),
                Err(e) => ActionOutcome::error(request, e),
            }
        } else if status == StatusCode::BAD_REQUEST {
            match Self::read_message(response).await {
                Ok(msg) | Err(msg) => ActionOutcome::error(request, msg),
            }
        } else {
            ActionOutcome::error(request, GENERIC_ERROR_MESSAGE)
        }
    }

    async fn read_message(response: reqwest::Response) -> std::result::Result<String, String> {
        let body: MessageBody = response
            .json()
            .await
            .map_err(|e| format!("Invalid response body: {}", e))?;
        Ok(match body.msg {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
    }
}

#[async_trait]
impl ActionSubmitter for ActionInvoker {
    async fn submit(&self, request: &ActionRequest, token: &CorrelationToken) -> Submission {
        let url = self.build_url(request, token);

        if request.custom_response() {
            match request.form() {
                Some(form) => self.navigator.submit_form(&url, form).await,
                None => self.navigator.navigate(&url).await,
            }
            return Submission::Navigated;
        }

        tracing::info!("Submitting action '{}' ({})", request.name(), request.scope());
        Submission::Completed(self.execute(request, url).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::time::Instant;

    use axum::extract::RawQuery;
    use axum::http::{HeaderMap, Method};
    use axum::routing::{any, get};
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::action::{FormPayload, TriggerElement};

    async fn spawn_server(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn invoker_for(addr: SocketAddr) -> ActionInvoker {
        let base = format!("http://{}/admin/api/user", addr);
        ActionInvoker::new(
            Url::parse(&format!("{}/action", base)).unwrap(),
            Url::parse(&format!("{}/row-action", base)).unwrap(),
        )
        .unwrap()
    }

    fn test_router() -> Router {
        Router::new()
            .route(
                "/admin/api/user/action",
                any(|method: Method, headers: HeaderMap, RawQuery(q): RawQuery| async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    Json(json!({
                        "msg": format!("{} {} {}", method, q.unwrap_or_default(), content_type)
                    }))
                }),
            )
            .route(
                "/admin/api/user/row-action",
                get(|| async { Json(json!({"msg": "row done"})) }),
            )
    }

    #[derive(Default)]
    struct RecordingNavigator {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Navigator for RecordingNavigator {
        async fn navigate(&self, url: &Url) {
            self.calls.lock().unwrap().push(format!("GET {}", url));
        }

        async fn submit_form(&self, url: &Url, form: &FormPayload) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("POST {} ({} fields)", url, form.fields().len()));
        }
    }

    #[test]
    fn test_build_url_query_order() {
        let invoker = ActionInvoker::new(
            Url::parse("http://localhost/admin/api/user/action").unwrap(),
            Url::parse("http://localhost/admin/api/user/row-action").unwrap(),
        )
        .unwrap()
        .with_param_appender(Arc::new(SelectedRows::new(vec!["1".into(), "2".into()])));

        let token = CorrelationToken::mint();
        let req = ActionRequest::new("bulk delete", TriggerElement::default());
        let url = invoker.build_url(&req, &token);

        assert_eq!(url.path(), "/admin/api/user/action");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "bulk delete".to_string()),
                ("actionLogKey".to_string(), token.to_string()),
                ("pks".to_string(), "1".to_string()),
                ("pks".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_url_row_scope() {
        let invoker = ActionInvoker::new(
            Url::parse("http://localhost/a/action").unwrap(),
            Url::parse("http://localhost/a/row-action").unwrap(),
        )
        .unwrap();
        let req = ActionRequest::new("approve", TriggerElement::default())
            .with_scope(TargetScope::Row);
        let url = invoker.build_url(&req, &CorrelationToken::mint());
        assert_eq!(url.path(), "/a/row-action");
    }

    #[tokio::test]
    async fn test_success_waits_for_min_visible_duration() {
        let addr = spawn_server(test_router()).await;
        let invoker = invoker_for(addr);
        let req = ActionRequest::new("export", TriggerElement::new("btn"));
        let token = CorrelationToken::mint();

        let started = Instant::now();
        let submission = invoker.submit(&req, &token).await;
        assert!(started.elapsed() >= MIN_VISIBLE_DURATION);

        let Submission::Completed(outcome) = submission else {
            panic!("expected completed submission");
        };
        assert!(!outcome.is_error);
        assert_eq!(outcome.action_name, "export");
        assert_eq!(outcome.trigger, TriggerElement::new("btn"));
        assert!(outcome.message.starts_with("GET name=export&actionLogKey="));
        assert!(outcome.message.contains(&token.to_string()));
    }

    #[tokio::test]
    async fn test_form_payload_is_posted_as_multipart() {
        let addr = spawn_server(test_router()).await;
        let invoker = invoker_for(addr).with_min_visible(Duration::ZERO);
        let req = ActionRequest::new("tag", TriggerElement::default())
            .with_form(FormPayload::new().with_field("tag", "archived"));

        let Submission::Completed(outcome) = invoker.submit(&req, &CorrelationToken::mint()).await
        else {
            panic!("expected completed submission");
        };
        assert!(outcome.message.starts_with("POST "));
        assert!(outcome.message.contains("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_bad_request_message_is_error() {
        let router = Router::new().route(
            "/admin/api/user/action",
            get(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"msg": "Not authorized"})),
                )
            }),
        );
        let addr = spawn_server(router).await;
        let invoker = invoker_for(addr).with_min_visible(Duration::ZERO);
        let req = ActionRequest::new("purge", TriggerElement::new("el"));

        let submission = invoker.submit(&req, &CorrelationToken::mint()).await;
        assert_eq!(
            submission,
            Submission::Completed(ActionOutcome::error(&req, "Not authorized"))
        );
    }

    #[tokio::test]
    async fn test_other_status_uses_generic_message() {
        let router = Router::new().route(
            "/admin/api/user/action",
            get(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"msg": "stack trace"})),
                )
            }),
        );
        let addr = spawn_server(router).await;
        let invoker = invoker_for(addr).with_min_visible(Duration::ZERO);
        let req = ActionRequest::new("purge", TriggerElement::default());

        let submission = invoker.submit(&req, &CorrelationToken::mint()).await;
        assert_eq!(
            submission,
            Submission::Completed(ActionOutcome::error(&req, GENERIC_ERROR_MESSAGE))
        );
    }

    #[tokio::test]
    async fn test_network_failure_becomes_error_outcome() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let invoker = invoker_for(addr);
        let req = ActionRequest::new("export", TriggerElement::default());

        let started = Instant::now();
        let submission = invoker.submit(&req, &CorrelationToken::mint()).await;
        assert!(started.elapsed() >= MIN_VISIBLE_DURATION);
        match submission {
            Submission::Completed(outcome) => {
                assert!(outcome.is_error);
                assert!(!outcome.message.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_response_navigates() {
        let navigator = Arc::new(RecordingNavigator::default());
        let invoker = ActionInvoker::new(
            Url::parse("http://localhost/admin/api/user/action").unwrap(),
            Url::parse("http://localhost/admin/api/user/row-action").unwrap(),
        )
        .unwrap()
        .with_navigator(navigator.clone());

        let plain = ActionRequest::new("export_csv", TriggerElement::default())
            .with_custom_response(true);
        assert_eq!(
            invoker.submit(&plain, &CorrelationToken::mint()).await,
            Submission::Navigated
        );

        let with_form = plain
            .clone()
            .with_form(FormPayload::new().with_field("format", "csv"));
        assert_eq!(
            invoker.submit(&with_form, &CorrelationToken::mint()).await,
            Submission::Navigated
        );

        let calls = navigator.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("GET http://localhost/admin/api/user/action?name=export_csv"));
        assert!(calls[1].starts_with("POST "));
        assert!(calls[1].ends_with("(1 fields)"));
    }
}
