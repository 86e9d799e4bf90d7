use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::{Result, extract::Extraction};

use super::{CallResult, HttpMethod, ResolvedRequest, encode_form, form_pairs};

/// Performs compiled requests. Never fails past its boundary: every problem becomes a failed [`CallResult`].
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    timeout: Duration,
    sandbox_timeout: Duration,
}

impl HttpExecutor {
    pub fn new(
        timeout: Duration,
        sandbox_timeout: Duration,
    ) -> Result<Self> {
        // proxy environment variables are never consulted
        let client = Client::builder().no_proxy().timeout(timeout).build()?;
        Ok(Self {
            client,
            timeout,
            sandbox_timeout,
        })
    }

    fn client_for(
        &self,
        proxy: Option<&str>,
    ) -> std::result::Result<Client, reqwest::Error> {
        match proxy {
            None => Ok(self.client.clone()),
            Some(url) => Client::builder().proxy(reqwest::Proxy::all(url)?).timeout(self.timeout).build(),
        }
    }

    fn build(
        &self,
        request: &ResolvedRequest,
    ) -> std::result::Result<reqwest::RequestBuilder, reqwest::Error> {
        let client = self.client_for(request.proxy.as_deref())?;
        let method = match request.method {
            HttpMethod::GET => Method::GET,
            HttpMethod::POST => Method::POST,
        };

        let mut builder = client.request(method, &request.url).query(&form_pairs(&request.params));
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if request.method == HttpMethod::POST {
            builder = match (&request.body, request.is_form()) {
                (Value::Null, _) => builder,
                (Value::String(text), true) => builder.body(text.clone()),
                (Value::Object(map), true) => builder.body(encode_form(map)),
                (other, true) => builder.body(other.to_string()),
                (other, false) => builder.json(other),
            };
        }
        Ok(builder)
    }

    /// Executes `request` and applies `extraction` to a successful response.
    pub async fn call(
        &self,
        request: &ResolvedRequest,
        extraction: &Extraction,
    ) -> CallResult {
        if request.url.trim().is_empty() {
            return CallResult::failure("URL is required", None);
        }
        debug!(url = %request.url, method = request.method.as_ref(), proxy = ?request.proxy, "sending request");

        let response = match self.build(request) {
            Ok(builder) => builder.send().await,
            Err(e) => Err(e),
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => return CallResult::failure(format!("Request error: {}", e), None),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return CallResult::failure(format!("Request error: {}", e), None),
        };
        if !status.is_success() {
            debug!(url = %request.url, status = status.as_u16(), "request rejected");
            return CallResult::failure(format!("HTTP error: {} - {}", status.as_u16(), text), Some(Value::String(text)));
        }

        let data = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| Value::String(text.clone()));
        match extraction.apply(&data, &text, self.sandbox_timeout).await {
            Ok(extracted) => CallResult::success(extracted, Some(data)),
            Err(e) => {
                debug!(url = %request.url, error = %e, "extraction failed");
                CallResult::failure(e.to_string(), Some(data))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{collections::BTreeMap, time::Duration};

    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::{Map, Value, json};

    use super::HttpExecutor;
    use crate::{
        extract::Extraction,
        request::{HttpMethod, ResolvedRequest},
        testkit,
    };

    fn executor() -> HttpExecutor {
        HttpExecutor::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap()
    }

    fn app() -> Router {
        Router::new()
            .route("/items", get(|Query(q): Query<BTreeMap<String, String>>| async move { Json(json!({"query": q, "items": [{"id": 1}, {"id": 2}]})) }))
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(json!({"received": body})) }))
            .route(
                "/form",
                post(|headers: HeaderMap, body: String| async move {
                    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
                    Json(json!({"content_type": content_type, "body": body}))
                }),
            )
            .route("/text", get(|| async { "plain text" }))
            .route("/fail", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
    }

    fn request(
        url: String,
        method: HttpMethod,
    ) -> ResolvedRequest {
        ResolvedRequest {
            url,
            method,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_call_missing_url() {
        let result = executor().call(&ResolvedRequest::default(), &Extraction::None).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("URL is required"));
    }

    #[tokio::test]
    async fn test_call_get_with_path_extraction() {
        let base = testkit::serve(app()).await;
        let mut req = request(format!("{}/items", base), HttpMethod::GET);
        req.params.insert("page".to_string(), json!(2));
        req.params.insert("q".to_string(), json!("rust"));

        let result = executor().call(&req, &Extraction::path("items[1].id")).await;
        assert!(result.success);
        assert_eq!(result.data, Some(json!(2)));
        let raw = result.raw_response.unwrap();
        assert_eq!(raw["query"], json!({"page": "2", "q": "rust"}));
    }

    #[tokio::test]
    async fn test_call_post_json_and_form() {
        let base = testkit::serve(app()).await;
        let mut req = request(format!("{}/echo", base), HttpMethod::POST);
        req.body = json!({"keyword": "shoes"});
        let result = executor().call(&req, &Extraction::None).await;
        assert_eq!(result.data, Some(json!({"received": {"keyword": "shoes"}})));
        assert_eq!(result.data, result.raw_response);

        let mut req = request(format!("{}/form", base), HttpMethod::POST);
        req.headers.insert("Content-Type".to_string(), "application/x-www-form-urlencoded".to_string());
        let mut body = Map::new();
        body.insert("a".to_string(), json!("1"));
        req.body = Value::Object(body);
        let result = executor().call(&req, &Extraction::None).await;
        let data = result.data.unwrap();
        assert_eq!(data["body"], json!("a=1"));
        assert_eq!(data["content_type"], json!("application/x-www-form-urlencoded"));
    }

    #[tokio::test]
    async fn test_call_text_body_and_snippet() {
        let base = testkit::serve(app()).await;
        let req = request(format!("{}/text", base), HttpMethod::GET);
        let result = executor().call(&req, &Extraction::None).await;
        assert_eq!(result.data, Some(json!("plain text")));

        let result = executor().call(&req, &Extraction::python("def parse(data):\n    return len(raw_response)\n")).await;
        assert_eq!(result.data, Some(json!(10)));
    }

    #[tokio::test]
    async fn test_call_http_error_keeps_body() {
        let base = testkit::serve(app()).await;
        let result = executor().call(&request(format!("{}/fail", base), HttpMethod::GET), &Extraction::None).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP error: 500 - boom"));
        assert_eq!(result.raw_response, Some(json!("boom")));
        assert_eq!(result.data, None);
    }

    #[tokio::test]
    async fn test_call_transport_error() {
        let result = executor().call(&request("http://127.0.0.1:1/".to_string(), HttpMethod::GET), &Extraction::None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Request error: "));
        assert_eq!(result.raw_response, None);
    }

    #[tokio::test]
    async fn test_call_snippet_failure_keeps_response() {
        let base = testkit::serve(app()).await;
        let req = request(format!("{}/items", base), HttpMethod::GET);
        let result = executor().call(&req, &Extraction::python("def other(data):\n    return 1\n")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("parse"));
        assert!(result.raw_response.is_some());
    }
}
