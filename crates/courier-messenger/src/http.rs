//! HTTP session for the request/response side of the protocol.
//!
//! Covers the calls the channel issues directly: persisted GraphQL
//! queries and plain URL downloads. Everything else a transport owes the
//! channel goes through [`crate::client::MessengerClient`].

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use courier_core::types::ThreadId;

use crate::client::ThreadLocation;
use crate::error::{MessengerError, Result};
use crate::graphql::{get_value, THREAD_INFO_DOC_ID, THREAD_LIST_DOC_ID};
use crate::session::Session;

const BASE_URL: &str = "https://www.facebook.com/";
const GRAPHQL_URL: &str = "https://www.facebook.com/api/graphql/";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/86.0.4240.75 Safari/537.36";

/// Anti-hijacking prefix the server puts in front of JSON bodies.
const JUNK_PREFIX: &str = "for (;;);";

/// A logged-in HTTP session issuing persisted GraphQL queries.
#[derive(Debug, Clone)]
pub struct GraphqlSession {
    http: reqwest::Client,
    own_id: ThreadId,
}

impl GraphqlSession {
    /// Builds a session from stored login cookies.
    pub fn new(session: &Session) -> Result<Self> {
        let own_id = session.account_id()?;

        let base = Url::parse(BASE_URL)
            .map_err(|e| MessengerError::invalid_argument(e.to_string()))?;
        let jar = reqwest::cookie::Jar::default();
        for cookie in &session.cookies {
            jar.add_cookie_str(
                &format!(
                    "{}={}; Domain={}; Path={}",
                    cookie.name, cookie.value, cookie.domain, cookie.path
                ),
                &base,
            );
        }

        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(BASE_URL));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(Self { http, own_id })
    }

    /// Account id of the logged-in user.
    pub fn own_id(&self) -> &ThreadId {
        &self.own_id
    }

    /// Issues a persisted GraphQL query by doc id.
    pub async fn graphql(&self, doc_id: &str, params: Value) -> Result<Value> {
        let query_params = serde_json::to_string(&params)?;
        let form = [("doc_id", doc_id), ("query_params", query_params.as_str())];
        let response = self
            .http
            .post(GRAPHQL_URL)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        Ok(serde_json::from_str(strip_junk_prefix(&body))?)
    }

    /// Fetches up to `limit` threads filed under `locations`, newest
    /// first, optionally only those older than `before` (ms).
    pub async fn thread_list(
        &self,
        limit: usize,
        before: Option<i64>,
        locations: &[ThreadLocation],
    ) -> Result<Vec<Value>> {
        check_thread_list_limit(limit)?;
        let tags: Vec<&str> = locations.iter().map(ThreadLocation::tag).collect();
        let params = json!({
            "limit": limit,
            "before": before,
            "tags": tags,
            "includeDeliveryReceipts": true,
            "includeSeqID": false,
        });
        let response = self.graphql(THREAD_LIST_DOC_ID, params).await?;
        thread_list_nodes(&response)
    }

    /// Fetches the thread info dict for one thread.
    pub async fn thread_info(&self, thread_id: &ThreadId) -> Result<Value> {
        let params = json!({
            "id": thread_id.as_str(),
            "message_limit": 0,
            "load_message": 0,
            "load_read_receipt": false,
            "before": null,
        });
        let response = self.graphql(THREAD_INFO_DOC_ID, params).await?;
        thread_info_node(&response, thread_id)
    }

    /// Downloads a URL, returning the body and its content type.
    pub async fn fetch(&self, url: &str) -> Result<(Bytes, Option<String>)> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        Ok((body, content_type))
    }
}

/// Strips the anti-hijacking prefix off a response body.
pub fn strip_junk_prefix(body: &str) -> &str {
    body.strip_prefix(JUNK_PREFIX).unwrap_or(body).trim_start()
}

fn check_thread_list_limit(limit: usize) -> Result<()> {
    if (1..=20).contains(&limit) {
        Ok(())
    } else {
        Err(MessengerError::invalid_argument(
            "`limit` should be between 1 and 20",
        ))
    }
}

/// Unwraps the `data` / `oN.data` envelopes some responses come in.
fn response_data(response: &Value) -> &Value {
    if let Some(data) = response.get("data") {
        return data;
    }
    if let Some(data) = get_value(response, &["o0", "data"]) {
        return data;
    }
    response
}

/// Pulls the thread nodes out of a thread list response.
pub fn thread_list_nodes(response: &Value) -> Result<Vec<Value>> {
    get_value(response_data(response), &["viewer", "message_threads", "nodes"])
        .and_then(Value::as_array)
        .map(|nodes| nodes.to_vec())
        .ok_or_else(|| {
            MessengerError::graphql(format!("Could not fetch thread list: {response}"))
        })
}

/// Pulls the thread info dict out of a thread info response.
pub fn thread_info_node(response: &Value, thread_id: &ThreadId) -> Result<Value> {
    match get_value(response_data(response), &["message_thread"]) {
        Some(node) if !node.is_null() => Ok(node.clone()),
        _ => Err(MessengerError::ThreadNotFound(thread_id.to_string())),
    }
}

/// Unwraps URLs Facebook routes through its redirect or image proxy
/// endpoints.
///
/// Returns the input unchanged when it is empty, or when
/// `proxy_links_by_facebook` is set and `override_proxy` is not.
pub fn process_url(url: &str, override_proxy: bool, proxy_links_by_facebook: bool) -> String {
    if url.is_empty() {
        return String::new();
    }
    if !override_proxy && proxy_links_by_facebook {
        return url.to_string();
    }
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };
    if parsed.path().ends_with("/safe_image.php") {
        if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "url") {
            return target.into_owned();
        }
    } else if parsed.host_str() == Some("l.facebook.com") && parsed.path() == "/l.php" {
        if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "u") {
            return target.into_owned();
        }
    }
    url.to_string()
}
