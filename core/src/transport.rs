//! Authenticated HTTP transport for the Challonge v1 API.
//!
//! # Design
//! Each call performs exactly one blocking round trip via ureq: no retries,
//! no caching, no shared mutable state beyond the credentials and UTC offset
//! computed once at construction. Request building and response
//! classification are split from the `execute` step (plain-data
//! [`HttpRequest`]/[`HttpResponse`]), so both are unit testable without a
//! server.
//!
//! Non-200 classification is deliberately asymmetric, mirroring the service's
//! observed client behavior: `post` failures report the full URL and raw body
//! (and a credential hint on 401), while `get`/`put`/`delete` failures report
//! only the joined `errors` array from the JSON body.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use crate::config::{ApiConfig, KEY_ENV_VAR, USER_ENV_VAR};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::params::ParamList;

/// Identifying user agent. The service sits behind a CDN that blocks default
/// library agents, so every request must carry this header.
pub const USER_AGENT: &str = "challonge-core";

/// Blocking HTTP transport holding the credentials and UTC offset resolved
/// at construction.
pub struct Transport {
    base_url: String,
    auth_header: String,
    utc_offset: String,
    agent: ureq::Agent,
}

impl Transport {
    /// Build a transport from an explicit configuration.
    ///
    /// Fails with [`ApiError::Config`] on empty credentials or an
    /// unresolvable timezone.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        if config.user.is_empty() {
            return Err(ApiError::Config(format!(
                "no API username was defined in the {USER_ENV_VAR} environment variable"
            )));
        }
        if config.key.is_empty() {
            return Err(ApiError::Config(format!(
                "no API key was defined in the {KEY_ENV_VAR} environment variable"
            )));
        }

        let utc_offset = config.utc_offset_string()?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let auth_header = format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", config.user, config.key))
        );

        // Non-2xx statuses are classified here, not surfaced as ureq errors.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();

        Ok(Self {
            base_url,
            auth_header,
            utc_offset,
            agent,
        })
    }

    /// Build a transport from the process environment.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(ApiConfig::from_env()?)
    }

    /// The `±HH:MM` UTC offset resolved at construction time.
    pub fn utc_offset(&self) -> &str {
        &self.utc_offset
    }

    /// The API root this transport targets, with a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `base_url + path`, query from `params`, expecting a JSON body.
    pub fn get(&self, path: &str, params: ParamList) -> Result<Value, ApiError> {
        let request = self.build(HttpMethod::Get, path, params)?;
        interpret_simple(self.execute(&request)?)
    }

    /// POST `base_url + path` with a form-encoded body.
    pub fn post(&self, path: &str, params: ParamList) -> Result<Value, ApiError> {
        let request = self.build(HttpMethod::Post, path, params)?;
        let response = self.execute(&request)?;
        interpret_post(&request.url, response)
    }

    /// PUT `base_url + path` with a form-encoded body.
    pub fn put(&self, path: &str, params: ParamList) -> Result<Value, ApiError> {
        let request = self.build(HttpMethod::Put, path, params)?;
        interpret_simple(self.execute(&request)?)
    }

    /// DELETE `base_url + path`, query from `params`.
    pub fn delete(&self, path: &str, params: ParamList) -> Result<Value, ApiError> {
        let request = self.build(HttpMethod::Delete, path, params)?;
        interpret_simple(self.execute(&request)?)
    }

    /// GET `base_url + path` and return the raw body text on 200. Used by the
    /// connectivity check, which does not expect an enveloped entity.
    pub fn get_text(&self, path: &str) -> Result<String, ApiError> {
        let request = self.build(HttpMethod::Get, path, ParamList::new())?;
        let response = self.execute(&request)?;
        if response.status != 200 {
            return Err(ApiError::Remote(format!(
                "ERROR: {}",
                joined_errors(&response.body)
            )));
        }
        Ok(response.body)
    }

    fn build(
        &self,
        method: HttpMethod,
        path: &str,
        params: ParamList,
    ) -> Result<HttpRequest, ApiError> {
        let pairs = params.into_pairs();
        let mut url = format!("{}{}", self.base_url, path);
        let mut body = None;

        if !pairs.is_empty() {
            let encoded = serde_urlencoded::to_string(&pairs)
                .map_err(|e| ApiError::Http(format!("could not encode request parameters: {e}")))?;
            match method {
                HttpMethod::Get | HttpMethod::Delete => {
                    url.push('?');
                    url.push_str(&encoded);
                }
                HttpMethod::Post | HttpMethod::Put => body = Some(encoded),
            }
        }

        Ok(HttpRequest {
            method,
            url,
            headers: vec![
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Authorization".to_string(), self.auth_header.clone()),
            ],
            body,
        })
    }

    /// Execute one request over the network.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        log::debug!("{:?} {}", request.method, request.url);

        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            (HttpMethod::Delete, _) => {
                let mut builder = self.agent.delete(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            (HttpMethod::Post, body) => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match body {
                    Some(body) => builder
                        .content_type("application/x-www-form-urlencoded")
                        .send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            (HttpMethod::Put, body) => {
                let mut builder = self.agent.put(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match body {
                    Some(body) => builder
                        .content_type("application/x-www-form-urlencoded")
                        .send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|e| ApiError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Http(e.to_string()))?;

        log::debug!("{:?} {} -> {}", request.method, request.url, status);

        Ok(HttpResponse { status, body })
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of debug output.
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("utc_offset", &self.utc_offset)
            .finish()
    }
}

/// Classification for `get`/`put`/`delete`: any non-200 reports the joined
/// `errors` array from the JSON body.
fn interpret_simple(response: HttpResponse) -> Result<Value, ApiError> {
    if response.status != 200 {
        return Err(ApiError::Remote(format!(
            "ERROR: {}",
            joined_errors(&response.body)
        )));
    }
    parse_json(&response.body)
}

/// Classification for `post`: 401 adds a credential hint and may embed the
/// raw body; other failures report the full URL and raw body.
fn interpret_post(url: &str, response: HttpResponse) -> Result<Value, ApiError> {
    match response.status {
        200 => parse_json(&response.body),
        401 => {
            let detail = if response.body.contains("HTTP Basic") {
                response.body
            } else {
                joined_errors(&response.body)
            };
            Err(ApiError::Remote(format!(
                "ERROR: access was denied; ensure that the {USER_ENV_VAR} and {KEY_ENV_VAR} \
                 environment variables are set correctly. {detail}"
            )))
        }
        _ => Err(ApiError::Remote(format!("ERROR: {url} | {}", response.body))),
    }
}

/// Join the `errors` array of a JSON error body; fall back to the raw body
/// when it is not JSON or carries no `errors` key.
fn joined_errors(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::Array(items)) = map.get("errors") {
            return items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
        }
    }
    body.to_string()
}

fn parse_json(body: &str) -> Result<Value, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> Transport {
        let mut config = ApiConfig::new("alice", "s3cr3t");
        config.base_url = "http://localhost:3000".to_string();
        config.tz_name = Some("Etc/UTC".to_string());
        Transport::new(config).unwrap()
    }

    #[test]
    fn empty_user_fails_construction() {
        let config = ApiConfig::new("", "s3cr3t");
        let err = Transport::new(config).unwrap_err();
        assert!(err.to_string().contains(USER_ENV_VAR));
    }

    #[test]
    fn empty_key_fails_construction() {
        let config = ApiConfig::new("alice", "");
        let err = Transport::new(config).unwrap_err();
        assert!(err.to_string().contains(KEY_ENV_VAR));
    }

    #[test]
    fn offset_is_fixed_at_construction() {
        assert_eq!(transport().utc_offset(), "+00:00");
    }

    #[test]
    fn build_get_appends_query_and_auth() {
        let t = transport();
        let mut params = ParamList::new();
        params.push("state", "pending");
        let req = t.build(HttpMethod::Get, "tournaments.json", params).unwrap();

        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/tournaments.json?state=pending");
        assert!(req.body.is_none());
        assert!(req
            .headers
            .iter()
            .any(|(n, v)| n == "User-Agent" && v == USER_AGENT));
        // base64("alice:s3cr3t")
        assert!(req
            .headers
            .iter()
            .any(|(n, v)| n == "Authorization" && v == "Basic YWxpY2U6czNjcjN0"));
    }

    #[test]
    fn build_post_form_encodes_bracketed_keys() {
        let t = transport();
        let mut params = ParamList::new();
        params.push("tournament[name]", "cup");
        params.flag("tournament[private]", false);
        let req = t.build(HttpMethod::Post, "tournaments.json", params).unwrap();

        assert_eq!(req.url, "http://localhost:3000/tournaments.json");
        assert_eq!(
            req.body.as_deref(),
            Some("tournament%5Bname%5D=cup&tournament%5Bprivate%5D=false")
        );
    }

    #[test]
    fn build_post_without_params_has_no_body() {
        let t = transport();
        let req = t
            .build(HttpMethod::Post, "tournaments/1/start.json", ParamList::new())
            .unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn simple_failure_joins_the_errors_array() {
        let response = HttpResponse {
            status: 422,
            body: r#"{"errors":["name is too long","url is taken"]}"#.to_string(),
        };
        let err = interpret_simple(response).unwrap_err();
        assert_eq!(err.to_string(), "ERROR: name is too long, url is taken");
    }

    #[test]
    fn simple_failure_without_errors_key_falls_back_to_raw_body() {
        let response = HttpResponse {
            status: 500,
            body: "gateway timeout".to_string(),
        };
        let err = interpret_simple(response).unwrap_err();
        assert_eq!(err.to_string(), "ERROR: gateway timeout");
    }

    #[test]
    fn post_401_with_basic_auth_challenge_embeds_the_raw_body() {
        let response = HttpResponse {
            status: 401,
            body: "HTTP Basic: Access denied.".to_string(),
        };
        let err = interpret_post("http://x/tournaments.json", response).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HTTP Basic: Access denied."));
        assert!(msg.contains(USER_ENV_VAR));
        assert!(msg.contains(KEY_ENV_VAR));
    }

    #[test]
    fn post_401_with_json_errors_joins_them() {
        let response = HttpResponse {
            status: 401,
            body: r#"{"errors":["invalid key"]}"#.to_string(),
        };
        let err = interpret_post("http://x/tournaments.json", response).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid key"));
        assert!(!msg.contains("errors"));
    }

    #[test]
    fn post_failure_reports_url_and_raw_body() {
        let response = HttpResponse {
            status: 422,
            body: r#"{"errors":["tournament not found"]}"#.to_string(),
        };
        let err = interpret_post("http://x/tournaments.json", response).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"ERROR: http://x/tournaments.json | {"errors":["tournament not found"]}"#
        );
    }

    #[test]
    fn success_parses_json() {
        let response = HttpResponse {
            status: 200,
            body: r#"{"tournament":{"id":1}}"#.to_string(),
        };
        let value = interpret_post("http://x", response).unwrap();
        assert_eq!(value["tournament"]["id"], 1);
    }

    #[test]
    fn success_with_bad_json_is_a_decode_error() {
        let response = HttpResponse {
            status: 200,
            body: "not json".to_string(),
        };
        let err = interpret_simple(response).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
