use std::thread;
use std::time::Duration;

use serde_json::Value;

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

#[derive(Debug, Clone)]
pub(crate) struct RequestOptions {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

pub(crate) fn request_json_with_retries(
    method: &str,
    url: &str,
    token: Option<&str>,
    body: Option<&Value>,
    options: &RequestOptions,
) -> Result<Value, String> {
    let attempts = options.attempts.max(1);

    for attempt in 1..=attempts {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout_read(options.read_timeout)
            .timeout_write(options.read_timeout)
            .build();

        let mut request = agent.request(method, url).set("Accept", "application/json");
        if let Some(token) = token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match result {
            Ok(response) => return parse_json_body(response),
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let trimmed = response_body.trim();
                let status_error = if trimmed.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    let truncated = trimmed.chars().take(240).collect::<String>();
                    format!("HTTP status {status} ({truncated})")
                };

                if should_retry_http_status(status) && attempt < attempts {
                    thread::sleep(options.retry_delay);
                    continue;
                }

                if should_retry_http_status(status) {
                    return Err(format!(
                        "request failed after {attempts} attempt(s): {status_error}"
                    ));
                }

                return Err(format!("request failed: {status_error}"));
            }
            Err(ureq::Error::Transport(err)) => {
                let transport_error = format!("transport error: {err}");
                if attempt < attempts {
                    thread::sleep(options.retry_delay);
                    continue;
                }
                return Err(format!(
                    "request failed after {attempts} attempt(s): {transport_error}"
                ));
            }
        }
    }

    Err("request failed: exhausted attempts without a concrete error".to_string())
}

fn parse_json_body(response: ureq::Response) -> Result<Value, String> {
    let raw = response
        .into_string()
        .map_err(|err| format!("request failed: response decode failed: {err}"))?;
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&raw)
        .map_err(|err| format!("request failed: response was not valid JSON: {err}"))
}
