//! HTTP Client Factory
//!
//! Builds the shared reqwest client and sends provider requests with the
//! provider's auth convention applied.

use tracing::debug;

use crate::provider::{parse_http_error, parse_retry_after, with_retry_after};
use crate::types::{AuthStyle, LlmError, LlmResult, ProviderDescriptor};

/// Build a `reqwest::Client`, optionally routed through an outbound proxy.
///
/// - `Some(url)` -> every request goes through the proxy (http, https or socks5)
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
pub fn build_http_client(proxy: Option<&str>) -> LlmResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    match proxy {
        Some(url) => {
            let p = reqwest::Proxy::all(url).map_err(|e| LlmError::InvalidRequest {
                message: format!("invalid proxy URL '{}': {}", url, e),
            })?;
            builder = builder.proxy(p);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    builder.build().map_err(|e| LlmError::NetworkError {
        message: format!("failed to build HTTP client: {}", e),
    })
}

/// Attach the API key according to the provider's auth style.
pub fn apply_auth(
    request: reqwest::RequestBuilder,
    auth: &AuthStyle,
    api_key: &str,
) -> reqwest::RequestBuilder {
    match auth {
        AuthStyle::Bearer => request.bearer_auth(api_key),
        AuthStyle::Header(name) => request.header(name.as_str(), api_key),
        AuthStyle::Query(name) => request.query(&[(name.as_str(), api_key)]),
    }
}

fn transport_error(err: reqwest::Error, descriptor: &ProviderDescriptor) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            timeout_ms: descriptor.timeout_ms,
        }
    } else {
        LlmError::NetworkError {
            message: format!("{}: {}", descriptor.name, err),
        }
    }
}

/// POST a JSON body and return the raw response text of a 2xx reply.
///
/// Non-2xx replies are classified with [`parse_http_error`]. The call carries
/// the provider's timeout so an abandoned socket never outlives it.
pub async fn post_json(
    client: &reqwest::Client,
    descriptor: &ProviderDescriptor,
    body: &serde_json::Value,
    api_key: &str,
) -> LlmResult<String> {
    let url = descriptor.resolved_endpoint();
    let mut request = client
        .post(&url)
        .header("Content-Type", "application/json")
        .timeout(descriptor.timeout())
        .json(body);
    for (name, value) in &descriptor.extra_headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request = apply_auth(request, &descriptor.auth, api_key);

    debug!(provider = %descriptor.name, model = %descriptor.model, "Sending completion request");

    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, descriptor))?;

    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body_text = response
        .text()
        .await
        .map_err(|e| transport_error(e, descriptor))?;

    if !(200..300).contains(&status) {
        return Err(with_retry_after(
            parse_http_error(status, &body_text, &descriptor.name),
            retry_after,
        ));
    }

    Ok(body_text)
}
