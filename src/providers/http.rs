//! Shared HTTP handling for vendor adapters.
//!
//! Maps transport errors, HTTP status codes and unparseable bodies onto
//! [`ProviderFailure`] so every adapter classifies failures the same way.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::ProviderFailure;

/// Longest error body kept in an `Api` failure message.
const MAX_ERROR_BODY: usize = 512;

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ProviderFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderFailure::Http(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderFailure::RateLimited { retry_after });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderFailure::AuthenticationFailed);
    }

    let body = response
        .text()
        .await
        .map_err(|e| ProviderFailure::Http(e.to_string()))?;

    if !status.is_success() {
        let mut message = body;
        if message.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| message.is_char_boundary(*i))
                .unwrap_or(0);
            message.truncate(cut);
        }
        return Err(ProviderFailure::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderFailure::MalformedResponse(e.to_string()))
}
