// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing for the collaborator clients.

use std::time::Duration;

use carebridge_core::CarebridgeError;
use serde::de::DeserializeOwned;

/// Builds a reqwest client with the per-call timeout applied.
pub(crate) fn build_client(
    service: &str,
    timeout: Duration,
    verify_tls: bool,
) -> Result<reqwest::Client, CarebridgeError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if !verify_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().map_err(|e| CarebridgeError::Upstream {
        service: service.to_string(),
        message: format!("failed to build HTTP client: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Maps a transport-level reqwest error, distinguishing timeouts.
pub(crate) fn transport_error(service: &str, timeout: Duration, e: reqwest::Error) -> CarebridgeError {
    if e.is_timeout() {
        CarebridgeError::Timeout { duration: timeout }
    } else {
        CarebridgeError::Upstream {
            service: service.to_string(),
            message: format!("request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

/// Checks the status and decodes a JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(
    service: &str,
    response: reqwest::Response,
) -> Result<T, CarebridgeError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CarebridgeError::upstream(
            service,
            format!("returned {status}: {}", truncate(&body, 200)),
        ));
    }
    response.json::<T>().await.map_err(|e| CarebridgeError::Upstream {
        service: service.to_string(),
        message: format!("malformed response: {e}"),
        source: Some(Box::new(e)),
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Joins a base URL and a relative path with exactly one slash.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_normalizes_slashes() {
        assert_eq!(join("http://x/api/", "/Patient"), "http://x/api/Patient");
        assert_eq!(join("http://x/api", "Patient"), "http://x/api/Patient");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
