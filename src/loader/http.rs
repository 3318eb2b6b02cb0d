//! Single-attempt HTTP requests
//!
//! One request, one classification; retrying is the loader's job.

use crate::HarvestError;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Builds the shared HTTP client for one loader context
///
/// Redirects are followed; the final URL is reported back so callers can
/// normalize to it.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Body of a successful response
#[derive(Debug)]
pub struct HttpBody<T> {
    /// URL after redirects
    pub final_url: String,
    pub body: T,
}

/// Fetches a page as text
pub async fn fetch_text(
    client: &Client,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<HttpBody<String>, HarvestError> {
    let response = send(client, url, user_agent, timeout).await?;
    let final_url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| classify(url, e))?;
    Ok(HttpBody { final_url, body })
}

/// Fetches a binary resource (thumbnails, page images)
pub async fn fetch_bytes(
    client: &Client,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<HttpBody<Vec<u8>>, HarvestError> {
    let response = send(client, url, user_agent, timeout).await?;
    let final_url = response.url().to_string();
    let body = response
        .bytes()
        .await
        .map_err(|e| classify(url, e))?;
    Ok(HttpBody {
        final_url,
        body: body.to_vec(),
    })
}

async fn send(
    client: &Client,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Response, HarvestError> {
    let response = client
        .get(url)
        .header(USER_AGENT, user_agent)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify(url, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::debug!("Rate limited by {}", url);
    }

    Err(HarvestError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

fn classify(url: &str, error: reqwest::Error) -> HarvestError {
    if error.is_timeout() {
        HarvestError::Timeout {
            url: url.to_string(),
        }
    } else {
        HarvestError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
