use anyhow::{Context, Result, ensure};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Create the HTTP client used for all router requests
///
/// Every request is bounded by `timeout`, so a hung router can never stall
/// the control loop.
pub fn router_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .context("failed to create router HTTP client")
}

/// Handle HTTP response by checking status and extracting body
///
/// The router reports every kind of failure (missing session, bad
/// credentials, busy) with a non-200 status, so only `200 OK` counts as
/// success.
///
/// # Arguments
/// * `res` - The HTTP response to handle
/// * `context_msg` - Context message describing the request (e.g., "GET status page")
///
/// # Returns
/// * `Ok(String)` - The response body if the status is `200 OK`
/// * `Err` - If the status is anything else or reading the body fails
pub async fn handle_http_response(res: Response, context_msg: &str) -> Result<String> {
    let status = res.status();

    ensure!(
        status == StatusCode::OK,
        "{context_msg} failed with status {status}"
    );

    res.text().await.context("failed to read response body")
}
