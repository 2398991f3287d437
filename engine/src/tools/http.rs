//! HTTP plumbing shared by the tool adapters
//!
//! Every reqwest failure is classified into exactly one `ToolFailure`.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use sdk::ToolFailure;

pub(crate) fn client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn classify(err: &reqwest::Error) -> ToolFailure {
    if err.is_timeout() {
        ToolFailure::Timeout
    } else if err.is_connect() {
        ToolFailure::Connection
    } else if let Some(status) = err.status() {
        ToolFailure::Http {
            status: status.as_u16(),
        }
    } else {
        ToolFailure::Unexpected {
            reason: err.to_string(),
        }
    }
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, ToolFailure> {
    let request = client.get(url).query(query);
    read_json(url, request).await
}

pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &Client,
    url: &str,
    body: &B,
) -> Result<T, ToolFailure> {
    let request = client.post(url).json(body);
    read_json(url, request).await
}

async fn read_json<T: DeserializeOwned>(
    url: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, ToolFailure> {
    let result = async {
        request
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }
    .await;

    result.map_err(|e| {
        let failure = classify(&e);
        warn!(url = %url, failure = failure.label(), "collaborator call failed");
        failure
    })
}
