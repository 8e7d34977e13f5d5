//! HTTP client wrapper for registry queries and tarball downloads.

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::io::Write;

use super::status::classify_status;

/// Thin wrapper around a reqwest `Client`.
///
/// Requests are issued exactly once: a failed lookup or download aborts the
/// operation that asked for it.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let response = response.error_for_status().map_err(classify_status)?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    /// Streams the body of `url` into the writer returned by `create_writer`.
    /// The writer is only created once the server answered successfully.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to start download from {}", url))?;

        let mut response = response.error_for_status().map_err(classify_status)?;

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!("Downloaded {:.2} KB", downloaded_bytes as f64 / 1024.0);

        Ok(downloaded_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpStatusError;

    #[tokio::test]
    async fn test_get_json_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "test", "value": 42}"#)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());

        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct TestResponse {
            name: String,
            value: i32,
        }

        let result: TestResponse = client.get_json(&format!("{}/test", url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.name, "test");
        assert_eq!(result.value, 42);
    }

    #[tokio::test]
    async fn test_get_json_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result: Result<serde_json::Value> = client.get_json(&format!("{}/test", url)).await;

        mock.assert_async().await;
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HttpStatusError>(),
            Some(HttpStatusError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_json_server_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result: Result<serde_json::Value> = client.get_json(&format!("{}/test", url)).await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_json_invalid_body() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/test")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result: Result<serde_json::Value> = client.get_json(&format!("{}/test", url)).await;

        assert!(
            format!("{:#}", result.unwrap_err()).contains("Failed to parse JSON response")
        );
    }

    #[tokio::test]
    async fn test_download_file_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/file.tgz")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let mut sink = Vec::new();
        let bytes = client
            .download_file(&format!("{}/file.tgz", url), || Ok(&mut sink))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 12);
        assert_eq!(sink, b"test content");
    }

    #[tokio::test]
    async fn test_download_file_not_found_never_creates_writer() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/file.tgz")
            .with_status(404)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result = client
            .download_file(&format!("{}/file.tgz", url), || -> Result<std::io::Sink> {
                panic!("writer must not be created for a failed response")
            })
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }
}
