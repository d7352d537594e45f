//! HTTP gateway sink for door events.
//!
//! Events are POSTed as JSON to `{url}/v1/topics/{topic}` with a bearer
//! token. The client itself is only built with the `gateway` feature.

/// Gateway endpoint configuration.
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080`
    pub url: String,
    /// Bearer authentication token
    pub token: String,
    /// Sent as `X-Client-Id`
    pub client_id: String,
}

impl HttpSinkConfig {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            client_id: client_id.into(),
        }
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Endpoint for one topic. Slashes in the topic are kept as path segments.
    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/v1/topics/{}", self.base(), topic.trim_matches('/'))
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base())
    }
}

#[cfg(feature = "gateway")]
pub use client::{BlockingHttpPublisher, HttpPublisher};

#[cfg(feature = "gateway")]
mod client {
    use super::HttpSinkConfig;
    use crate::publish::{DoorEvent, EventPublisher, PublishError};

    /// Async gateway client.
    pub struct HttpPublisher {
        config: HttpSinkConfig,
        client: reqwest::Client,
    }

    impl HttpPublisher {
        pub fn new(config: HttpSinkConfig) -> Result<Self, PublishError> {
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| PublishError::Config(format!("Failed to create HTTP client: {e}")))?;

            Ok(Self { config, client })
        }

        /// Test connection to the gateway.
        pub async fn health(&self) -> Result<bool, PublishError> {
            let response = self
                .client
                .get(self.config.health_url())
                .send()
                .await
                .map_err(|e| PublishError::Network(e.to_string()))?;

            Ok(response.status().is_success())
        }

        pub async fn publish(&self, topic: &str, event: &DoorEvent) -> Result<(), PublishError> {
            let response = self
                .client
                .post(self.config.topic_url(topic))
                .header("Authorization", format!("Bearer {}", self.config.token))
                .header("X-Client-Id", &self.config.client_id)
                .json(event)
                .send()
                .await
                .map_err(|e| PublishError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(PublishError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            Ok(())
        }

        pub fn client_id(&self) -> &str {
            &self.config.client_id
        }
    }

    /// Blocking gateway client for the publish worker thread.
    pub struct BlockingHttpPublisher {
        inner: HttpPublisher,
        runtime: tokio::runtime::Runtime,
    }

    impl BlockingHttpPublisher {
        pub fn new(config: HttpSinkConfig) -> Result<Self, PublishError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| PublishError::Config(format!("Failed to create runtime: {e}")))?;

            Ok(Self {
                inner: HttpPublisher::new(config)?,
                runtime,
            })
        }

        pub fn health(&self) -> Result<bool, PublishError> {
            self.runtime.block_on(self.inner.health())
        }

        pub fn client_id(&self) -> &str {
            self.inner.client_id()
        }
    }

    impl EventPublisher for BlockingHttpPublisher {
        fn publish(&self, topic: &str, event: &DoorEvent) -> Result<(), PublishError> {
            self.runtime.block_on(self.inner.publish(topic, event))
        }
    }
}
