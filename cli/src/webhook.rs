//! Executes `WebhookOperation::Submit` as a multipart POST.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use shared::capabilities::{WebhookError, WebhookRequest, WebhookResponse, WebhookResult};
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = concat!("greenvision/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct WebhookExecutor {
    client: Client,
}

impl WebhookExecutor {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Posts the image and reads the body as text. Non-2xx statuses come back
    /// as `Ok` so the core can word the reply; only transport problems and the
    /// deadline are errors.
    #[instrument(skip_all, fields(url = %request.url, bytes = request.image.len()))]
    pub async fn execute(&self, request: &WebhookRequest) -> WebhookResult {
        let part = Part::bytes(request.image.clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.mime_type)
            .map_err(|e| WebhookError::Other(format!("invalid mime type: {e}")))?;
        let form = Form::new().part(request.field_name.clone(), part);

        let exchange = async {
            let response = self
                .client
                .post(&request.url)
                .multipart(form)
                .send()
                .await
                .map_err(classify)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(classify)?;
            Ok(WebhookResponse::new(status, body))
        };

        match tokio::time::timeout(request.timeout(), exchange).await {
            Ok(Ok(response)) => {
                debug!(status = response.status, "webhook answered");
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "webhook request failed");
                Err(e)
            }
            Err(_) => {
                warn!(after_ms = request.timeout_ms, "webhook timed out");
                Err(WebhookError::Timeout {
                    after_ms: request.timeout_ms,
                })
            }
        }
    }
}

fn classify(e: reqwest::Error) -> WebhookError {
    if e.is_builder() {
        WebhookError::Other(e.to_string())
    } else {
        WebhookError::Network(e.to_string())
    }
}
