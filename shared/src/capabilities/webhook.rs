use std::fmt;
use std::time::Duration;

use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum UrlError {
    #[error("URL cannot be empty")]
    Empty,
    #[error("URL exceeds maximum length of {max} bytes")]
    TooLong { max: usize },
    #[error("invalid URL '{url}': {reason}")]
    Invalid { url: String, reason: String },
}

/// Endpoint URL checked once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: String,
    scheme: String,
    host: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, UrlError> {
        let url = url.into();
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }

        if trimmed.len() > MAX_URL_LENGTH {
            return Err(UrlError::TooLong {
                max: MAX_URL_LENGTH,
            });
        }

        let parsed = Url::parse(trimmed).map_err(|e| UrlError::Invalid {
            url: Self::truncate_url(trimmed),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme().to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(UrlError::Invalid {
                url: Self::truncate_url(trimmed),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| UrlError::Invalid {
                url: Self::truncate_url(trimmed),
                reason: "missing host".to_string(),
            })?
            .to_lowercase();

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(UrlError::Invalid {
                url: Self::truncate_url(trimmed),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        if parsed.fragment().is_some() {
            return Err(UrlError::Invalid {
                url: Self::truncate_url(trimmed),
                reason: "fragments are not allowed".to_string(),
            });
        }

        Ok(Self {
            url: parsed.to_string(),
            scheme,
            host,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Appends `key=value` pairs, percent-encoding each value with the
    /// RFC 3986 unreserved set (spaces become `%20`, never `+`).
    /// An existing query string on the endpoint is kept.
    pub fn with_query(&self, pairs: &[(&str, &str)]) -> String {
        let mut out = self.url.clone();
        let mut separator = if out.contains('?') {
            if out.ends_with('?') || out.ends_with('&') {
                ""
            } else {
                "&"
            }
        } else {
            "?"
        };

        for (key, value) in pairs {
            out.push_str(separator);
            out.push_str(&urlencoding::encode(key));
            out.push('=');
            out.push_str(&urlencoding::encode(value));
            separator = "&";
        }

        out
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            url.to_string()
        } else {
            let mut end = 100;
            while !url.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &url[..end])
        }
    }
}

impl fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// One multipart POST to the recycling webhook. The shell sends `image` as
/// a file part named `field_name` and must give up after `timeout_ms`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub url: String,
    pub field_name: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(with = "serde_bytes")]
    pub image: Vec<u8>,
    pub timeout_ms: u64,
}

impl WebhookRequest {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for WebhookRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookRequest")
            .field("url", &self.url)
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("image_bytes", &self.image.len())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failures. Non-2xx responses are not errors here; they
/// come back as a `WebhookResponse` and the core classifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum WebhookError {
    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed: {0}")]
    Other(String),
}

pub type WebhookResult = Result<WebhookResponse, WebhookError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookOperation {
    Submit(WebhookRequest),
}

impl Operation for WebhookOperation {
    type Output = WebhookResult;
}

#[derive(crux_core::macros::Capability)]
pub struct Webhook<Ev> {
    context: CapabilityContext<WebhookOperation, Ev>,
}

impl<Ev> Webhook<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<WebhookOperation, Ev>) -> Self {
        Self { context }
    }

    /// Sends exactly one request. There is no retry on any outcome.
    pub fn submit<F>(&self, request: WebhookRequest, callback: F)
    where
        F: FnOnce(WebhookResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(WebhookOperation::Submit(request))
                .await;
            ctx.update_app(callback(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_endpoint() {
        let url = ValidatedUrl::new("https://hooks.example.com/webhook/recycle").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host(), "hooks.example.com");
    }

    #[test]
    fn accepts_localhost_for_self_hosted_webhooks() {
        assert!(ValidatedUrl::new("http://localhost:5678/webhook/abc").is_ok());
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert_eq!(ValidatedUrl::new("   "), Err(UrlError::Empty));
        assert!(matches!(
            ValidatedUrl::new("ftp://example.com/hook"),
            Err(UrlError::Invalid { .. })
        ));
        assert!(matches!(
            ValidatedUrl::new("https://user:pw@example.com/hook"),
            Err(UrlError::Invalid { .. })
        ));
        assert!(matches!(
            ValidatedUrl::new("not a url"),
            Err(UrlError::Invalid { .. })
        ));
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(matches!(ValidatedUrl::new(long), Err(UrlError::TooLong { .. })));
    }

    #[test]
    fn query_values_are_percent_encoded() {
        let url = ValidatedUrl::new("https://example.com/hook").unwrap();
        assert_eq!(
            url.with_query(&[("city", "New York"), ("state", "NY")]),
            "https://example.com/hook?city=New%20York&state=NY"
        );
        assert_eq!(
            url.with_query(&[("city", "Coeur d'Alene & Co")]),
            "https://example.com/hook?city=Coeur%20d%27Alene%20%26%20Co"
        );
    }

    #[test]
    fn existing_query_is_kept() {
        let url = ValidatedUrl::new("https://example.com/hook?token=abc").unwrap();
        assert_eq!(
            url.with_query(&[("city", "Austin"), ("state", "TX")]),
            "https://example.com/hook?token=abc&city=Austin&state=TX"
        );
    }

    #[test]
    fn success_is_any_2xx() {
        assert!(WebhookResponse::new(200, "").is_success());
        assert!(WebhookResponse::new(204, "").is_success());
        assert!(!WebhookResponse::new(301, "").is_success());
        assert!(!WebhookResponse::new(500, "boom").is_success());
    }

    #[test]
    fn debug_does_not_dump_image_bytes() {
        let request = WebhookRequest {
            url: "https://example.com/hook".into(),
            field_name: "image".into(),
            file_name: "photo.jpg".into(),
            mime_type: "image/jpeg".into(),
            image: vec![7; 4096],
            timeout_ms: 30_000,
        };
        let rendered = format!("{request:?}");
        assert!(rendered.contains("image_bytes: 4096"));
        assert!(!rendered.contains("7, 7"));
    }
}
