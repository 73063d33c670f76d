//! Question/answer exchange with one controller.

use std::future::Future;
use std::time::Duration;

use tracing::trace;

/// Default CGI endpoint of the Mk5s Touch web interface.
pub const DEFAULT_CGI_PATH: &str = "/cgi-bin/mkv.cgi";

/// Transport errors. All of them are transient: the next cycle retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Device unreachable: {0}")]
    Unreachable(String),

    #[error("Device answered with HTTP status {0}")]
    Status(u16),
}

/// A way of asking a controller for register values.
///
/// One call is one request/response exchange; implementations never retry.
pub trait DeviceClient: Send + Sync {
    /// Ask `host` for `ids` and return the raw answer text.
    fn query(
        &self,
        host: &str,
        timeout: Duration,
        ids: &[String],
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Build the question for a list of register ids: the ids without their
/// dots, concatenated.
///
/// # Example
/// ```
/// use mqtt_bridge_mkv::client::question_string;
///
/// assert_eq!(question_string(["3002.01", "3002.2A"]), "30020130022a");
/// ```
pub fn question_string<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut question = String::new();
    for id in ids {
        question.extend(
            id.as_ref()
                .chars()
                .filter(|c| *c != '.')
                .map(|c| c.to_ascii_lowercase()),
        );
    }
    question
}

/// [`DeviceClient`] speaking the controller's HTTP CGI protocol.
///
/// The question is POSTed as the `QUESTION` form field; the answer is the
/// response body.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    http: reqwest::Client,
    path: String,
}

impl Default for HttpDeviceClient {
    fn default() -> Self {
        Self::new(DEFAULT_CGI_PATH)
    }
}

impl HttpDeviceClient {
    /// Create a client posting to `path` on every host.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        Self {
            http: reqwest::Client::new(),
            path,
        }
    }

    /// Endpoint URL for a host. Hosts without a scheme use plain HTTP.
    pub fn url(&self, host: &str) -> String {
        let host = host.trim().trim_end_matches('/');
        if host.contains("://") {
            format!("{}{}", host, self.path)
        } else {
            format!("http://{}{}", host, self.path)
        }
    }

    fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(timeout)
        } else if let Some(status) = error.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Unreachable(error.to_string())
        }
    }
}

impl DeviceClient for HttpDeviceClient {
    async fn query(
        &self,
        host: &str,
        timeout: Duration,
        ids: &[String],
    ) -> Result<String, TransportError> {
        let url = self.url(host);
        let question = question_string(ids);
        trace!(url = %url, question = %question, "Querying device");

        let response = self
            .http
            .post(&url)
            .form(&[("QUESTION", question.as_str())])
            .timeout(timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Self::classify(e, timeout))?;

        response
            .text()
            .await
            .map_err(|e| Self::classify(e, timeout))
    }
}
