//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use redrive_config::AwsConfig;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use crate::api::{QueuesApi, StatesApi, TopicsApi};
use crate::error::{Error, JsonErrorResponse, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Content type of the JSON 1.0 protocol.
const AMZ_JSON: &str = "application/x-amz-json-1.0";

/// Header naming the JSON protocol operation.
const AMZ_TARGET: &str = "X-Amz-Target";

/// Client for the orchestrator, queue and notification services.
///
/// One client serves all three failure-handling seams: it implements
/// [`HistorySource`](redrive_core::HistorySource),
/// [`RetryQueue`](redrive_core::RetryQueue) and
/// [`Notifier`](redrive_core::Notifier).
///
/// Requests are unsigned, so there are no default endpoints: every endpoint
/// must be given explicitly and should name a signing proxy or a local
/// emulator.
///
/// # Example
///
/// ```no_run
/// use redrive_client::AwsClient;
///
/// # async fn example() -> redrive_client::Result<()> {
/// let client = AwsClient::builder()
///     .states_endpoint("http://localhost:8083")
///     .sqs_endpoint("http://localhost:4566")
///     .sns_endpoint("http://localhost:4566")
///     .build()?;
///
/// let page = client
///     .states()
///     .get_execution_history("arn:aws:states:us-west-2:1:execution:m:e", None)
///     .await?;
/// println!("{} events", page.events.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AwsClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) states_endpoint: Url,
    pub(crate) sqs_endpoint: Url,
    pub(crate) sns_endpoint: Url,
    pub(crate) timeout: Duration,
}

impl AwsClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Build a client from deployment settings.
    pub fn from_config(config: &AwsConfig) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(endpoint) = &config.states_endpoint {
            builder = builder.states_endpoint(endpoint);
        }
        if let Some(endpoint) = &config.sqs_endpoint {
            builder = builder.sqs_endpoint(endpoint);
        }
        if let Some(endpoint) = &config.sns_endpoint {
            builder = builder.sns_endpoint(endpoint);
        }
        builder.build()
    }

    /// The Step Functions endpoint.
    pub fn states_endpoint(&self) -> &Url {
        &self.inner.states_endpoint
    }

    /// The SQS endpoint.
    pub fn sqs_endpoint(&self) -> &Url {
        &self.inner.sqs_endpoint
    }

    /// The SNS endpoint.
    pub fn sns_endpoint(&self) -> &Url {
        &self.inner.sns_endpoint
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the Step Functions API.
    pub fn states(&self) -> StatesApi {
        StatesApi::new(self.clone())
    }

    /// Access the SQS API.
    pub fn queues(&self) -> QueuesApi {
        QueuesApi::new(self.clone())
    }

    /// Access the SNS API.
    pub fn topics(&self) -> TopicsApi {
        TopicsApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Call a JSON 1.0 protocol operation.
    pub(crate) async fn call_json<T, B>(&self, endpoint: &Url, target: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        debug!(%endpoint, operation = target, "Calling JSON operation");
        let response = self
            .inner
            .http
            .post(endpoint.clone())
            .header(CONTENT_TYPE, AMZ_JSON)
            .header(AMZ_TARGET, target)
            .body(serde_json::to_vec(body)?)
            .timeout(self.inner.timeout)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if status.is_success() {
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            Err(json_error(status.as_u16(), &bytes))
        }
    }

    /// Call a query protocol action, returning the XML response body.
    pub(crate) async fn call_query(&self, endpoint: &Url, params: &[(&str, &str)]) -> Result<String> {
        debug!(%endpoint, action = params.first().map(|(_, v)| *v), "Calling query action");
        let response = self
            .inner
            .http
            .post(endpoint.clone())
            .form(params)
            .timeout(self.inner.timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(query_error(status.as_u16(), &text))
        }
    }
}

impl std::fmt::Debug for AwsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsClient")
            .field("states_endpoint", &self.inner.states_endpoint.as_str())
            .field("sqs_endpoint", &self.inner.sqs_endpoint.as_str())
            .field("sns_endpoint", &self.inner.sns_endpoint.as_str())
            .finish()
    }
}

fn json_error(status: u16, body: &[u8]) -> Error {
    match serde_json::from_slice::<JsonErrorResponse>(body) {
        Ok(err) => Error::Api {
            status,
            code: err.short_code().unwrap_or("unknown").to_string(),
            message: err.message.unwrap_or_else(|| format!("HTTP {status}")),
        },
        Err(_) => Error::Api {
            status,
            code: "unknown".to_string(),
            message: format!("HTTP {status}"),
        },
    }
}

fn query_error(status: u16, body: &str) -> Error {
    Error::Api {
        status,
        code: xml_text(body, "Code").unwrap_or_else(|| "unknown".to_string()),
        message: xml_text(body, "Message").unwrap_or_else(|| format!("HTTP {status}")),
    }
}

/// Text of the first `<tag>` element in a flat XML document, with the
/// predefined entities decoded.
pub(crate) fn xml_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let len = xml[start..].find(&close)?;
    Some(unescape_xml(xml[start..start + len].trim()))
}

/// Decode the five predefined XML entities. `&amp;` goes last so an escaped
/// entity such as `&amp;lt;` stays literal.
fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Builder for creating an [`AwsClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    states_endpoint: Option<String>,
    sqs_endpoint: Option<String>,
    sns_endpoint: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            states_endpoint: None,
            sqs_endpoint: None,
            sns_endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the Step Functions endpoint.
    pub fn states_endpoint(mut self, url: impl Into<String>) -> Self {
        self.states_endpoint = Some(url.into());
        self
    }

    /// Set the SQS endpoint.
    pub fn sqs_endpoint(mut self, url: impl Into<String>) -> Self {
        self.sqs_endpoint = Some(url.into());
        self
    }

    /// Set the SNS endpoint.
    pub fn sns_endpoint(mut self, url: impl Into<String>) -> Self {
        self.sns_endpoint = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    ///
    /// Fails when any endpoint is missing or blank.
    pub fn build(self) -> Result<AwsClient> {
        let states_endpoint = endpoint(self.states_endpoint.as_deref(), "states_endpoint")?;
        let sqs_endpoint = endpoint(self.sqs_endpoint.as_deref(), "sqs_endpoint")?;
        let sns_endpoint = endpoint(self.sns_endpoint.as_deref(), "sns_endpoint")?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/xml"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("redrive-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(AwsClient {
            inner: Arc::new(ClientInner {
                http,
                states_endpoint,
                sqs_endpoint,
                sns_endpoint,
                timeout: self.timeout,
            }),
        })
    }
}

/// Parse a required endpoint, making sure its path ends with a slash.
fn endpoint(raw: Option<&str>, name: &str) -> Result<Url> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Config(format!("{name} is required")))?;
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    Ok(url)
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> ClientBuilder {
        ClientBuilder::new()
            .states_endpoint("http://localhost:8083")
            .sqs_endpoint("http://localhost:4566")
            .sns_endpoint("http://localhost:4566")
    }

    #[test]
    fn test_builder_requires_every_endpoint() {
        let result = ClientBuilder::new().build();
        assert!(matches!(result, Err(Error::Config(ref m)) if m == "states_endpoint is required"));

        let result = local().sqs_endpoint("  ").build();
        assert!(matches!(result, Err(Error::Config(ref m)) if m == "sqs_endpoint is required"));

        let result = ClientBuilder::new()
            .states_endpoint("http://localhost:8083")
            .sqs_endpoint("http://localhost:4566")
            .build();
        assert!(matches!(result, Err(Error::Config(ref m)) if m == "sns_endpoint is required"));
    }

    #[test]
    fn test_builder_normalizes_endpoint() {
        let client = local()
            .states_endpoint("http://localhost:8083/proxy")
            .build()
            .unwrap();
        assert_eq!(
            client.states_endpoint().as_str(),
            "http://localhost:8083/proxy/"
        );
        assert_eq!(client.sqs_endpoint().as_str(), "http://localhost:4566/");
    }

    #[test]
    fn test_builder_rejects_invalid_endpoint() {
        let result = local().sqs_endpoint("not a url").build();
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_from_config_uses_configured_endpoints() {
        let config = AwsConfig {
            states_endpoint: Some("http://127.0.0.1:8083".to_string()),
            sqs_endpoint: Some("http://127.0.0.1:4566".to_string()),
            sns_endpoint: Some("http://127.0.0.1:4575".to_string()),
            ..Default::default()
        };
        let client = AwsClient::from_config(&config).unwrap();
        assert_eq!(client.states_endpoint().as_str(), "http://127.0.0.1:8083/");
        assert_eq!(client.sqs_endpoint().as_str(), "http://127.0.0.1:4566/");
        assert_eq!(client.sns_endpoint().as_str(), "http://127.0.0.1:4575/");
    }

    #[test]
    fn test_from_config_without_endpoints_fails() {
        let result = AwsClient::from_config(&AwsConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_xml_text() {
        let xml = "<ErrorResponse><Error><Code>Throttling</Code><Message> Rate exceeded </Message></Error></ErrorResponse>";
        assert_eq!(xml_text(xml, "Code").as_deref(), Some("Throttling"));
        assert_eq!(xml_text(xml, "Message").as_deref(), Some("Rate exceeded"));
        assert_eq!(xml_text(xml, "MessageId"), None);
    }

    #[test]
    fn test_xml_text_decodes_entities() {
        let xml = "<Error><Message>Invalid parameter: TopicArn &lt;arn:a&amp;b&gt; isn&apos;t &quot;valid&quot;</Message></Error>";
        assert_eq!(
            xml_text(xml, "Message").as_deref(),
            Some("Invalid parameter: TopicArn <arn:a&b> isn't \"valid\"")
        );
        assert_eq!(
            xml_text("<Message>&amp;lt;</Message>", "Message").as_deref(),
            Some("&lt;")
        );
    }

    #[test]
    fn test_query_error_decodes_message() {
        let err = query_error(
            400,
            "<ErrorResponse><Error><Code>InvalidParameter</Code>\
             <Message>Subject &amp; Message too long</Message></Error></ErrorResponse>",
        );
        assert!(matches!(
            err,
            Error::Api { status: 400, ref message, .. } if message == "Subject & Message too long"
        ));
    }

    #[test]
    fn test_query_error_without_body() {
        let err = query_error(503, "");
        assert!(matches!(
            err,
            Error::Api { status: 503, ref code, .. } if code == "unknown"
        ));
    }
}
