use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::config::AgentWireConfig;
use crate::error::{parse_error_message, AgentWireError};
use crate::events::WireEvent;
use crate::headers::build_headers;
use crate::ndjson::NdjsonDecoder;
use crate::payload::AgentMessageRequest;
use crate::url::normalize_message_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

/// Response body chunks in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, AgentWireError>>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct AgentWireClient {
    http: Client,
    config: AgentWireConfig,
    endpoint: String,
}

#[derive(Debug, Clone, Default)]
pub struct StreamResult {
    pub events: Vec<WireEvent>,
    /// Whether a terminal `done` record was seen.
    pub completed: bool,
}

impl AgentWireClient {
    pub fn new(config: AgentWireConfig) -> Result<Self, AgentWireError> {
        let endpoint = normalize_message_url(&config.base_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(AgentWireError::from)?;
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    pub fn config(&self) -> &AgentWireConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build_headers(&self) -> Result<HeaderMap, AgentWireError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config) {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| AgentWireError::InvalidHeader(format!("invalid key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| AgentWireError::InvalidHeader(format!("invalid value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &AgentMessageRequest,
    ) -> Result<reqwest::RequestBuilder, AgentWireError> {
        let headers = self.build_headers()?;
        Ok(self
            .http
            .post(self.endpoint.as_str())
            .headers(headers)
            .json(request))
    }

    /// Issue the POST and hand back the streamed body.
    ///
    /// Non-2xx responses are read to completion and surfaced as
    /// [`AgentWireError::Status`]. The request is never retried.
    pub async fn open(
        &self,
        request: &AgentMessageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ByteStream, AgentWireError> {
        let pending = self.build_request(request)?.send();
        let response = await_or_cancel(pending, cancellation).await??;

        let status = response.status();
        if !status.is_success() {
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_default();
            return Err(AgentWireError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        tracing::debug!(endpoint = %self.endpoint, %status, "agent stream opened");
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(AgentWireError::from))
            .boxed())
    }

    /// Stream one request, forwarding every decoded record in arrival order.
    pub async fn stream_with_handler<F>(
        &self,
        request: &AgentMessageRequest,
        cancellation: Option<&CancellationSignal>,
        on_event: F,
    ) -> Result<(), AgentWireError>
    where
        F: FnMut(WireEvent),
    {
        let body = self.open(request, cancellation).await?;
        decode_body(body, cancellation, on_event).await?;
        Ok(())
    }

    pub async fn stream(
        &self,
        request: &AgentMessageRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, AgentWireError> {
        let mut result = StreamResult::default();
        self.stream_with_handler(request, cancellation, |event| {
            if matches!(event, WireEvent::Done { .. }) {
                result.completed = true;
            }
            result.events.push(event);
        })
        .await?;

        Ok(result)
    }
}

/// Decode `body` to its end, forwarding every record in arrival order.
///
/// Returns the number of records forwarded. A final unterminated line is
/// flushed unless the stream was cancelled.
pub async fn decode_body<F>(
    mut body: ByteStream,
    cancellation: Option<&CancellationSignal>,
    mut on_event: F,
) -> Result<usize, AgentWireError>
where
    F: FnMut(WireEvent),
{
    let mut decoder = NdjsonDecoder::default();
    let mut forwarded = 0;

    while let Some(chunk) = await_or_cancel(body.next(), cancellation).await? {
        for event in decoder.feed(&chunk?) {
            on_event(event);
            forwarded += 1;
        }
    }

    if is_cancelled(cancellation) {
        return Err(AgentWireError::Cancelled);
    }
    if let Some(event) = decoder.finish() {
        on_event(event);
        forwarded += 1;
    }

    Ok(forwarded)
}

pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Await `future`, giving up with [`AgentWireError::Cancelled`] once the
/// signal flips.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, AgentWireError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(AgentWireError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(AgentWireError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_rejects_blank_base_url() {
        let error = AgentWireClient::new(AgentWireConfig::new("  "))
            .expect_err("blank base URL should be rejected");
        assert!(matches!(error, AgentWireError::InvalidBaseUrl(_)));
    }

    fn scripted_body(chunks: Vec<Result<Vec<u8>, AgentWireError>>) -> ByteStream {
        futures_util::stream::iter(chunks).boxed()
    }

    #[tokio::test]
    async fn decode_body_forwards_records_and_flushes_tail() {
        let body = scripted_body(vec![
            Ok(b"{\"type\":\"delta\",\"delta\":\"Hi\"}\n{\"type\":\"do".to_vec()),
            Ok(b"ne\"}".to_vec()),
        ]);
        let mut names = Vec::new();

        let forwarded = decode_body(body, None, |event| names.push(event.type_name().to_string()))
            .await
            .expect("body decodes");

        assert_eq!(forwarded, 2);
        assert_eq!(names, vec!["delta", "done"]);
    }

    #[tokio::test]
    async fn decode_body_stops_at_transport_error() {
        let body = scripted_body(vec![
            Ok(b"{\"type\":\"assistant_output_start\"}\n".to_vec()),
            Err(AgentWireError::Cancelled),
            Ok(b"{\"type\":\"done\"}\n".to_vec()),
        ]);
        let mut seen = 0;

        let result = decode_body(body, None, |_| seen += 1).await;

        assert!(matches!(result, Err(AgentWireError::Cancelled)));
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn await_or_cancel_short_circuits_when_already_cancelled() {
        let cancel: CancellationSignal = Arc::new(AtomicBool::new(true));
        let result = await_or_cancel(std::future::pending::<()>(), Some(&cancel)).await;
        assert!(matches!(result, Err(AgentWireError::Cancelled)));
    }
}
