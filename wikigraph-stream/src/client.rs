use crate::error::{Result, StreamError};
use crate::message::StreamEvent;
use crate::request::CrawlRequest;
use crate::sse::SseDecoder;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Default crawler API address.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Suggestion queries shorter than this never reach the server.
pub const MIN_SUGGESTION_QUERY: usize = 2;

/// Receiving end of one open event stream.
///
/// Closing is idempotent and takes effect immediately: once `close` returns,
/// `next` yields `None` even if events are still buffered.
#[derive(Debug)]
pub struct StreamHandle {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    closer: CancellationToken,
}

/// Detached close switch for a [`StreamHandle`] that has been moved elsewhere.
#[derive(Debug, Clone)]
pub struct StreamCloser(CancellationToken);

impl StreamCloser {
    pub fn close(&self) {
        self.0.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Producing end paired with a [`StreamHandle`].
#[derive(Debug, Clone)]
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<StreamEvent>,
    closer: CancellationToken,
}

impl StreamHandle {
    /// Create a connected feed/handle pair.
    pub fn channel() -> (StreamFeed, StreamHandle) {
        let (tx, events) = mpsc::unbounded_channel();
        let closer = CancellationToken::new();
        (
            StreamFeed {
                tx,
                closer: closer.clone(),
            },
            StreamHandle { events, closer },
        )
    }

    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    pub fn closer(&self) -> StreamCloser {
        StreamCloser(self.closer.clone())
    }

    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.closer.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.closer.cancelled() => None,
            event = self.events.recv() => event,
        }
    }
}

impl StreamFeed {
    /// Deliver an event. Returns `false` once the handle side is gone or closed.
    pub fn send(&self, event: StreamEvent) -> bool {
        if self.closer.is_cancelled() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled() || self.tx.is_closed()
    }

    pub async fn closed(&self) {
        tokio::select! {
            _ = self.closer.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

#[derive(Deserialize)]
struct SuggestionResponse {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Deserialize)]
struct Suggestion {
    title: String,
}

/// HTTP client for the crawler API.
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl StreamClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, 10)
    }

    /// `timeout_secs` bounds connecting and the one-shot `stop`/`suggest`
    /// calls. The event stream itself has no total timeout.
    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(concat!("wikigraph/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(timeout_secs.max(1)))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Full URL of the streaming crawl request.
    pub fn scrape_url(&self, request: &CrawlRequest) -> Result<Url> {
        let mut url = self.endpoint("api/scrape")?;
        url.query_pairs_mut().extend_pairs(request.query_pairs());
        Ok(url)
    }

    /// Open one event stream for `request`.
    ///
    /// The connection runs on a spawned task and feeds the returned handle;
    /// closing the handle drops the connection.
    pub fn open(&self, request: &CrawlRequest) -> StreamHandle {
        let (feed, handle) = StreamHandle::channel();

        match self.scrape_url(request) {
            Ok(url) => {
                info!("Opening crawl stream for {}", request);
                tokio::spawn(pump(self.http.clone(), url, feed));
            }
            Err(e) => {
                feed.send(StreamEvent::Transport(e.to_string()));
            }
        }

        handle
    }

    /// Ask the server to stop whatever crawl it is running.
    pub async fn stop(&self) -> Result<()> {
        let url = self.endpoint("api/scrape/stop")?;
        debug!("Sending stop signal to {}", url);

        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StreamError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// Candidate article titles for a partial query.
    pub async fn suggest(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim();
        if query.chars().count() < MIN_SUGGESTION_QUERY {
            return Ok(Vec::new());
        }

        let mut url = self.endpoint("api/search")?;
        url.query_pairs_mut().append_pair("q", query);

        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StreamError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let parsed: SuggestionResponse = serde_json::from_str(&body)
            .map_err(|e| StreamError::Malformed(e.to_string()))?;

        Ok(parsed.suggestions.into_iter().map(|s| s.title).collect())
    }
}

/// Read one streaming response and forward classified events until a terminal
/// event, an error, or the handle closing.
async fn pump(http: Client, url: Url, feed: StreamFeed) {
    let response = tokio::select! {
        _ = feed.closed() => {
            debug!("Stream closed before the request was answered");
            return;
        }
        response = http.get(url).header(ACCEPT, "text/event-stream").send() => response,
    };

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            warn!("Crawl stream request failed: {}", e);
            feed.send(StreamEvent::Transport(e.to_string()));
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        warn!("Crawl stream rejected with status {}", status);
        feed.send(StreamEvent::Transport(
            StreamError::Status(status).to_string(),
        ));
        return;
    }

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            _ = feed.closed() => {
                debug!("Stream closed by client");
                return;
            }
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for frame in decoder.push(&bytes) {
                    if forward(&feed, frame) {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                warn!("Crawl stream interrupted: {}", e);
                feed.send(StreamEvent::Transport(e.to_string()));
                return;
            }
            None => {
                if let Some(frame) = decoder.finish()
                    && forward(&feed, frame)
                {
                    return;
                }
                feed.send(StreamEvent::Transport(
                    "stream ended before completion".to_string(),
                ));
                return;
            }
        }
    }
}

/// Returns true when the pump should stop.
fn forward(feed: &StreamFeed, frame: Result<String>) -> bool {
    let event = match frame {
        Ok(payload) => StreamEvent::from_payload(&payload),
        Err(e) => StreamEvent::Malformed(e.to_string()),
    };
    let terminal = event.is_terminal();
    !feed.send(event) || terminal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{LinkEdge, PageNode, StreamMessage};

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = StreamClient::new("http://crawler.internal/prefix").unwrap();
        let request = CrawlRequest::new("Moth", 2, 10).unwrap();
        let url = client.scrape_url(&request).unwrap();
        assert_eq!(url.path(), "/prefix/api/scrape");
        assert_eq!(url.query(), Some("page=Moth&depth=2&max_pages=10"));
    }

    #[test]
    fn test_scrape_url_encodes_page() {
        let client = StreamClient::new(DEFAULT_API_URL).unwrap();
        let request = CrawlRequest::new("Fergana (moth)", 1, 5).unwrap();
        let url = client.scrape_url(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/scrape?page=Fergana+%28moth%29&depth=1&max_pages=5"
        );
    }

    #[tokio::test]
    async fn test_closed_handle_yields_nothing() {
        let (feed, mut handle) = StreamHandle::channel();
        let node = StreamEvent::Message(StreamMessage::Node(crate::message::NodeFragment {
            node: PageNode::new("A", "A", 0),
            edges: vec![LinkEdge::new("A", "B")],
            progress: 1,
            total: 2,
        }));

        assert!(feed.send(node.clone()));
        let closer = handle.closer();
        closer.close();
        handle.close();

        assert!(handle.is_closed());
        assert!(handle.next().await.is_none());
        assert!(!feed.send(node));
        assert!(feed.is_closed());
    }

    #[tokio::test]
    async fn test_handle_delivers_in_order() {
        let (feed, mut handle) = StreamHandle::channel();
        feed.send(StreamEvent::Transport("first".to_string()));
        feed.send(StreamEvent::Malformed("second".to_string()));

        assert_eq!(
            handle.next().await,
            Some(StreamEvent::Transport("first".to_string()))
        );
        assert_eq!(
            handle.next().await,
            Some(StreamEvent::Malformed("second".to_string()))
        );
    }
}
