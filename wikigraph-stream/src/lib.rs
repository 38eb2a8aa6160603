pub mod client;
pub mod error;
pub mod message;
pub mod request;
pub mod sse;

pub use client::{DEFAULT_API_URL, StreamClient, StreamCloser, StreamFeed, StreamHandle};
pub use error::StreamError;
pub use message::{LinkEdge, NodeFragment, PageNode, StreamEvent, StreamMessage};
pub use request::CrawlRequest;
