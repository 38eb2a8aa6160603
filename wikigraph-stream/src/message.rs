use serde::{Deserialize, Serialize};

/// A crawled page: one vertex of the graph, tagged with its BFS depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub depth: u32,
}

impl PageNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, depth: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            depth,
        }
    }

    /// Title shown next to the node. Article slugs use `_` for spaces.
    pub fn display_label(&self) -> String {
        let raw = if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        };
        raw.replace('_', " ")
    }
}

/// A hyperlink discovered on `source` pointing at `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source: String,
    pub target: String,
}

impl LinkEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Payload of a `node` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFragment {
    pub node: PageNode,
    pub edges: Vec<LinkEdge>,
    pub progress: usize,
    pub total: usize,
}

/// A protocol-level message from the crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Node(NodeFragment),
    Complete,
    Busy { message: String },
    Error { message: String },
}

/// Everything a stream handle can deliver.
///
/// `Transport` and `Malformed` are produced locally and are kept apart from a
/// server-reported `Error` message so callers can tell who failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Message(StreamMessage),
    Transport(String),
    Malformed(String),
}

impl StreamEvent {
    /// True when nothing more will follow this event on the same stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Message(StreamMessage::Node(_)))
    }

    pub fn from_payload(payload: &str) -> Self {
        parse_payload(payload)
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedPayload {
    Node {
        node: PageNode,
        #[serde(default)]
        edges: Vec<LinkEdge>,
        #[serde(default)]
        progress: usize,
        #[serde(default)]
        total: usize,
    },
    Complete {},
    Busy {
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        #[serde(default, alias = "error")]
        message: Option<String>,
    },
}

// The crawler's exception handler emits `{"error": "..."}` with no type tag.
#[derive(Deserialize)]
struct UntaggedError {
    error: String,
}

const MALFORMED_EXCERPT: usize = 120;

/// Classify one decoded `data:` payload.
pub fn parse_payload(payload: &str) -> StreamEvent {
    match serde_json::from_str::<TaggedPayload>(payload) {
        Ok(TaggedPayload::Node {
            node,
            edges,
            progress,
            total,
        }) => StreamEvent::Message(StreamMessage::Node(NodeFragment {
            node,
            edges,
            progress,
            total,
        })),
        Ok(TaggedPayload::Complete {}) => StreamEvent::Message(StreamMessage::Complete),
        Ok(TaggedPayload::Busy { message }) => StreamEvent::Message(StreamMessage::Busy {
            message: message.unwrap_or_else(|| "Another crawl is in progress".to_string()),
        }),
        Ok(TaggedPayload::Error { message }) => StreamEvent::Message(StreamMessage::Error {
            message: message.unwrap_or_else(|| "Unknown server error".to_string()),
        }),
        Err(tagged_err) => match serde_json::from_str::<UntaggedError>(payload) {
            Ok(UntaggedError { error }) => {
                StreamEvent::Message(StreamMessage::Error { message: error })
            }
            Err(_) => {
                let excerpt: String = payload.chars().take(MALFORMED_EXCERPT).collect();
                StreamEvent::Malformed(format!("{} in payload {:?}", tagged_err, excerpt))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_message() {
        let payload = r#"{"type":"node","node":{"id":"Moth","label":"Moth","depth":1},
            "edges":[{"source":"Insect","target":"Moth"}],"progress":2,"total":50}"#;

        match parse_payload(payload) {
            StreamEvent::Message(StreamMessage::Node(fragment)) => {
                assert_eq!(fragment.node, PageNode::new("Moth", "Moth", 1));
                assert_eq!(fragment.edges, vec![LinkEdge::new("Insect", "Moth")]);
                assert_eq!(fragment.progress, 2);
                assert_eq!(fragment.total, 50);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_node_without_edges() {
        let payload = r#"{"type":"node","node":{"id":"Root","label":"Root","depth":0}}"#;
        let event = parse_payload(payload);
        assert!(matches!(
            event,
            StreamEvent::Message(StreamMessage::Node(ref f)) if f.edges.is_empty()
        ));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_parse_complete_ignores_extra_fields() {
        let event = parse_payload(r#"{"type":"complete","total":12}"#);
        assert_eq!(event, StreamEvent::Message(StreamMessage::Complete));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_parse_busy() {
        let event = parse_payload(r#"{"type":"busy","message":"Another scrape is in progress"}"#);
        assert_eq!(
            event,
            StreamEvent::Message(StreamMessage::Busy {
                message: "Another scrape is in progress".to_string()
            })
        );
    }

    #[test]
    fn test_parse_tagged_and_untagged_errors() {
        let tagged = parse_payload(r#"{"type":"error","message":"page not found"}"#);
        let untagged = parse_payload(r#"{"error":"page not found"}"#);
        let expected = StreamEvent::Message(StreamMessage::Error {
            message: "page not found".to_string(),
        });
        assert_eq!(tagged, expected);
        assert_eq!(untagged, expected);
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(parse_payload("{not json"), StreamEvent::Malformed(_)));
        assert!(matches!(
            parse_payload(r#"{"type":"teleport"}"#),
            StreamEvent::Malformed(_)
        ));
    }

    #[test]
    fn test_display_label_replaces_underscores() {
        assert_eq!(
            PageNode::new("Fergana_(moth)", "Fergana_(moth)", 0).display_label(),
            "Fergana (moth)"
        );
        assert_eq!(PageNode::new("Lepidoptera", "", 1).display_label(), "Lepidoptera");
    }
}
