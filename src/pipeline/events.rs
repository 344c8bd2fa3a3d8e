//! Event Stream Protocol
//!
//! Events a pipeline run emits, in order:
//!
//! ```text
//! started
//! explanation_sent -> explanation -> explanation_chunk*
//! mapping_sent     -> mapping     -> mapping_chunk*
//! diagram_sent     -> diagram     -> diagram_chunk*
//! complete | error
//! ```
//!
//! Each event serializes as one JSON object with a `status` discriminator and
//! is framed on the wire as `data: <json>\n\n`. Nothing follows `complete` or
//! `error`.

use serde::Serialize;
use tokio::sync::mpsc;

use super::stage::StageKind;
use crate::diagram::ClickDirective;
use crate::types::{DiagramError, Result};

pub const STARTED_MESSAGE: &str = "Starting generation process...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationEvent {
    Started { message: String },

    ExplanationSent { message: String },
    Explanation { message: String },
    ExplanationChunk { chunk: String },

    MappingSent { message: String },
    Mapping { message: String },
    MappingChunk { chunk: String },

    DiagramSent { message: String },
    Diagram { message: String },
    DiagramChunk { chunk: String },

    Complete {
        diagram: String,
        explanation: String,
        mapping: String,
        /// Click directives as generated, fragments included
        clicks: Vec<ClickDirective>,
    },

    Error { error: String },
}

impl GenerationEvent {
    pub fn started() -> Self {
        Self::Started {
            message: STARTED_MESSAGE.to_string(),
        }
    }

    /// `<stage>_sent`
    pub fn sent(kind: StageKind, model: &str) -> Self {
        let message = kind.sent_message(model);
        match kind {
            StageKind::Explanation => Self::ExplanationSent { message },
            StageKind::Mapping => Self::MappingSent { message },
            StageKind::Diagram => Self::DiagramSent { message },
        }
    }

    /// `<stage>` (begin)
    pub fn begin(kind: StageKind) -> Self {
        let message = kind.begin_message().to_string();
        match kind {
            StageKind::Explanation => Self::Explanation { message },
            StageKind::Mapping => Self::Mapping { message },
            StageKind::Diagram => Self::Diagram { message },
        }
    }

    /// `<stage>_chunk`
    pub fn chunk(kind: StageKind, chunk: String) -> Self {
        match kind {
            StageKind::Explanation => Self::ExplanationChunk { chunk },
            StageKind::Mapping => Self::MappingChunk { chunk },
            StageKind::Diagram => Self::DiagramChunk { chunk },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Wire name of the event
    pub fn status(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::ExplanationSent { .. } => "explanation_sent",
            Self::Explanation { .. } => "explanation",
            Self::ExplanationChunk { .. } => "explanation_chunk",
            Self::MappingSent { .. } => "mapping_sent",
            Self::Mapping { .. } => "mapping",
            Self::MappingChunk { .. } => "mapping_chunk",
            Self::DiagramSent { .. } => "diagram_sent",
            Self::Diagram { .. } => "diagram",
            Self::DiagramChunk { .. } => "diagram_chunk",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Chunk text, for chunk events
    pub fn chunk_text(&self) -> Option<&str> {
        match self {
            Self::ExplanationChunk { chunk }
            | Self::MappingChunk { chunk }
            | Self::DiagramChunk { chunk } => Some(chunk),
            _ => None,
        }
    }

    /// Frame as a server-sent event
    pub fn to_sse_frame(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Producer side of a run's event stream.
///
/// A closed receiver means the caller went away; every send then fails with
/// `Cancelled` so the run unwinds at its next suspension point.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<GenerationEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<GenerationEvent>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: GenerationEvent) -> Result<()> {
        let status = event.status();
        self.tx
            .send(event)
            .await
            .map_err(|_| DiagramError::Cancelled(format!("receiver dropped before '{}'", status)))
    }

    /// Resolves once the receiver is dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn as_json(event: &GenerationEvent) -> Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn test_status_discriminator() {
        assert_eq!(
            as_json(&GenerationEvent::started()),
            json!({"status": "started", "message": "Starting generation process..."})
        );
        assert_eq!(
            as_json(&GenerationEvent::sent(StageKind::Mapping, "o4-mini")),
            json!({"status": "mapping_sent", "message": "Sending component mapping request to o4-mini..."})
        );
        assert_eq!(
            as_json(&GenerationEvent::chunk(StageKind::Diagram, "A-->B".into())),
            json!({"status": "diagram_chunk", "chunk": "A-->B"})
        );
    }

    #[test]
    fn test_error_shape() {
        assert_eq!(
            as_json(&GenerationEvent::error("Invalid or unclear instructions provided")),
            json!({"status": "error", "error": "Invalid or unclear instructions provided"})
        );
    }

    #[test]
    fn test_status_matches_serialized_tag() {
        let events = [
            GenerationEvent::started(),
            GenerationEvent::sent(StageKind::Explanation, "m"),
            GenerationEvent::begin(StageKind::Explanation),
            GenerationEvent::chunk(StageKind::Explanation, "x".into()),
            GenerationEvent::begin(StageKind::Diagram),
            GenerationEvent::error("e"),
        ];
        for event in &events {
            assert_eq!(as_json(event)["status"], event.status());
        }
    }

    #[test]
    fn test_complete_carries_clicks() {
        let event = GenerationEvent::Complete {
            diagram: "d".into(),
            explanation: "e".into(),
            mapping: "m".into(),
            clicks: crate::diagram::parse_click_directives(r#"click A "src/a.rs#L1""#),
        };
        let value = as_json(&event);
        assert_eq!(value["clicks"], json!([{"node": "A", "path": "src/a.rs#L1"}]));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_sse_framing() {
        let frame = GenerationEvent::chunk(StageKind::Explanation, "line\nbreak".into())
            .to_sse_frame()
            .unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        // embedded newlines are escaped, so the frame stays a single data line
        assert_eq!(frame.matches('\n').count(), 2);
    }

    #[tokio::test]
    async fn test_sink_reports_cancellation() {
        let (tx, rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        drop(rx);

        assert!(sink.is_closed());
        let err = sink.send(GenerationEvent::started()).await.unwrap_err();
        assert!(matches!(err, DiagramError::Cancelled(_)));
    }
}
