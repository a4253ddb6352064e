//! Streaming events for completion providers.
//!
//! [`StreamEvent`] represents one item of a server-streamed completion,
//! bridging the provider transport to the use-case layer.

/// An event in a streaming completion response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text.
    Delta(String),
    /// Explicit end of stream.
    Completed,
    /// A transport or decoding error that ends the stream.
    Error(String),
}

impl StreamEvent {
    /// Returns the text fragment if this is a Delta event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed | StreamEvent::Error(_))
    }
}
