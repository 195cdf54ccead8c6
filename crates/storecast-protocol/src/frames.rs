//! Frame types for the event stream.

/// Comment text sent as a keep-alive.
pub const KEEPALIVE_COMMENT: &str = "keepalive";

/// One event-stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A dispatched event.
    Event {
        /// Optional event name (`event:` field).
        event: Option<String>,
        /// Optional last-event ID (`id:` field).
        id: Option<String>,
        /// Event data; one `data:` line per line of text.
        data: String,
    },

    /// A comment line, ignored by clients.
    Comment(String),
}

impl Frame {
    /// Create an unnamed event carrying `data`.
    #[must_use]
    pub fn data(data: impl Into<String>) -> Self {
        Frame::Event {
            event: None,
            id: None,
            data: data.into(),
        }
    }

    /// Create a keep-alive comment.
    #[must_use]
    pub fn keepalive() -> Self {
        Frame::Comment(KEEPALIVE_COMMENT.to_string())
    }

    /// Get the event data, if this is an event.
    #[must_use]
    pub fn data_str(&self) -> Option<&str> {
        match self {
            Frame::Event { data, .. } => Some(data),
            Frame::Comment(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_helpers() {
        let frame = Frame::data("[]");
        assert_eq!(
            frame,
            Frame::Event {
                event: None,
                id: None,
                data: "[]".into(),
            }
        );
        assert_eq!(frame.data_str(), Some("[]"));

        let keepalive = Frame::keepalive();
        assert_eq!(keepalive, Frame::Comment("keepalive".into()));
        assert_eq!(keepalive.data_str(), None);
    }
}
