use serde::{Deserialize, Serialize};

/// Lifecycle notices a bridge writes to stderr, one JSON object per line.
/// Any stderr line that does not decode as an event is a log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// PTY allocated and shell spawned
    Ready {
        pid: Option<u32>,
        cols: u16,
        rows: u16,
    },
    /// Shell exited; the bridge is about to exit with `code`
    Exited { code: i32 },
}

impl BridgeEvent {
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_line_round_trip() {
        let event = BridgeEvent::Ready {
            pid: Some(42),
            cols: 80,
            rows: 24,
        };
        let line = event.to_line();
        assert!(line.contains(r#""event":"ready""#));
        assert_eq!(BridgeEvent::parse(&line), Some(event));
    }

    #[test]
    fn test_log_lines_are_not_events() {
        assert_eq!(BridgeEvent::parse("2024-01-01 WARN something"), None);
        assert_eq!(BridgeEvent::parse(r#"{"event":"bogus"}"#), None);
    }
}
