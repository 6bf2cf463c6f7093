use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::GridSize;

/// Errors produced while decoding a control line
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("control line is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed control frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// A structured message on the control plane.
///
/// On the wire this is a JSON object tagged by `type`:
/// `{"type":"input","data":"ls\n"}` or `{"type":"resize","cols":120,"rows":40}`.
/// Any other `type` decodes to [`ControlFrame::Unknown`] and is skipped by
/// the bridge instead of being treated as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Input {
        #[serde(alias = "text")]
        data: String,
    },
    Resize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cols: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<i64>,
    },
    #[serde(other)]
    Unknown,
}

impl ControlFrame {
    pub fn input(data: impl Into<String>) -> Self {
        Self::Input { data: data.into() }
    }

    pub fn resize(grid: GridSize) -> Self {
        Self::Resize {
            cols: Some(i64::from(grid.cols())),
            rows: Some(i64::from(grid.rows())),
        }
    }

    /// Decode one newline-delimited control record (without the newline)
    pub fn parse_line(line: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(line)?;
        Ok(serde_json::from_str(text.trim())?)
    }

    /// Encode as a single control record, newline included
    pub fn encode_line(&self) -> Result<Vec<u8>, FrameError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Interpret a text message received from a client connection.
    ///
    /// Text shaped like a JSON object that decodes to an `input` or `resize`
    /// frame is taken as that frame. Everything else, including plain
    /// keystrokes and objects of unknown type, is input for the shell.
    pub fn from_client_text(text: &str) -> Self {
        if text.starts_with('{') && text.ends_with('}') {
            if let Ok(frame @ (Self::Input { .. } | Self::Resize { .. })) =
                serde_json::from_str::<Self>(text)
            {
                return frame;
            }
        }
        Self::input(text)
    }

    /// Positive grid requested by a resize frame.
    /// Missing or non-positive dimensions yield `None`.
    pub fn grid(&self) -> Option<GridSize> {
        match self {
            Self::Resize {
                cols: Some(cols),
                rows: Some(rows),
            } => GridSize::from_signed(*cols, *rows),
            _ => None,
        }
    }
}
