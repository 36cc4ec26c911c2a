//! Line-delimited progress frames.
//!
//! Each non-blank line of worker output is one JSON object:
//!
//! ```json
//! {"status": "Downloading layers", "progress": 45, "stage": "downloading layers"}
//! ```
//!
//! `stage` is required. `status` defaults to an empty string and
//! `progress` to 0; fractional progress is rounded and clamped to 0..=100.
//! A stage this host does not know is kept verbatim in `stage_label`.

use ace_protocol::progress_models::{ProgressFrame, Stage};
use serde::Deserialize;

/// Longest slice of an offending line quoted in a diagnostic.
const DIAGNOSTIC_EXCERPT_CHARS: usize = 80;

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLine {
    /// A well-formed frame.
    Frame(ProgressFrame),
    /// A line that could not be decoded, replaced by an error-stage frame.
    ///
    /// The replacement frame is never terminal even though its stage is
    /// `error`.
    Malformed(ProgressFrame),
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    status: String,
    #[serde(default)]
    progress: f64,
    stage: String,
}

/// Parse one line into a frame.
pub fn parse_frame(line: &str) -> Result<ProgressFrame, String> {
    let wire: WireFrame = serde_json::from_str(line).map_err(|e| e.to_string())?;

    if !wire.progress.is_finite() {
        return Err("progress is not a finite number".to_string());
    }
    let progress = wire.progress.round().clamp(0.0, 100.0) as u8;

    Ok(match Stage::from_wire(&wire.stage) {
        Stage::Other => ProgressFrame::unrecognized(wire.status, progress, &wire.stage),
        stage => ProgressFrame::new(wire.status, progress, stage),
    })
}

fn excerpt(line: &str) -> String {
    let mut out: String = line.chars().take(DIAGNOSTIC_EXCERPT_CHARS).collect();
    if line.chars().count() > DIAGNOSTIC_EXCERPT_CHARS {
        out.push('…');
    }
    out
}

/// Longest line accepted by [`LineDecoder::new`].
pub const DEFAULT_LINE_MAX_BYTES: usize = 64 * 1024;

/// Splits a byte stream on `\n` and decodes each complete line.
///
/// Every byte is scanned once. A line longer than the configured maximum
/// is reported as one malformed line and the rest of it, up to the next
/// newline, is dropped unread.
#[derive(Debug)]
pub struct LineDecoder {
    /// The current, incomplete line. Never contains a newline.
    buf: Vec<u8>,
    line_max: usize,
    /// Skipping the tail of an over-long line.
    discarding: bool,
    frames: usize,
    malformed: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_line_max(DEFAULT_LINE_MAX_BYTES)
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_max(line_max: usize) -> Self {
        Self {
            buf: Vec::new(),
            line_max: line_max.max(1),
            discarding: false,
            frames: 0,
            malformed: 0,
        }
    }

    /// Feed bytes; returns every line completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<DecodedLine> {
        let mut decoded = Vec::new();
        let mut rest = bytes;

        while !rest.is_empty() {
            let newline = rest.iter().position(|b| *b == b'\n');

            if self.discarding {
                match newline {
                    Some(pos) => {
                        self.discarding = false;
                        rest = &rest[pos + 1..];
                        continue;
                    }
                    None => break,
                }
            }

            match newline {
                Some(pos) => {
                    if self.buf.len() + pos > self.line_max {
                        self.buf.clear();
                        decoded.push(self.oversized());
                    } else {
                        self.buf.extend_from_slice(&rest[..pos]);
                        let line = std::mem::take(&mut self.buf);
                        decoded.extend(self.decode(&line));
                    }
                    rest = &rest[pos + 1..];
                }
                None => {
                    if self.buf.len() + rest.len() > self.line_max {
                        self.buf.clear();
                        self.discarding = true;
                        decoded.push(self.oversized());
                    } else {
                        self.buf.extend_from_slice(rest);
                    }
                    break;
                }
            }
        }
        decoded
    }

    /// Decode a final line that had no trailing newline.
    pub fn finish(&mut self) -> Option<DecodedLine> {
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        self.decode(&rest)
    }

    /// Well-formed frames seen so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Malformed lines seen so far.
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    fn oversized(&mut self) -> DecodedLine {
        self.malformed += 1;
        DecodedLine::Malformed(ProgressFrame::malformed(format!(
            "Unreadable progress line (longer than {} bytes)",
            self.line_max
        )))
    }

    fn decode(&mut self, raw: &[u8]) -> Option<DecodedLine> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches('\r');
        if line.trim().is_empty() {
            return None;
        }

        match parse_frame(line) {
            Ok(frame) => {
                self.frames += 1;
                Some(DecodedLine::Frame(frame))
            }
            Err(reason) => {
                self.malformed += 1;
                Some(DecodedLine::Malformed(ProgressFrame::malformed(format!(
                    "Unreadable progress line ({reason}): {}",
                    excerpt(line)
                ))))
            }
        }
    }
}
