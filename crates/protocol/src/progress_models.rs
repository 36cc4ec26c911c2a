//! Structured progress records emitted by long-running workers.
//!
//! Download and fine-tuning workers print one JSON object per line:
//!
//! ```json
//! {"status": "Downloading layer: 2.0 GB (45%)", "progress": 45, "stage": "downloading-layers"}
//! ```
//!
//! Every long-running operation shares this one frame type.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Stage reported by a progress frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Starting,
    PullingManifest,
    DownloadingLayers,
    Verifying,
    WritingManifest,
    PreparingData,
    LoadingTokenizer,
    LoadingModel,
    Training,
    Saving,
    Complete,
    Error,
    /// A stage name this host does not know. The frame is still delivered.
    Other,
}

impl Stage {
    /// Map the stage text a worker wrote onto a known stage.
    ///
    /// Matching ignores case and treats spaces, underscores and hyphens alike,
    /// so `"downloading layers"` and `"downloading-layers"` are the same stage.
    pub fn from_wire(raw: &str) -> Stage {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '_' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "starting" | "initializing" => Stage::Starting,
            "pulling-manifest" => Stage::PullingManifest,
            "downloading-layers" | "downloading" => Stage::DownloadingLayers,
            "verifying" => Stage::Verifying,
            "writing-manifest" => Stage::WritingManifest,
            "preparing-data" => Stage::PreparingData,
            "loading-tokenizer" => Stage::LoadingTokenizer,
            "loading-model" => Stage::LoadingModel,
            "training" => Stage::Training,
            "saving" => Stage::Saving,
            "complete" | "completed" => Stage::Complete,
            "error" | "failed" => Stage::Error,
            _ => Stage::Other,
        }
    }
}

/// How a frame ends an operation, if it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTerminal {
    Success,
    Failure,
}

/// One decoded line of structured worker output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct ProgressFrame {
    /// Human-readable status line.
    pub status: String,

    /// Overall completion, 0 to 100.
    pub progress: u8,

    pub stage: Stage,

    /// The stage text as the worker wrote it, kept when `stage` is `Other`.
    #[serde(default)]
    pub stage_label: Option<String>,
}

impl ProgressFrame {
    pub fn new(status: impl Into<String>, progress: u8, stage: Stage) -> Self {
        Self {
            status: status.into(),
            progress: progress.min(100),
            stage,
            stage_label: None,
        }
    }

    /// Frame for a stage this host does not know, keeping its name.
    ///
    /// An empty status falls back to the stage name so the frame still
    /// says something.
    pub fn unrecognized(status: impl Into<String>, progress: u8, label: &str) -> Self {
        let label = label.trim();
        let mut status = status.into();
        if status.trim().is_empty() {
            status = label.to_string();
        }
        let mut frame = Self::new(status, progress, Stage::Other);
        frame.stage_label = (!label.is_empty()).then(|| label.to_string());
        frame
    }

    /// Frame substituted for a line that could not be decoded.
    pub fn malformed(diagnostic: impl Into<String>) -> Self {
        Self::new(diagnostic, 0, Stage::Error)
    }

    /// The terminal-frame contract.
    ///
    /// `stage: error` is a failure. `stage: complete` is a success, and so is
    /// `progress: 100` on any non-error stage. Everything else is
    /// intermediate.
    pub fn terminal(&self) -> Option<FrameTerminal> {
        match self.stage {
            Stage::Error => Some(FrameTerminal::Failure),
            Stage::Complete => Some(FrameTerminal::Success),
            _ if self.progress >= 100 => Some(FrameTerminal::Success),
            _ => None,
        }
    }
}
