//! Command segmentation and per-phase command collection.
//!
//! Commands that expect a question from the device carry inline markers:
//!
//! ```text
//! save#Are you sure:y;#Overwrite:yes;
//! ```
//!
//! Everything before the first `#` is sent, then every `#expected:answer;`
//! pair is answered in order when `expected` shows up in the device output.
//! Plain commands between such lines are batched together.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{DeviceSettings, expand_tilde};
use crate::error::ConnectorError;

static EXCHANGE_MARKER: Lazy<Regex> = Lazy::new(|| match Regex::new(r"#(.+?):(.+?);") {
    Ok(re) => re,
    Err(err) => panic!("invalid EXCHANGE_MARKER regex: {err}"),
});

/// One expected question and the answer to send when it appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Substring looked up in the latest device output.
    pub expect: String,
    pub answer: String,
}

/// A unit of work sent to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    /// Plain commands sent as one batch.
    Ordinary(Vec<String>),
    /// A command that needs answers to follow-up questions.
    Interactive {
        /// The raw line including its markers.
        raw: String,
        /// Text sent to the device.
        command: String,
        exchanges: Vec<Exchange>,
    },
}

impl Segment {
    /// The input lines this segment was built from.
    pub fn literals(&self) -> Vec<&str> {
        match self {
            Segment::Ordinary(commands) => commands.iter().map(String::as_str).collect(),
            Segment::Interactive { raw, .. } => vec![raw.as_str()],
        }
    }
}

/// The ordered segments of one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSet {
    segments: Vec<Segment>,
}

impl CommandSet {
    /// Splits raw commands into ordinary batches and interactive commands.
    ///
    /// Plain lines accumulate into a pending batch. A line carrying markers
    /// flushes the pending batch, then becomes its own interactive segment.
    pub fn segment<S: AsRef<str>>(commands: &[S]) -> Self {
        let mut segments = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for line in commands {
            let line = line.as_ref();
            let exchanges: Vec<Exchange> = EXCHANGE_MARKER
                .captures_iter(line)
                .map(|caps| Exchange {
                    expect: caps[1].to_string(),
                    answer: caps[2].to_string(),
                })
                .collect();

            if exchanges.is_empty() {
                pending.push(line.to_string());
                continue;
            }

            if !pending.is_empty() {
                segments.push(Segment::Ordinary(std::mem::take(&mut pending)));
            }
            let command = line.split('#').next().unwrap_or_default().to_string();
            segments.push(Segment::Interactive {
                raw: line.to_string(),
                command,
                exchanges,
            });
        }

        if !pending.is_empty() {
            segments.push(Segment::Ordinary(pending));
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All input lines, in input order.
    pub fn literals(&self) -> Vec<&str> {
        self.segments.iter().flat_map(Segment::literals).collect()
    }
}

/// One of the three command phases of a host run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    Config,
    After,
}

impl Phase {
    /// Key used for this phase in settings and in result output.
    pub fn key(self) -> &'static str {
        match self {
            Phase::Before => "cmds_before",
            Phase::Config => "conf_cmds",
            Phase::After => "cmds_after",
        }
    }
}

/// Segmented commands of every phase for one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseCommands {
    pub before: CommandSet,
    pub config: CommandSet,
    pub after: CommandSet,
}

impl PhaseCommands {
    /// Collects inline lists and command files of every phase, then segments them.
    ///
    /// File commands are appended after inline commands of the same phase.
    /// File lines are right-trimmed and lines starting with `#` are skipped.
    pub async fn collect(settings: &DeviceSettings) -> Result<Self, ConnectorError> {
        let before =
            phase_lines(&settings.cmds_before, settings.cmds_before_file.as_deref()).await?;
        let config = phase_lines(&settings.conf_cmds, settings.conf_cmds_file.as_deref()).await?;
        let after = phase_lines(&settings.cmds_after, settings.cmds_after_file.as_deref()).await?;

        Ok(Self {
            before: CommandSet::segment(&before),
            config: CommandSet::segment(&config),
            after: CommandSet::segment(&after),
        })
    }

    pub fn get(&self, phase: Phase) -> &CommandSet {
        match phase {
            Phase::Before => &self.before,
            Phase::Config => &self.config,
            Phase::After => &self.after,
        }
    }
}

async fn phase_lines(
    inline: &[String],
    file: Option<&Path>,
) -> Result<Vec<String>, ConnectorError> {
    let mut lines = inline.to_vec();
    if let Some(file) = file {
        lines.extend(read_command_file(&expand_tilde(file)).await?);
    }
    Ok(lines)
}

async fn read_command_file(path: &Path) -> Result<Vec<String>, ConnectorError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConnectorError::CommandFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
