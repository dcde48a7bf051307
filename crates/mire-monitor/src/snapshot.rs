//! Diagnostic snapshot document and writer.
//!
//! The writer owns file path and naming; the monitor only hands it a
//! document. Snapshots are JSON so a terminal state can be diagnosed
//! with nothing but a text editor.

use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use mire_graph::GraphState;
use serde::Serialize;

/// One offending value included in a snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct OffendingValue {
    /// Where the value lives (e.g. `"matter[3]"`, `"weight(0, 2)"`).
    pub location: String,
    /// The value itself.
    pub value: f64,
}

/// One entry of the recent per-tick history ring.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    /// Tick the entry was recorded at.
    pub tick: u64,
    /// Live edge count.
    pub edge_count: usize,
    /// Total matter at that tick.
    pub total_matter: f64,
    /// Total field energy at that tick.
    pub total_field_energy: f64,
    /// Smallest edge weight, if any edges existed.
    pub min_weight: Option<f64>,
}

impl HistoryEntry {
    /// Record an entry from the live state.
    pub fn capture(tick: u64, state: &GraphState) -> Self {
        Self {
            tick,
            edge_count: state.edge_count(),
            total_matter: state.total_matter(),
            total_field_energy: state.total_field_energy(),
            min_weight: state.min_weight(),
        }
    }
}

/// The exported terminal-state document.
#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticSnapshot {
    /// Tick at which the terminal transition happened.
    pub tick: u64,
    /// Terminal condition kind (e.g. `"numerical"`).
    pub condition: String,
    /// Human-readable description of what was detected.
    pub description: String,
    /// Node count of the topology.
    pub node_count: u32,
    /// Edge count of the topology.
    pub edge_count: usize,
    /// Total matter at export time.
    pub total_matter: f64,
    /// Total field energy at export time.
    pub total_field_energy: f64,
    /// Bounded list of offending field values.
    pub offending: Vec<OffendingValue>,
    /// Recent per-tick history, oldest first.
    pub recent_history: Vec<HistoryEntry>,
}

/// Collect up to `limit` offending values from the state.
///
/// Non-finite entries take precedence; when none exist (terminal kinds
/// other than numerical), the smallest-weight edges are included as
/// context instead.
pub fn collect_offending(state: &GraphState, limit: usize) -> Vec<OffendingValue> {
    let mut out = Vec::new();

    for (i, v) in state.matter_slice().iter().enumerate() {
        if !v.is_finite() {
            out.push(OffendingValue {
                location: format!("matter[{i}]"),
                value: *v,
            });
            if out.len() >= limit {
                return out;
            }
        }
    }
    for (key, edge) in state.edges() {
        if !edge.weight.is_finite() {
            out.push(OffendingValue {
                location: format!("weight{key}"),
                value: edge.weight,
            });
        } else if !edge.amplitude.re.is_finite() || !edge.amplitude.im.is_finite() {
            out.push(OffendingValue {
                location: format!("amplitude{key}"),
                value: f64::NAN,
            });
        }
        if out.len() >= limit {
            return out;
        }
    }

    if out.is_empty() {
        let mut weights: Vec<(String, f64)> = state
            .edges()
            .map(|(key, edge)| (format!("weight{key}"), edge.weight))
            .collect();
        weights.sort_by(|a, b| a.1.total_cmp(&b.1));
        out.extend(
            weights
                .into_iter()
                .take(limit)
                .map(|(location, value)| OffendingValue { location, value }),
        );
    }
    out
}

/// Errors from snapshot export.
#[derive(Debug)]
pub enum SnapshotError {
    /// Filesystem failure while creating or writing the file.
    Io(std::io::Error),
    /// JSON serialization failure.
    Serialize(serde_json::Error),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "snapshot io error: {e}"),
            Self::Serialize(e) => write!(f, "snapshot serialize error: {e}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialize(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Writes diagnostic snapshots into a directory it owns.
///
/// File naming is this writer's concern:
/// `mire-terminal-tick<N>-<kind>.json`.
#[derive(Clone, Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// A writer targeting the given directory (created on demand).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize the snapshot to its file, returning the path.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] on filesystem or serialization
    /// failure.
    pub fn write(&self, snapshot: &DiagnosticSnapshot) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "mire-terminal-tick{}-{}.json",
            snapshot.tick, snapshot.condition
        ));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(path)
    }
}
