//! SARIF report data types (§6, "SARIF report (input/output)").
//!
//! The reporter itself is excluded; this module carries only the schema
//! fragment the core reads (seed locations/code flows for bidirectional
//! targets) and writes (discovered errors, each tagged with a confidence).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SarifRegion {
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: Option<u32>,
    pub end_column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SarifLocation {
    pub artifact_uri: String,
    pub region: SarifRegion,
}

/// One step of a `codeFlows.threadFlows.locations` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadFlowLocation {
    pub location: SarifLocation,
}

/// An ingested `Result` entry (input side).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SarifResult {
    pub locations: Vec<SarifLocation>,
    pub code_flows: Vec<Vec<ThreadFlowLocation>>,
}

/// How sure the engine is that a discovered error is real, attached to the
/// output-side `Result` the core emits per discovered error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SarifFinding {
    pub locations: Vec<SarifLocation>,
    pub code_flows: Vec<Vec<ThreadFlowLocation>>,
    pub confidence: Confidence,
}
