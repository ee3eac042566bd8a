// ============================================================
// Layer 3 — Record Domain Types
// ============================================================
// One row of the note table and the bookkeeping attached to it.
//
// Lifecycle of a record:
//
//   Unprocessed ──► Full | Partial(n) | Fail | Error   (terminal)
//
// A record counts as processed as soon as its response is
// non-empty. The status string is informational only; resume
// decisions never look at it.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

/// Fewest matched section headers an output needs to avoid FAIL
pub const MIN_PARTIAL_SECTIONS: usize = 2;

/// Completion status of one record, as written to the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Not run yet, written as an empty cell
    #[default]
    Unprocessed,
    /// All required sections present
    Full,
    /// Between two and (required - 1) sections present
    Partial(usize),
    /// Fewer than two sections present
    Fail,
    /// The inference call for the record's group failed
    Error,
}

impl Status {
    /// Map a validator score onto a status.
    ///
    ///   valid               → FULL
    ///   2 <= matched        → PARTIAL_{matched}
    ///   otherwise           → FAIL
    pub fn classify(matched: usize, is_valid: bool) -> Self {
        if is_valid {
            Status::Full
        } else if matched >= MIN_PARTIAL_SECTIONS {
            Status::Partial(matched)
        } else {
            Status::Fail
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unprocessed => Ok(()),
            Status::Full        => write!(f, "FULL"),
            Status::Partial(n)  => write!(f, "PARTIAL_{n}"),
            Status::Fail        => write!(f, "FAIL"),
            Status::Error       => write!(f, "ERROR"),
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            ""      => Ok(Status::Unprocessed),
            "FULL"  => Ok(Status::Full),
            "FAIL"  => Ok(Status::Fail),
            "ERROR" => Ok(Status::Error),
            other => match other.strip_prefix("PARTIAL_") {
                Some(n) => Ok(Status::Partial(n.parse()?)),
                None    => bail!("unknown status '{other}'"),
            },
        }
    }
}

/// One row of the source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Row position in the source table (0-based)
    pub index: usize,

    /// Every source column, kept verbatim so the output table
    /// carries the same data as the input
    pub fields: Vec<String>,

    /// The raw free-text note that goes into the prompt body
    pub patient_condition: String,

    /// Generated (cleaned) text, or "[ERROR] ..." for failed groups
    pub response: String,

    pub status: Status,
}

impl Record {
    pub fn new(index: usize, fields: Vec<String>, patient_condition: impl Into<String>) -> Self {
        Self {
            index,
            fields,
            patient_condition: patient_condition.into(),
            response: String::new(),
            status:   Status::Unprocessed,
        }
    }

    /// A record with any response at all is never sent to the model again
    pub fn is_processed(&self) -> bool {
        !self.response.is_empty()
    }
}

/// A row of the error report: `index, prompt, error`.
///
/// `prompt` is looked up by the record's own index, never by
/// its offset inside a filtered batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorRecord {
    pub index:  usize,
    pub prompt: String,
    pub error:  String,
}

impl ErrorRecord {
    pub fn new(index: usize, prompt: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            prompt: prompt.into(),
            error:  error.into(),
        }
    }
}
