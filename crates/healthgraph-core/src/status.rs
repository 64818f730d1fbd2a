use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a monitored entity, lowest to highest. The derived `Ord`
/// follows declaration order, so `Status::Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    Indeterminate,
    Normal,
    Warning,
    Minor,
    Major,
    Critical,
}

/// Fallback severity when a map or reduce function yields nothing.
pub const DEFAULT_SEVERITY: Status = Status::Normal;

/// Lower bound applied to every reduced vertex status.
pub const MIN_SEVERITY: Status = Status::Normal;

impl Status {
    const VALUES: [Status; 6] = [
        Status::Indeterminate,
        Status::Normal,
        Status::Warning,
        Status::Minor,
        Status::Major,
        Status::Critical,
    ];

    /// One severity step up, capped at `Critical`.
    pub fn increased(self) -> Status {
        let i = (self as usize + 1).min(Self::VALUES.len() - 1);
        Self::VALUES[i]
    }

    /// One severity step down, floored at `Indeterminate`.
    pub fn decreased(self) -> Status {
        let i = (self as usize).saturating_sub(1);
        Self::VALUES[i]
    }
}

impl Default for Status {
    fn default() -> Self {
        DEFAULT_SEVERITY
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Indeterminate => "indeterminate",
            Status::Normal => "normal",
            Status::Warning => "warning",
            Status::Minor => "minor",
            Status::Major => "major",
            Status::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "indeterminate" => Ok(Status::Indeterminate),
            "normal" => Ok(Status::Normal),
            "warning" => Ok(Status::Warning),
            "minor" => Ok(Status::Minor),
            "major" => Ok(Status::Major),
            "critical" => Ok(Status::Critical),
            _ => Err(format!("unknown status: {}", s)),
        }
    }
}
