//! Severity attached to security findings

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finding severity - maps directly to exit codes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational (exit 0)
    Low,
    /// Suspicious acceptance (exit 0, or 1 if --strict)
    Medium,
    /// Malicious input accepted (exit 2)
    High,
    /// Reserved for findings that expose data (exit 2)
    Critical,
}

impl Severity {
    /// Convert severity to exit code
    ///
    /// - strict=true: Medium becomes exit 1
    /// - strict=false: Medium is exit 0
    #[must_use]
    pub const fn exit_code(self, strict: bool) -> i32 {
        match self {
            Self::Low => 0,
            Self::Medium => {
                if strict {
                    1
                } else {
                    0
                }
            }
            Self::High | Self::Critical => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
