// src/op.rs

//! Aggregated outcomes of batch operations
//!
//! Every multi-item operation (install, update, enable/disable, reload)
//! reports per-item results through [`OpResult`] instead of raising on the
//! first failure: items that completed, items deliberately not acted on
//! (with a reason), and items that failed (with the causing error).

use crate::error::Error;
use std::fmt;

/// Outcome of a multi-item operation, split into ordered result lists
#[derive(Debug)]
pub struct OpResult<T> {
    /// Items that completed successfully
    pub succeeded: Vec<T>,
    /// Items deliberately not acted on, with the reason
    pub skipped: Vec<(T, String)>,
    /// Items that failed, with the causing error
    pub failed: Vec<(T, Error)>,
}

impl<T> Default for OpResult<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> OpResult<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of items accounted for
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl<T: fmt::Display> OpResult<T> {
    /// Render the result verbatim for user-facing reporting: counts plus
    /// per-item reasons for skips and failures
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        if !self.succeeded.is_empty() {
            let items: Vec<String> = self.succeeded.iter().map(|x| x.to_string()).collect();
            lines.push(format!(
                "succeeded ({}): {}",
                self.succeeded.len(),
                items.join(", ")
            ));
        }
        if !self.skipped.is_empty() {
            lines.push(format!("skipped ({}):", self.skipped.len()));
            for (item, reason) in &self.skipped {
                lines.push(format!("  - {}: {}", item, reason));
            }
        }
        if !self.failed.is_empty() {
            lines.push(format!("failed ({}):", self.failed.len()));
            for (item, error) in &self.failed {
                lines.push(format!("  - {}: {}", item, error));
            }
        }
        if lines.is_empty() {
            lines.push("nothing to do".to_string());
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result() {
        let op: OpResult<String> = OpResult::new();
        assert!(op.is_empty());
        assert!(!op.has_failures());
        assert_eq!(op.render(), "nothing to do");
    }

    #[test]
    fn test_counts() {
        let mut op: OpResult<String> = OpResult::new();
        op.succeeded.push("a".to_string());
        op.skipped.push(("b".to_string(), "already up to date".to_string()));
        op.failed.push((
            "c".to_string(),
            Error::NotFoundError("pack `c` is not listed in the hub".to_string()),
        ));

        assert_eq!(op.total(), 3);
        assert!(op.has_failures());

        let rendered = op.render();
        assert!(rendered.contains("succeeded (1): a"));
        assert!(rendered.contains("  - b: already up to date"));
        assert!(rendered.contains("failed (1):"));
        assert!(rendered.contains("  - c: Not found:"));
    }
}
