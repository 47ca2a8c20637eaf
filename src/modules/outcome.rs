//! Per-module load outcomes.

/// Result of driving one module through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Loaded and initialized.
    Loaded,
    /// The load function failed.
    LoadFailed(String),
    /// Loaded, but `initialize()` failed.
    InitFailed(String),
    /// Never attempted (unsatisfied dependency or aborted startup).
    Skipped(String),
}

impl LoadOutcome {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::LoadFailed(_) => "load_failed",
            Self::InitFailed(_) => "init_failed",
            Self::Skipped(_) => "skipped",
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Loaded => None,
            Self::LoadFailed(reason) | Self::InitFailed(reason) | Self::Skipped(reason) => {
                Some(reason)
            }
        }
    }
}

impl std::fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.kind(), reason),
            None => write!(f, "{}", self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        assert_eq!(LoadOutcome::Loaded.to_string(), "loaded");
        assert_eq!(
            LoadOutcome::InitFailed("timeout".into()).to_string(),
            "init_failed: timeout"
        );
        assert_eq!(LoadOutcome::Skipped("x".into()).reason(), Some("x"));
    }
}
