use std::fmt;

/// Per-item result of a remediation or restore step. Reporting only; nothing
/// here feeds back into classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Skipped(String),
    Failed(String),
}

impl Outcome {
    pub fn attempted(&self) -> bool {
        !matches!(self, Outcome::Skipped(_))
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    pub fn skip_reason(&self) -> Option<&str> {
        match self {
            Outcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded => f.write_str("OK"),
            Outcome::Skipped(reason) => write!(f, "SKIPPED ({})", reason),
            Outcome::Failed(err) => write!(f, "ERROR ({})", err),
        }
    }
}

/// Outcome tagged with the item it belongs to (an entity id, a path, a batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome<T> {
    pub item: T,
    pub outcome: Outcome,
}

impl<T> ItemOutcome<T> {
    pub fn new(item: T, outcome: Outcome) -> Self {
        Self { item, outcome }
    }
}

/// Counts across a list of outcomes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn tally<'a, T: 'a>(items: impl IntoIterator<Item = &'a ItemOutcome<T>>) -> Self {
        let mut counts = Self::default();
        for item in items {
            counts.record(&item.outcome);
        }
        counts
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}
