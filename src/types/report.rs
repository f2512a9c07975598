use std::fmt;
use std::time::Duration;

/// What happened to a single rule during [`RuleEngine::process_detailed()`](crate::RuleEngine::process_detailed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// `active` was false; nothing evaluated.
    Inactive,
    /// The gate expression was falsy; `if`/`then`/`else` skipped.
    GateClosed,
    /// `if` or `then` was empty.
    NotConfigured,
    /// `if` was truthy and `then` ran.
    Then,
    /// `if` was falsy and `else` ran.
    Else,
    /// `if` was falsy and there was no `else`.
    NoBranch,
}

impl RuleOutcome {
    /// Whether a `then` or `else` branch ran.
    #[must_use]
    pub fn applied(self) -> bool {
        matches!(self, RuleOutcome::Then | RuleOutcome::Else)
    }
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuleOutcome::Inactive => "inactive",
            RuleOutcome::GateClosed => "gate closed",
            RuleOutcome::NotConfigured => "not configured",
            RuleOutcome::Then => "then",
            RuleOutcome::Else => "else",
            RuleOutcome::NoBranch => "no branch",
        };
        f.write_str(label)
    }
}

/// Per-node processing report, one outcome per rule in list order.
#[derive(Debug, Clone)]
#[must_use]
pub struct ProcessReport {
    outcomes: Vec<RuleOutcome>,
    duration: Duration,
}

impl ProcessReport {
    pub(crate) fn new(outcomes: Vec<RuleOutcome>, duration: Duration) -> Self {
        Self { outcomes, duration }
    }

    #[must_use]
    pub fn outcomes(&self) -> &[RuleOutcome] {
        &self.outcomes
    }

    /// Number of rules whose `then` or `else` branch ran.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied()).count()
    }

    /// Wall-clock duration of the processing.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for ProcessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rules: [")?;
        for (i, outcome) in self.outcomes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "#{i} {outcome}")?;
        }
        write!(f, "], applied: {}", self.applied())?;
        write!(f, ", duration: {:?}", self.duration)
    }
}
