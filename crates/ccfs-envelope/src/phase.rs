use std::fmt;

/// Where one upload or download currently is.
///
/// ```text
/// Idle → AwaitingInput → Sealing → Stored
///                      → Opening → Delivered
///        (any) → Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingInput,
    Sealing,
    Opening,
    Stored,
    Delivered,
    Failed(&'static str),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Stored | Phase::Delivered | Phase::Failed(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::AwaitingInput => f.write_str("awaiting_input"),
            Phase::Sealing => f.write_str("sealing"),
            Phase::Opening => f.write_str("opening"),
            Phase::Stored => f.write_str("stored"),
            Phase::Delivered => f.write_str("delivered"),
            Phase::Failed(reason) => write!(f, "failed:{reason}"),
        }
    }
}
