use std::fmt;

/// What a processor wants to happen to its chain after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Continuation {
    /// Keep polling, even if the chain was scheduled as one-shot.
    Continue,
    /// End the chain after this round.
    Stop,
    /// Leave the repeating flag as it was at the start of the round.
    Inherit,
}

impl Continuation {
    /// Post-round repeating flag given the flag the round started with.
    pub fn should_repeat(self, baseline: bool) -> bool {
        match self {
            Continuation::Continue => true,
            Continuation::Stop => false,
            Continuation::Inherit => baseline,
        }
    }
}

impl fmt::Display for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Continuation::Continue => "continue",
            Continuation::Stop => "stop",
            Continuation::Inherit => "inherit",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_table() {
        let cases = [
            (Continuation::Continue, false, true),
            (Continuation::Continue, true, true),
            (Continuation::Stop, false, false),
            (Continuation::Stop, true, false),
            (Continuation::Inherit, false, false),
            (Continuation::Inherit, true, true),
        ];

        for (decision, baseline, expected) in cases {
            assert_eq!(
                decision.should_repeat(baseline),
                expected,
                "{decision} with baseline {baseline}"
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Continuation::Inherit.to_string(), "inherit");
    }
}
