// Phase and step taxonomy. Each phase owns one ordered step list; successors
// are derived from position in that list rather than kept in per-phase maps,
// so the two phases cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two top-level pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Preparation,
    Inscription,
}

/// A named stage within a phase's fixed sequence. `End` appears only in the
/// inscription list and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Construct,
    Retrieve,
    Submit,
    RetrieveSubmission,
    End,
}

impl Phase {
    /// The phase's ordered step list.
    pub fn steps(self) -> &'static [Step] {
        match self {
            Phase::Preparation => &[
                Step::Construct,
                Step::Retrieve,
                Step::Submit,
                Step::RetrieveSubmission,
            ],
            Phase::Inscription => &[
                Step::Construct,
                Step::Retrieve,
                Step::Submit,
                Step::RetrieveSubmission,
                Step::End,
            ],
        }
    }

    pub fn first_step(self) -> Step {
        self.steps()[0]
    }

    pub fn terminal_step(self) -> Step {
        let steps = self.steps();
        steps[steps.len() - 1]
    }

    /// The step after `step` in this phase, or `None` at the terminal step.
    pub fn successor(self, step: Step) -> Option<Step> {
        let steps = self.steps();
        steps
            .iter()
            .position(|s| *s == step)
            .and_then(|i| steps.get(i + 1))
            .copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Preparation => "preparation",
            Phase::Inscription => "inscription",
        }
    }

    /// URL path prefix for this phase's endpoints.
    pub fn route_prefix(self) -> &'static str {
        match self {
            Phase::Preparation => "/prepare-utxos",
            Phase::Inscription => "/inscriptions",
        }
    }

    /// The user-facing step label, e.g. `prepare/construct` or
    /// `inscription/retrieve-submission`. The terminal inscription step is
    /// plain `end`.
    pub fn step_label(self, step: Step) -> String {
        if step == Step::End {
            return "end".to_string();
        }
        let prefix = match self {
            Phase::Preparation => "prepare",
            Phase::Inscription => "inscription",
        };
        format!("{prefix}/{}", step.slug())
    }
}

impl Step {
    pub fn slug(self) -> &'static str {
        match self {
            Step::Construct => "construct",
            Step::Retrieve => "retrieve",
            Step::Submit => "submit",
            Step::RetrieveSubmission => "retrieve-submission",
            Step::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
