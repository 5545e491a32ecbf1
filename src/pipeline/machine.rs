// PhaseStateMachine: sequences one phase's steps and owns its WorkItems and
// current-error value. Steps only ever move forward; `reset` is the sole way
// back to the start.

use tracing::{debug, info, warn};

use crate::payload::Payload;
use crate::pipeline::error::PipelineError;
use crate::pipeline::step::{Phase, Step};
use crate::pipeline::work_item::{WorkItem, WorkItemStatus, WorkItemUpdate};

/// Step position and processing flag for one phase. Owned exclusively by the
/// machine; mutated only through `advance`/`reset`/`set_processing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStatus {
    pub is_processing: bool,
    pub current_step: Step,
    pub next_step: Option<Step>,
}

#[derive(Debug)]
pub struct PhaseStateMachine {
    phase: Phase,
    status: PhaseStatus,
    items: Vec<WorkItem>,
    error: Option<PipelineError>,
}

impl PhaseStateMachine {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            status: Self::initial_status(phase),
            items: Vec::new(),
            error: None,
        }
    }

    fn initial_status(phase: Phase) -> PhaseStatus {
        let first = phase.first_step();
        PhaseStatus {
            is_processing: false,
            current_step: first,
            next_step: phase.successor(first),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &PhaseStatus {
        &self.status
    }

    pub fn current_step(&self) -> Step {
        self.status.current_step
    }

    /// The user-facing label of the current step, e.g. `prepare/retrieve`.
    pub fn current_step_label(&self) -> String {
        self.phase.step_label(self.status.current_step)
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&WorkItem> {
        self.items.get(index)
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    /// Replace the WorkItem list with fresh pending items, one per payload.
    pub fn begin(&mut self, payloads: Vec<Payload>) {
        self.items = payloads.into_iter().map(WorkItem::new).collect();
        debug!(phase = %self.phase, items = self.items.len(), "work items created");
    }

    /// Move to the next step per the phase's step list. A no-op, logged,
    /// when the phase is already at its terminal step.
    pub fn advance(&mut self) {
        match self.status.next_step {
            Some(next) => {
                self.status.current_step = next;
                self.status.next_step = self.phase.successor(next);
                info!(
                    phase = %self.phase,
                    step = %self.current_step_label(),
                    "phase advanced"
                );
            }
            None => {
                warn!(
                    phase = %self.phase,
                    step = %self.current_step_label(),
                    "advance past terminal step ignored"
                );
            }
        }
    }

    /// Jump forward to the phase's terminal step. Used when a
    /// non-recoverable error ends the inscription flow.
    pub fn finish(&mut self) {
        let terminal = self.phase.terminal_step();
        if self.status.current_step != terminal {
            info!(phase = %self.phase, "phase moved to terminal step");
        }
        self.status.current_step = terminal;
        self.status.next_step = None;
    }

    /// Return to the first step and drop all per-run state: items, the
    /// processing flag and the current error.
    pub fn reset(&mut self) {
        self.status = Self::initial_status(self.phase);
        self.items.clear();
        self.error = None;
        info!(phase = %self.phase, "phase reset");
    }

    pub fn set_processing(&mut self, processing: bool) {
        self.status.is_processing = processing;
    }

    /// Merge a partial update into one WorkItem; the only mutation path for
    /// item fields. Out-of-range indexes are ignored with a warning, like
    /// the rest of the advance-past-terminal family.
    pub fn update_item(&mut self, index: usize, update: WorkItemUpdate) {
        match self.items.get_mut(index) {
            Some(item) => item.apply(update),
            None => warn!(
                phase = %self.phase,
                index,
                "update for unknown work item ignored"
            ),
        }
    }

    /// Mark every non-confirmed item failed with zeroed progress.
    pub fn fail_all_items(&mut self) {
        for item in &mut self.items {
            if item.status == WorkItemStatus::Confirmed {
                continue;
            }
            item.apply(WorkItemUpdate {
                status: Some(WorkItemStatus::Failed),
                progress: Some(0),
                ..Default::default()
            });
        }
    }

    pub fn set_error(&mut self, error: PipelineError) {
        warn!(phase = %self.phase, error = %error, "phase error recorded");
        self.error = Some(error);
    }

    /// Clear the current error without touching step or items. Distinct from
    /// `reset`.
    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
