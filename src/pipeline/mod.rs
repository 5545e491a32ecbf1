pub mod error;
pub mod machine;
pub mod orchestrator;
pub mod poller;
pub mod step;
pub mod work_item;

pub use error::PipelineError;
pub use machine::{PhaseStateMachine, PhaseStatus};
pub use orchestrator::{CancelHandle, SubmissionOrchestrator};
pub use poller::{ExecutionPoller, PollPolicy, SubmissionOutcome};
pub use step::{Phase, Step};
pub use work_item::{TxInfo, UnsignedPayload, WorkItem, WorkItemStatus, WorkItemUpdate};
