// Chainscribe - on-chain data preparation and inscription pipeline
// This exposes the core components for hosts and integration tests

pub mod api;
pub mod config;
pub mod encoding;
pub mod observability;
pub mod payload;
pub mod pipeline;
pub mod telemetry;
pub mod wallet;

// Re-export key types for easy access
pub use api::{ApiError, JobReply, JobServiceClient};
pub use config::{config, init_config, ChainscribeConfig};
pub use observability::{api_metrics, ApiMetrics, OperationTimer};
pub use payload::{Payload, PayloadError};
pub use pipeline::{
    CancelHandle, ExecutionPoller, Phase, PhaseStateMachine, PhaseStatus, PipelineError,
    PollPolicy, Step, SubmissionOrchestrator, SubmissionOutcome, TxInfo, WorkItem, WorkItemStatus,
    WorkItemUpdate,
};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use wallet::{
    DefaultWalletStore, InMemoryWalletStore, SigningCoordinator, SigningError, WalletCapability,
    WalletConnector, WalletError,
};
