pub mod client;
pub mod error;
pub mod reply;
pub mod types;

pub use client::JobServiceClient;
pub use error::ApiError;
pub use reply::{classify_reply, JobReply};
