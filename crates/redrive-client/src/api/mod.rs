//! Service API implementations.

mod queues;
mod states;
mod topics;

pub use queues::{QueuesApi, SendMessageRequest, SendMessageResponse};
pub use states::{GetExecutionHistoryRequest, StatesApi};
pub use topics::TopicsApi;
