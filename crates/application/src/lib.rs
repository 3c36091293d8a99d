//! Application layer: the receive and process use cases plus batch orchestration.
//!
//! Use cases depend only on the port traits from `cnjflow-core`; concrete
//! adapters are injected as `Arc<dyn ...>` by the composition root.

pub mod batch;
pub mod dto;
pub mod process;
pub mod receive;

pub use batch::{BatchItemOutcome, BatchOutcome, BatchProcessor};
pub use dto::{ProcessCnjRequest, ProcessCnjResponse, ReceiveCnjRequest, ReceiveCnjResponse};
pub use process::{DEFAULT_TTL_DAYS, ProcessCnjUseCase, ProcessError};
pub use receive::{RECEIVED_MESSAGE, ReceiveCnjUseCase, ReceiveError};

#[cfg(test)]
pub(crate) mod test_support;
