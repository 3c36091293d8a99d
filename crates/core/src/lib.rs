//! `cnjflow-core`: domain building blocks for the CNJ enrichment pipeline.
//!
//! This crate contains **pure domain** types and the port contracts the
//! application layer depends on. No IO lives here.

pub mod cnj;
pub mod error;
pub mod id;
pub mod number;
pub mod ports;
pub mod record;

pub use cnj::{Cnj, CnjStatus, ExternalPayload, StatusUpdate};
pub use error::{DomainError, DomainResult, ExternalError, QueueError, RepositoryError};
pub use id::{MessageId, RequestId};
pub use number::{CnjNumber, validate_format};
pub use ports::{CnjMessage, CnjRepository, Delivery, ExternalCnjService, QueueService};
pub use record::CnjRecord;
