//! Routing core: attendant assignment and message ingest

pub mod assignment;
pub mod ingest;
pub mod validation;

pub use assignment::{AssignmentError, AttendantAssigner, AttendantLoad};
pub use ingest::{IngestError, MessageIngestService, NewConversation, NotFoundError};
pub use validation::ValidationError;
