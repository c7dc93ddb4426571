//! argile-storage: store traits, record types and error types for the
//! parcours engine, with an in-memory backend and a backend-agnostic
//! conformance suite.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use record::{
    CaseRecord, CaseUpdate, JourneyRecord, NotificationRecord, NotificationStatus,
    NotificationUpdate,
};
pub use traits::{CaseStore, JourneyStore, NotificationStore, ParcoursStorage};
