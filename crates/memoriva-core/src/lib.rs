//! memoriva-core: Study-session queue, card selection, and scoring.
//!
//! This crate defines the data model, the collaborator traits (datastore and
//! language model), and the asynchronous pipeline that turns a pending study
//! session into an ordered list of cards.

pub mod error;
pub mod fixture;
pub mod model;
pub mod processor;
pub mod queue;
pub mod scoring;
pub mod selection;
pub mod store;
pub mod traits;

pub use error::{Error, SelectionError};
pub use processor::SessionProcessor;
pub use queue::{JobQueue, QueueConfig};
pub use selection::{CardSelector, SelectionConfig};
pub use store::InMemoryStore;
