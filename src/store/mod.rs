//! Lead persistence
//!
//! Handlers only talk to [`LeadStore`]. Production wires the MongoDB store,
//! which borrows its database handle from a shared [`ConnectionCache`].

use async_trait::async_trait;

use crate::errors::LeadResult;
use crate::lead::{Lead, NewLead};

mod connection;
mod memory;
mod mongo;

pub use connection::ConnectionCache;
pub use memory::InMemoryLeadStore;
pub use mongo::MongoLeadStore;

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Append a lead and return the identifier the store assigned.
    async fn insert(&self, lead: NewLead) -> LeadResult<String>;

    /// Every stored lead, newest `createdAt` first.
    async fn list_newest_first(&self) -> LeadResult<Vec<Lead>>;
}
