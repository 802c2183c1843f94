//! SLV lead capture backend
//!
//! Accepts contact-form submissions from the marketing site, validates them
//! and appends them to the `leads` collection. Exposes modules for
//! integration testing and for the `slv-leads` binary.

pub mod config;
pub mod errors;
pub mod lead;
pub mod server;
pub mod store;
pub mod validation;

// Re-export commonly used types for external use
pub use config::ServiceConfig;
pub use errors::{LeadError, LeadResult};
pub use lead::{Lead, NewLead};
pub use server::{build_router, AccessPolicy, ServeState};
pub use store::{ConnectionCache, InMemoryLeadStore, LeadStore, MongoLeadStore};
