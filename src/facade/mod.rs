//! The [`Store`] orchestrator and the operations it exposes.

mod crud;
mod fixtures;
mod relations;
mod storage;
mod store;

pub use fixtures::{FixtureDocument, FixtureRecord};
pub use store::Store;
