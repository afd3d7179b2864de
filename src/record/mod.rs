pub mod edit;
pub mod instance;
pub mod populate;
pub mod transform;

pub use edit::{EditInput, apply_input};
pub use instance::RecordInstance;
pub use populate::populate;
