pub mod error;
pub mod value;

pub use error::{DbError, ExecutionErrorKind, Result};
pub use value::{DATETIME_FORMAT, Value, parse_datetime};
