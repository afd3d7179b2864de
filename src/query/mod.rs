pub mod builder;
pub mod components;
pub mod criteria;
pub mod join;
pub mod statement;

pub use builder::{BuiltQuery, QueryBuilder};
pub use components::{Fragment, QueryComponents};
pub use criteria::{Criteria, Filter, Order, limit_in_custom};
pub use join::{JoinPlanner, column_alias, link_segment};
pub use statement::{Assignment, CreateTableStatement, DeleteStatement, InsertStatement, UpdateStatement};
