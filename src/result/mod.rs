pub mod cursor;
pub mod page;

pub use cursor::{CursorRow, ResultCursor};
pub use page::{PageInfo, PagedResultSet, offset_for, total_pages};
