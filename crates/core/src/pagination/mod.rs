//! Bidirectional keyset pagination shared by every listing.
//!
//! A client sends a [`PageRequest`]; it is resolved against a collection's
//! [`CursorScope`] into a [`PageQuery`], the store answers a probing
//! [`SliceRequest`] with a [`Slice`], and [`Connection::assemble`] turns that
//! into edges plus page info.

mod connection;
mod cursor;
mod request;
mod slice;

pub use connection::{Connection, Edge, PageInfo};
pub use cursor::{Cursor, CursorError, CursorScope, Position};
pub use request::{Direction, PageQuery, PageRequest, PagingConfig, PaginationError};
pub use slice::{Keyed, Slice, SliceRequest, slice_sorted};
