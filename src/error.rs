//! Insert failure reasons. Lookups and erases have no error cases.

use allocator_api2::alloc::AllocError;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// The lazy bucket array could not be allocated; the table is still empty.
    #[error("bucket array allocation failed")]
    Buckets(#[source] AllocError),
    /// The entry could not be allocated; contents are unchanged.
    #[error("entry allocation failed")]
    Entry(#[source] AllocError),
}
