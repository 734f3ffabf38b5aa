//! Engine bindings
//!
//! Raw handle wrappers over the SQLite C API. Nothing outside this module
//! calls into the library directly.

pub(crate) mod sqlite;
