//! Transforms over mapped data.
//!
//! [`ValueTransform`] maps one scalar to another while a mapping is applied.
//! [`TableTransform`] runs afterwards over the whole set of mapped rows.

pub mod string_ops;
pub mod table;
pub mod value;

pub use table::{AggregateOp, TableTransform, apply_table_transforms};
pub use value::{FormatStyle, PreparedTransform, ValueTransform};
