//! Repository layer: table-scoped database operations.
//!
//! All public functions are re-exported here.

mod case_embedding;
mod lab_order;
mod lab_result;

pub use case_embedding::*;
pub use lab_order::*;
pub use lab_result::*;
