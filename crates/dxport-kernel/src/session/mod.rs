//! CAD session abstraction

mod memory;
mod traits;

pub use memory::{ClosedPart, CommitRecord, MemorySession};
pub use traits::*;
