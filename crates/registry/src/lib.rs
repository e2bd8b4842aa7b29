//! Session registry with live change feeds.

pub mod changes;
pub mod memory;
pub mod store;

pub use changes::*;
pub use memory::*;
pub use store::*;
