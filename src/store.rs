//! Local stores fed by the connection manager.

pub mod elements;
pub mod log;

pub use elements::ElementRegistry;
pub use log::MessageLog;
