pub mod connection;
pub mod table;

pub use connection::Connection;
pub use table::{ConnectionTable, ProcessOutcome};
