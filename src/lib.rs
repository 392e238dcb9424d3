pub mod acquire;
pub mod config;
pub mod export;
pub mod plot;
pub mod port;
pub mod reading;

pub use acquire::{Session, acquire};
pub use config::AcquireConfig;
pub use reading::{Channel, Reading, ReadingTable, RowPolicy};
