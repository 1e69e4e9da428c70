pub mod config;
pub mod error;
pub mod providers;
pub mod symbol;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use providers::{HistoryProvider, PersistenceSink, UniverseProvider};
pub use symbol::{Exchange, SymbolCode};
pub use types::*;
