mod presence;
mod source;
mod watcher;

pub mod config;
pub mod error;
pub mod format;
pub mod provider;
pub mod quote;
pub mod rotate;
pub mod session;
pub mod supervisor;

pub use config::{InstrumentConfig, InstrumentKind, TokenBackend, TokenConfig};
pub use format::{DisplayFormatter, DisplaySet};
pub use presence::{PresenceUpdate, RoleColor};
pub use provider::{Providers, RedisQuoteCache};
pub use quote::Quote;
pub use rotate::{ActivityRotator, RotationMode};
pub use source::QuoteSource;
pub use supervisor::WatcherSupervisor;
pub use watcher::{InstrumentWatcher, WatcherState};
