// Declare the modules to re-export; each sits behind its feature.
#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "ingestors")]
pub mod ingestors;
#[cfg(feature = "retrieve")]
pub mod retrieve;
#[cfg(feature = "stackexchange")]
pub mod stackexchange;

// Re-export the types the binaries wire together
#[cfg(feature = "configs")]
pub use configs::{CollectionConfig, CollectionMode, WatchConfig};
#[cfg(feature = "core")]
pub use self::core::{Poller, Scheduled};
#[cfg(feature = "ingestors")]
pub use ingestors::PushSession;
#[cfg(feature = "stackexchange")]
pub use stackexchange::StackExchangeApi;
