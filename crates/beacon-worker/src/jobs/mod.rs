//! Built-in liveness jobs.

pub mod ping;
pub mod prune;

pub use ping::PingInactiveConnectionsJob;
pub use prune::PruneStaleConnectionsJob;
