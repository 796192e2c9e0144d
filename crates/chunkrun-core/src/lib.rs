pub mod net;
pub mod player;

/// Unique identifier for a connected player. Scoped to one connection.
pub type PlayerId = u64;
