//! Object pooling (C2/C3): caching GPU objects by descriptor so identical requests across
//! frames reuse the same device object instead of re-creating it every time.

pub mod generic;
pub mod typed;

pub use generic::Pool;
pub use typed::PoolSet;
