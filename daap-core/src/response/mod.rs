pub mod builders;

pub use builders::*;

/// What this provider is willing to advertise to clients. Controls
/// which optional DMAP fields the response builders emit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub supports_persistent_id: bool,
    pub supports_artwork: bool,
}
