//! Typed records stored in the revision store. These are plain data —
//! all identity/ownership rules live in [`super::collection::Collection`]
//! and [`super::Library`].

#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub id: u32,
    pub name: String,
    pub persistent_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: u32,
    pub persistent_id: u64,
    pub name: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u16>,
    pub track: Option<u16>,
    pub duration_ms: Option<u32>,
    pub bitrate: Option<u16>,
    pub genre: Option<String>,
    pub file_size: u32,
    /// MIME type, e.g. `audio/mpeg`.
    pub file_type: String,
    pub file_suffix: String,
    pub has_artwork: bool,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub id: u32,
    pub name: String,
    pub persistent_id: u64,
    /// `None` for orphaned containers, rendered as `parentcontainerid=0`.
    pub parent_id: Option<u32>,
    pub is_base: bool,
    pub is_smart: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerItem {
    pub id: u32,
    pub item_id: u32,
    pub container_id: u32,
    pub order: u32,
    pub persistent_id: u64,
}

/// Parent key for the single server-wide database collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerKey;

/// Parent key for a database's items or containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatabaseKey(pub u32);

/// Parent key for a container's container-items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerKey(pub u32);
