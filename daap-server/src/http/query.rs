//! Typed query-string extractors, one small struct per route's argument
//! set, rather than a single catch-all query type. A missing required
//! field is a 400, courtesy of axum's `Query<T>` rejection.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "session-id")]
    pub session_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    #[serde(rename = "session-id")]
    pub session_id: u32,
    #[serde(rename = "revision-number")]
    pub revision_number: u64,
    pub delta: u64,
}

/// Shared by every listing endpoint (`/databases`, `.../items`,
/// `.../containers`, `.../containers/{c}/items`). `type` and `meta` are
/// accepted (iTunes always sends them) but otherwise unused, since the
/// group/smart-playlist query engine they'd filter against is out of
/// scope.
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    #[serde(rename = "session-id")]
    pub session_id: u32,
    #[serde(rename = "revision-number")]
    pub revision_number: u64,
    pub delta: u64,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub meta: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    #[serde(rename = "session-id")]
    pub session_id: u32,
}

