//! Pure functions turning library state into DMAP object trees. None of
//! these touch the network or a session; they only know how to render
//! a `Collection` (or a pair of them, for a diffed update) as the tree
//! an axum handler will hand to the codec.

use daap_codec::DaapObject;

use crate::error::Result;
use crate::model::{Collection, Library};
use crate::store::Revision;

use super::Capabilities;

/// `dmap.status=200, dmap.updatetype, dmap.specifiedtotalcount,
/// dmap.returnedcount` are common to every listing response; build them
/// once so each builder below doesn't repeat the boilerplate.
fn listing_header(is_update: bool, total: usize, returned: usize) -> Result<Vec<DaapObject>> {
    Ok(vec![
        DaapObject::new("dmap.status", 200u32)?,
        DaapObject::new("dmap.updatetype", u8::from(is_update))?,
        DaapObject::new("dmap.specifiedtotalcount", total as u32)?,
        DaapObject::new("dmap.returnedcount", returned as u32)?,
    ])
}

fn deleted_id_listing(ids: &[u32]) -> Result<DaapObject> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        items.push(DaapObject::new("dmap.itemid", *id)?);
    }
    DaapObject::container("dmap.deletedidlisting", items)
}

/// Finishes a listing response: the header (with `dmap.returnedcount`
/// set to whichever side actually has entries) plus either a
/// `dmap.listing` or a `dmap.deletedidlisting`, never both — mirroring
/// `diff_policy`'s own mutual exclusivity.
fn finish_listing(
    is_update: bool,
    total: usize,
    listing: Vec<DaapObject>,
    removed: &[u32],
) -> Result<Vec<DaapObject>> {
    if removed.is_empty() {
        let mut fields = listing_header(is_update, total, listing.len())?;
        fields.push(DaapObject::container("dmap.listing", listing)?);
        Ok(fields)
    } else {
        let mut fields = listing_header(is_update, total, removed.len())?;
        fields.push(deleted_id_listing(removed)?);
        Ok(fields)
    }
}

/// The diff policy shared by every listing endpoint (see the module
/// documentation in `model::collection`): a first request has no prior
/// revision to diff against and returns everything as "added". A
/// follow-up request reports removals if there are any; only once there
/// are none does it report the added/changed ids, never both at once.
fn diff_policy<P, V>(
    new: &Collection<P, V>,
    old: Option<&Collection<P, V>>,
) -> Result<(bool, Vec<u32>, Vec<u32>)>
where
    P: Clone + Eq + std::hash::Hash + std::fmt::Debug,
    V: Clone + PartialEq,
{
    match old {
        None => Ok((false, new.ids()?, Vec::new())),
        Some(old) => {
            let removed = new.removed(old)?;
            if removed.is_empty() {
                Ok((true, new.updated(old)?, Vec::new()))
            } else {
                Ok((true, Vec::new(), removed))
            }
        }
    }
}

fn revision_to_u32(revision: Revision) -> u32 {
    u32::try_from(revision).unwrap_or(u32::MAX)
}

/// `GET /server-info`.
pub fn server_info(
    server_name: &str,
    password_required: bool,
    supports_update: bool,
) -> Result<DaapObject> {
    DaapObject::container(
        "dmap.serverinforesponse",
        vec![
            DaapObject::new("dmap.status", 200u32)?,
            DaapObject::new("dmap.protocolversion", daap_codec::DaapValue::Version(3, 0))?,
            DaapObject::new("daap.protocolversion", daap_codec::DaapValue::Version(3, 0))?,
            DaapObject::new("dmap.itemname", server_name)?,
            DaapObject::new("dmap.loginrequired", i8::from(password_required))?,
            DaapObject::new("dmap.authenticationmethod", if password_required { 2i8 } else { 0i8 })?,
            DaapObject::new("dmap.timeoutinterval", 1800u32)?,
            DaapObject::new("dmap.supportsautologout", 1i8)?,
            DaapObject::new("dmap.supportsupdate", i8::from(supports_update))?,
            DaapObject::new("dmap.supportspersistentids", 1i8)?,
            DaapObject::new("dmap.supportsextensions", 1i8)?,
            DaapObject::new("dmap.supportsedit", 0i8)?,
            DaapObject::new("dmap.databasescount", 1u32)?,
        ],
    )
}

/// `GET /content-codes`: the whole static code table, verbatim.
pub fn content_codes() -> Result<DaapObject> {
    let mut fields = vec![DaapObject::new("dmap.status", 200u32)?];
    for entry in daap_codec::CODE_TABLE {
        fields.push(DaapObject::container(
            "dmap.dictionary",
            vec![
                DaapObject::new(
                    "dmap.contentcodesnumber",
                    daap_codec::int_from_code(entry.code),
                )?,
                DaapObject::new("dmap.contentcodesname", entry.name)?,
                DaapObject::new("dmap.contentcodestype", entry.data_type.as_u8() as i16)?,
            ],
        )?);
    }
    DaapObject::container("dmap.contentcodesresponse", fields)
}

/// `GET /login`.
pub fn login_response(session_id: u32) -> Result<DaapObject> {
    DaapObject::container(
        "dmap.loginresponse",
        vec![
            DaapObject::new("dmap.status", 200u32)?,
            DaapObject::new("dmap.sessionid", session_id)?,
        ],
    )
}

/// `GET /update`.
pub fn update_response(revision: Revision) -> Result<DaapObject> {
    DaapObject::container(
        "dmap.updateresponse",
        vec![
            DaapObject::new("dmap.status", 200u32)?,
            DaapObject::new("dmap.serverrevision", revision_to_u32(revision))?,
        ],
    )
}

/// `GET /databases`.
pub fn databases_response(
    library: &Library,
    capabilities: Capabilities,
    new_revision: Revision,
    old_revision: Option<Revision>,
) -> Result<DaapObject> {
    let new = library.databases().at(new_revision);
    let old = old_revision.map(|r| library.databases().at(r));
    let (is_update, added, removed) = diff_policy(&new, old.as_ref())?;

    let mut listing = Vec::with_capacity(added.len());
    for id in &added {
        let database = new.get(*id)?;
        let item_count = library.items(*id).at(new_revision).len()?;
        let container_count = library.containers(*id).at(new_revision).len()?;
        let mut fields = vec![
            DaapObject::new("dmap.itemid", database.id)?,
            DaapObject::new("dmap.itemname", database.name.as_str())?,
            DaapObject::new("dmap.itemcount", item_count as u32)?,
            DaapObject::new("dmap.containercount", container_count as u32)?,
        ];
        if capabilities.supports_persistent_id {
            fields.push(DaapObject::new("dmap.persistentid", database.persistent_id)?);
        }
        listing.push(DaapObject::container("dmap.listingitem", fields)?);
    }

    let fields = finish_listing(is_update, new.len()?, listing, &removed)?;
    DaapObject::container("daap.serverdatabases", fields)
}

/// `GET /databases/{id}/items`.
pub fn items_response(
    library: &Library,
    capabilities: Capabilities,
    database: u32,
    new_revision: Revision,
    old_revision: Option<Revision>,
) -> Result<DaapObject> {
    let new = library.items(database).at(new_revision);
    let old = old_revision.map(|r| library.items(database).at(r));
    let (is_update, added, removed) = diff_policy(&new, old.as_ref())?;

    let mut listing = Vec::with_capacity(added.len());
    for id in &added {
        let item = new.get(*id)?;
        listing.push(DaapObject::container("dmap.listingitem", item_fields(&item, capabilities)?)?);
    }

    let fields = finish_listing(is_update, new.len()?, listing, &removed)?;
    DaapObject::container("daap.databasesongs", fields)
}

fn item_fields(item: &crate::model::Item, capabilities: Capabilities) -> Result<Vec<DaapObject>> {
    let mut fields = vec![
        DaapObject::new("dmap.itemid", item.id)?,
        DaapObject::new("dmap.itemname", item.name.as_str())?,
        DaapObject::new("daap.songformat", item.file_suffix.as_str())?,
        DaapObject::new("daap.songsize", item.file_size)?,
    ];
    if capabilities.supports_persistent_id {
        fields.push(DaapObject::new("dmap.persistentid", item.persistent_id)?);
    }
    if let Some(album) = &item.album {
        fields.push(DaapObject::new("daap.songalbum", album.as_str())?);
    }
    if let Some(artist) = &item.artist {
        fields.push(DaapObject::new("daap.songartist", artist.as_str())?);
    }
    if let Some(genre) = &item.genre {
        fields.push(DaapObject::new("daap.songgenre", genre.as_str())?);
    }
    if let Some(track) = item.track {
        fields.push(DaapObject::new("daap.songtracknumber", track as i16)?);
    }
    if let Some(year) = item.year {
        fields.push(DaapObject::new("daap.songyear", year as i16)?);
    }
    if let Some(bitrate) = item.bitrate {
        fields.push(DaapObject::new("daap.songbitrate", bitrate as i16)?);
    }
    if let Some(duration_ms) = item.duration_ms {
        fields.push(DaapObject::new("daap.songtime", duration_ms)?);
    }
    if capabilities.supports_artwork && item.has_artwork {
        fields.push(DaapObject::new("daap.songartworkcount", 1i16)?);
        fields.push(DaapObject::new("daap.songextradata", 1i8)?);
    }
    Ok(fields)
}

/// `GET /databases/{id}/containers`.
pub fn containers_response(
    library: &Library,
    capabilities: Capabilities,
    database: u32,
    new_revision: Revision,
    old_revision: Option<Revision>,
) -> Result<DaapObject> {
    let new = library.containers(database).at(new_revision);
    let old = old_revision.map(|r| library.containers(database).at(r));
    let (is_update, added, removed) = diff_policy(&new, old.as_ref())?;

    let mut listing = Vec::with_capacity(added.len());
    for id in &added {
        let container = new.get(*id)?;
        let item_count = library.container_items(*id).at(new_revision).len()?;
        let mut fields = vec![
            DaapObject::new("dmap.itemid", container.id)?,
            DaapObject::new("dmap.itemname", container.name.as_str())?,
            DaapObject::new("dmap.itemcount", item_count as u32)?,
            DaapObject::new("dmap.parentcontainerid", container.parent_id.unwrap_or(0))?,
        ];
        if capabilities.supports_persistent_id {
            fields.push(DaapObject::new("dmap.persistentid", container.persistent_id)?);
        }
        if container.is_base {
            fields.push(DaapObject::new("daap.baseplaylist", 1i8)?);
        }
        if container.is_smart {
            fields.push(DaapObject::new("com.apple.itunes.smart-playlist", 1i8)?);
        }
        listing.push(DaapObject::container("dmap.listingitem", fields)?);
    }

    let fields = finish_listing(is_update, new.len()?, listing, &removed)?;
    DaapObject::container("daap.databaseplaylists", fields)
}

/// `GET /databases/{id}/containers/{id}/items`. The container-item's own
/// id (not the referenced item's id) is the identity this listing diffs
/// on, matching how the revision store keys the `ContainerKey` collection.
pub fn container_items_response(
    library: &Library,
    capabilities: Capabilities,
    database: u32,
    container: u32,
    new_revision: Revision,
    old_revision: Option<Revision>,
) -> Result<DaapObject> {
    let new = library.container_items(container).at(new_revision);
    let old = old_revision.map(|r| library.container_items(container).at(r));
    let (is_update, added, removed) = diff_policy(&new, old.as_ref())?;

    let items_store = library.items(database).at(new_revision);
    let mut listing = Vec::with_capacity(added.len());
    for id in &added {
        let container_item = new.get(*id)?;
        let item = items_store.get(container_item.item_id)?;
        let mut fields = vec![
            DaapObject::new("dmap.itemid", container_item.id)?,
            DaapObject::new("dmap.itemkind", 2u8)?,
            DaapObject::new("dmap.containeritemid", container_item.id)?,
        ];
        if capabilities.supports_persistent_id {
            fields.push(DaapObject::new("dmap.persistentid", container_item.persistent_id)?);
        }
        fields.push(DaapObject::new("daap.sortname", item.name.as_str())?);
        if let Some(album) = &item.album {
            fields.push(DaapObject::new("daap.sortalbum", album.as_str())?);
        }
        if let Some(artist) = &item.artist {
            fields.push(DaapObject::new("daap.sortartist", artist.as_str())?);
            fields.push(DaapObject::new("daap.sortalbumartist", artist.as_str())?);
        }
        listing.push(DaapObject::container("dmap.listingitem", fields)?);
    }

    let fields = finish_listing(is_update, new.len()?, listing, &removed)?;
    DaapObject::container("daap.playlistsongs", fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, ContainerItem, Database, Item};

    fn sample_library() -> Library {
        let lib = Library::new("Test Server", 1);
        lib.databases()
            .add(
                1,
                Database {
                    id: 1,
                    name: "Library".into(),
                    persistent_id: 100,
                },
            )
            .unwrap();
        lib.items(1)
            .add(
                10,
                Item {
                    id: 10,
                    persistent_id: 1000,
                    name: "Track One".into(),
                    artist: Some("Artist".into()),
                    album: Some("Album".into()),
                    year: Some(2020),
                    track: Some(1),
                    duration_ms: Some(180_000),
                    bitrate: Some(256),
                    genre: Some("Rock".into()),
                    file_size: 4_000_000,
                    file_type: "audio/mpeg".into(),
                    file_suffix: "mp3".into(),
                    has_artwork: true,
                    file_name: "one.mp3".into(),
                },
            )
            .unwrap();
        lib.containers(1)
            .add(
                20,
                Container {
                    id: 20,
                    name: "Playlist".into(),
                    persistent_id: 2000,
                    parent_id: None,
                    is_base: true,
                    is_smart: false,
                },
            )
            .unwrap();
        lib.container_items(20)
            .add(
                30,
                ContainerItem {
                    id: 30,
                    item_id: 10,
                    container_id: 20,
                    order: 0,
                    persistent_id: 3000,
                },
            )
            .unwrap();
        lib.commit(2).unwrap();
        lib
    }

    fn all_caps() -> Capabilities {
        Capabilities {
            supports_persistent_id: true,
            supports_artwork: true,
        }
    }

    #[test]
    fn first_databases_request_reports_updatetype_zero_and_no_deletions() {
        let lib = sample_library();
        let response = databases_response(&lib, all_caps(), lib.revision(), None).unwrap();
        let bytes = response.encode().unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn second_items_request_after_a_removal_reports_deletions_not_additions() {
        let lib = sample_library();
        let first_revision = lib.revision();
        lib.items(1).remove(10).unwrap();
        lib.commit(first_revision + 1).unwrap();

        let response =
            items_response(&lib, all_caps(), 1, lib.revision(), Some(first_revision)).unwrap();
        let daap_codec::DaapValue::Container(children) = response.value else {
            panic!("expected container");
        };
        assert!(children.iter().any(|c| c.name == "dmap.deletedidlisting"));
        assert!(!children.iter().any(|c| c.name == "dmap.listing"));

        let returned_count = children
            .iter()
            .find(|c| c.name == "dmap.returnedcount")
            .expect("dmap.returnedcount present");
        assert_eq!(returned_count.value, daap_codec::DaapValue::Uint(1));
    }

    #[test]
    fn container_items_resolve_the_referenced_items_sort_fields() {
        let lib = sample_library();
        let response =
            container_items_response(&lib, all_caps(), 1, 20, lib.revision(), None).unwrap();
        let bytes = response.encode().unwrap();
        assert!(!bytes.is_empty());
    }
}
