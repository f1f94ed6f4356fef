//! Populates a [`Library`] from a directory of media files on startup:
//! one database, one base container, every recognized audio file
//! discovered under `root` becomes an `Item` added to both. No ID3/tag
//! parsing — names come from the file stem, matching a
//! `LocalFileProvider` that never opens the file to read its media
//! headers either.

use std::path::Path;

use daap_core::{Container, ContainerItem, Database, Item, Library};

use crate::media::artwork_candidate;

const DATABASE_ID: u32 = 1;
const BASE_CONTAINER_ID: u32 = 1;

/// Maps a recognized file extension to its MIME type and whether it's
/// audio at all. Unrecognized extensions are skipped.
fn mime_type_for_suffix(suffix: &str) -> Option<&'static str> {
    match suffix.to_ascii_lowercase().as_str() {
        "mp3" => Some("audio/mpeg"),
        "m4a" => Some("audio/mp4"),
        "aac" => Some("audio/aac"),
        "flac" => Some("audio/flac"),
        "ogg" => Some("audio/ogg"),
        "wav" => Some("audio/wav"),
        "aif" | "aiff" => Some("audio/aiff"),
        _ => None,
    }
}

/// Builds a fresh [`Library`] by walking `root` one level deep (no
/// recursion into subdirectories, matching the "everything lives in
/// `library.root`" contract `LocalFileProvider::resolve` assumes).
/// Returns the library already committed at revision 2 (a freshly
/// constructed store starts at the empty revision 1; the initial scan
/// is the first commit past it).
pub fn scan(server_name: &str, server_persistent_id: u64, root: &Path) -> anyhow::Result<Library> {
    let library = Library::new(server_name, server_persistent_id);

    library.databases().add(
        DATABASE_ID,
        Database {
            id: DATABASE_ID,
            name: "Library".to_string(),
            persistent_id: 1,
        },
    )?;

    library.containers(DATABASE_ID).add(
        BASE_CONTAINER_ID,
        Container {
            id: BASE_CONTAINER_ID,
            name: "Music".to_string(),
            persistent_id: 1,
            parent_id: None,
            is_base: true,
            is_smart: false,
        },
    )?;

    let mut next_item_id: u32 = 1;
    let mut next_container_item_id: u32 = 1;

    if root.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(root)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(suffix) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let Some(mime_type) = mime_type_for_suffix(suffix) else {
                continue;
            };
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file_name)
                .to_string();
            let file_size = entry.metadata().map(|m| m.len() as u32).unwrap_or(0);

            let item_id = next_item_id;
            next_item_id += 1;

            library.items(DATABASE_ID).add(
                item_id,
                Item {
                    id: item_id,
                    persistent_id: item_id as u64,
                    name,
                    artist: None,
                    album: None,
                    year: None,
                    track: None,
                    duration_ms: None,
                    bitrate: None,
                    genre: None,
                    file_size,
                    file_type: mime_type.to_string(),
                    file_suffix: suffix.to_ascii_lowercase(),
                    has_artwork: artwork_candidate(&path).is_some(),
                    file_name: file_name.to_string(),
                },
            )?;

            let container_item_id = next_container_item_id;
            next_container_item_id += 1;
            library.container_items(BASE_CONTAINER_ID).add(
                container_item_id,
                ContainerItem {
                    id: container_item_id,
                    item_id,
                    container_id: BASE_CONTAINER_ID,
                    order: container_item_id,
                    persistent_id: container_item_id as u64,
                },
            )?;
        }
    }

    library.commit(2)?;
    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scanning_an_empty_directory_yields_an_empty_base_container() {
        let dir = tempfile::tempdir().unwrap();
        let library = scan("Test Server", 1, dir.path()).unwrap();

        assert_eq!(library.databases().get(DATABASE_ID).unwrap().name, "Library");
        assert!(library.items(DATABASE_ID).is_empty().unwrap());
        assert_eq!(library.containers(DATABASE_ID).len().unwrap(), 1);
    }

    #[test]
    fn recognized_audio_files_become_items_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_song.mp3"), b"fake-mp3-bytes").unwrap();
        fs::write(dir.path().join("a_song.flac"), b"fake-flac-bytes").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not audio").unwrap();

        let library = scan("Test Server", 1, dir.path()).unwrap();

        let items = library.items(DATABASE_ID);
        assert_eq!(items.len().unwrap(), 2);

        let first = items.get(1).unwrap();
        assert_eq!(first.name, "a_song");
        assert_eq!(first.file_type, "audio/flac");

        let second = items.get(2).unwrap();
        assert_eq!(second.name, "b_song");
        assert_eq!(second.file_type, "audio/mpeg");

        assert_eq!(library.container_items(BASE_CONTAINER_ID).len().unwrap(), 2);
    }

    #[test]
    fn an_item_with_a_same_stem_image_file_is_marked_has_artwork() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("with_cover.mp3"), b"fake-mp3-bytes").unwrap();
        fs::write(dir.path().join("with_cover.jpg"), b"fake-jpeg-bytes").unwrap();
        fs::write(dir.path().join("no_cover.mp3"), b"fake-mp3-bytes").unwrap();

        let library = scan("Test Server", 1, dir.path()).unwrap();

        let items = library.items(DATABASE_ID);
        let with_cover = items.get(1).unwrap();
        assert_eq!(with_cover.name, "no_cover");
        assert!(!with_cover.has_artwork);

        let no_cover = items.get(2).unwrap();
        assert_eq!(no_cover.name, "with_cover");
        assert!(no_cover.has_artwork);
    }
}
