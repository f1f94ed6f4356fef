pub mod collection;
pub mod entities;

pub use collection::Collection;
pub use entities::{
    Container, ContainerItem, ContainerKey, Database, DatabaseKey, Item, ServerKey,
};

use std::sync::Arc;

use crate::error::Result;
use crate::store::{Revision, RevisionStore};

/// The whole in-memory library: one tree, one revision counter shared
/// by every level (`commit`/`clean` fan out to all four sub-stores in
/// lockstep so `Server.revision` always means the same thing no matter
/// which branch of the tree a client is reading).
pub struct Library {
    pub server_name: String,
    pub server_persistent_id: u64,
    pub databases: Arc<RevisionStore<ServerKey, Database>>,
    pub items: Arc<RevisionStore<DatabaseKey, Item>>,
    pub containers: Arc<RevisionStore<DatabaseKey, Container>>,
    pub container_items: Arc<RevisionStore<ContainerKey, ContainerItem>>,
}

impl Library {
    pub fn new(server_name: impl Into<String>, server_persistent_id: u64) -> Self {
        Self {
            server_name: server_name.into(),
            server_persistent_id,
            databases: Arc::new(RevisionStore::new()),
            items: Arc::new(RevisionStore::new()),
            containers: Arc::new(RevisionStore::new()),
            container_items: Arc::new(RevisionStore::new()),
        }
    }

    /// The server's current revision. Any of the four sub-stores would
    /// do, since `commit`/`clean` keep them in lockstep.
    pub fn revision(&self) -> Revision {
        self.databases.current_revision()
    }

    pub fn databases(&self) -> Collection<ServerKey, Database> {
        Collection::new(self.databases.clone(), ServerKey)
    }

    pub fn items(&self, database: u32) -> Collection<DatabaseKey, Item> {
        Collection::new(self.items.clone(), DatabaseKey(database))
    }

    pub fn containers(&self, database: u32) -> Collection<DatabaseKey, Container> {
        Collection::new(self.containers.clone(), DatabaseKey(database))
    }

    pub fn container_items(&self, container: u32) -> Collection<ContainerKey, ContainerItem> {
        Collection::new(self.container_items.clone(), ContainerKey(container))
    }

    /// Advance every sub-store to `next_revision` in one step.
    pub fn commit(&self, next_revision: Revision) -> Result<()> {
        self.databases.commit(next_revision)?;
        self.items.commit(next_revision)?;
        self.containers.commit(next_revision)?;
        self.container_items.commit(next_revision)?;
        Ok(())
    }

    /// Reclaim history strictly older than `up_to_revision` across
    /// every sub-store in one step.
    pub fn clean(&self, up_to_revision: Revision) -> Result<()> {
        self.databases.clean(up_to_revision)?;
        self.items.clean(up_to_revision)?;
        self.containers.clean(up_to_revision)?;
        self.container_items.clean(up_to_revision)?;
        Ok(())
    }

    /// Remove a database and cascade-tombstone its items and
    /// containers (which themselves cascade onto their container-items).
    pub fn remove_database(&self, database: u32) -> Result<()> {
        // Containers first, cascading each one's own container-items.
        let containers = self.containers(database);
        if let Ok(ids) = containers.ids() {
            for container_id in ids {
                let _ = self.container_items(container_id).remove_all();
            }
        }
        let _ = self.items.remove(DatabaseKey(database), None);
        let _ = self.containers.remove(DatabaseKey(database), None);
        self.databases().remove(database)
    }

    /// Remove a container and cascade-tombstone its container-items.
    pub fn remove_container(&self, database: u32, container: u32) -> Result<()> {
        let _ = self.container_items(container).remove_all();
        self.containers(database).remove(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_a_database_cascades_to_its_items_and_containers() {
        let lib = Library::new("Test Server", 42);
        lib.databases()
            .add(
                1,
                Database {
                    id: 1,
                    name: "Library".into(),
                    persistent_id: 1,
                },
            )
            .unwrap();
        lib.items(1)
            .add(
                10,
                Item {
                    id: 10,
                    persistent_id: 10,
                    name: "Song".into(),
                    artist: None,
                    album: None,
                    year: None,
                    track: None,
                    duration_ms: None,
                    bitrate: None,
                    genre: None,
                    file_size: 0,
                    file_type: "audio/mpeg".into(),
                    file_suffix: "mp3".into(),
                    has_artwork: false,
                    file_name: "song.mp3".into(),
                },
            )
            .unwrap();
        lib.commit(2).unwrap();

        lib.remove_database(1).unwrap();
        lib.commit(3).unwrap();

        assert!(lib.databases().get(1).is_err());
        assert!(lib.items(1).get(10).is_err());
    }
}
