use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{Revision, RevisionStore};

/// A lightweight handle onto one parent's children in a
/// [`RevisionStore`]. Carries no data itself — every read goes through
/// to the store. A `Collection` built with an explicit revision is
/// read-only; mutating it fails with [`Error::ReadOnlyRevision`].
#[derive(Clone)]
pub struct Collection<P, V> {
    store: Arc<RevisionStore<P, V>>,
    parent: P,
    revision: Option<Revision>,
}

impl<P, V> Collection<P, V>
where
    P: Clone + Eq + Hash + Debug,
    V: Clone + PartialEq,
{
    pub fn new(store: Arc<RevisionStore<P, V>>, parent: P) -> Self {
        Self {
            store,
            parent,
            revision: None,
        }
    }

    /// A read-only view of this collection as of `revision`.
    pub fn at(&self, revision: Revision) -> Self {
        Self {
            store: self.store.clone(),
            parent: self.parent.clone(),
            revision: Some(revision),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.revision.is_some()
    }

    pub fn revision(&self) -> Revision {
        self.revision.unwrap_or_else(|| self.store.current_revision())
    }

    pub fn get(&self, id: u32) -> Result<V> {
        self.store.get(self.parent.clone(), id, self.revision)
    }

    pub fn ids(&self) -> Result<Vec<u32>> {
        self.store.get_children(self.parent.clone(), self.revision)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.ids()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn iter(&self) -> Result<std::vec::IntoIter<(u32, V)>> {
        self.store.iterate(self.parent.clone(), self.revision)
    }

    fn require_writable(&self) -> Result<()> {
        if let Some(revision) = self.revision {
            return Err(Error::ReadOnlyRevision(revision));
        }
        Ok(())
    }

    pub fn add(&self, id: u32, value: V) -> Result<()> {
        self.require_writable()?;
        self.store.set(self.parent.clone(), id, value)
    }

    pub fn remove(&self, id: u32) -> Result<()> {
        self.require_writable()?;
        self.store.remove(self.parent.clone(), Some(id))
    }

    /// Tombstone the whole collection, cascading onto every live child.
    /// Used when the owning entity itself (e.g. a `Container`) is
    /// removed from its own parent collection.
    pub fn remove_all(&self) -> Result<()> {
        self.require_writable()?;
        self.store.remove(self.parent.clone(), None)
    }

    /// Ids present in `self` and either absent or changed in `other`.
    pub fn updated(&self, other: &Self) -> Result<Vec<u32>> {
        let diff = self
            .store
            .diff(self.parent.clone(), self.revision(), other.revision())?;
        Ok(diff
            .into_iter()
            .filter(|(_, sign)| *sign == 1)
            .map(|(id, _)| id)
            .collect())
    }

    /// Ids present in `other` but absent in `self`.
    pub fn removed(&self, other: &Self) -> Result<Vec<u32>> {
        let diff = self
            .store
            .diff(self.parent.clone(), self.revision(), other.revision())?;
        Ok(diff
            .into_iter()
            .filter(|(_, sign)| *sign == -1)
            .map(|(id, _)| id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Collection<&'static str, String> {
        Collection::new(Arc::new(RevisionStore::new()), "parent")
    }

    #[test]
    fn historical_view_is_read_only() {
        let c = fresh();
        c.add(1, "a".into()).unwrap();
        c.store.commit(2).unwrap();

        let historical = c.at(1);
        assert!(historical.is_read_only());
        assert!(matches!(
            historical.add(2, "b".into()).unwrap_err(),
            Error::ReadOnlyRevision(1)
        ));
    }

    #[test]
    fn updated_and_removed_mirror_the_store_diff() {
        let c = fresh();
        c.add(1, "a".into()).unwrap();
        c.store.commit(2).unwrap();
        let old = c.at(2);

        c.add(2, "b".into()).unwrap();
        c.remove(1).unwrap();
        c.store.commit(3).unwrap();

        assert_eq!(c.updated(&old).unwrap(), vec![2]);
        assert_eq!(c.removed(&old).unwrap(), vec![1]);
    }
}
