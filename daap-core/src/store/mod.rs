//! A versioned key-value store: parent keys hold an ordered set of
//! children, each child key holds an append-only history of values.
//! Every retained revision remains queryable until [`RevisionStore::clean`]
//! discards it.
//!
//! Writes are tagged with the *next* revision number (current + 1) as
//! soon as they happen, so a reader that asks for the default (no
//! explicit revision) always observes its own just-written data. That
//! tag only becomes an official, queryable revision once
//! [`RevisionStore::commit`] is called with the revision number the
//! caller wants to advance to — before that, asking for the pending
//! revision explicitly yields [`Error::RevisionInFuture`], exactly as
//! if the write hadn't happened yet.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use parking_lot::RwLock;

use crate::error::{Error, Result};

pub type Revision = u64;

#[derive(Debug, Clone)]
enum Op<V> {
    Add(V),
    Edit(V),
    Delete,
}

#[derive(Debug, Clone)]
struct ValueEntry<V> {
    revision: Revision,
    op: Op<V>,
}

#[derive(Debug, Clone)]
struct ParentEntry {
    revision: Revision,
    /// Live child ids, newest insertion first.
    order: Vec<u32>,
    deleted: bool,
}

struct Inner<P, V> {
    current: Revision,
    earliest: Revision,
    values: HashMap<(P, u32), Vec<ValueEntry<V>>>,
    parents: HashMap<P, Vec<ParentEntry>>,
    dirty_values: HashSet<(P, u32)>,
    dirty_parents: HashSet<P>,
}

pub struct RevisionStore<P, V> {
    inner: RwLock<Inner<P, V>>,
}

impl<P, V> Default for RevisionStore<P, V>
where
    P: Clone + Eq + Hash + Debug,
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, V> RevisionStore<P, V>
where
    P: Clone + Eq + Hash + Debug,
    V: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                current: 1,
                earliest: 1,
                values: HashMap::new(),
                parents: HashMap::new(),
                dirty_values: HashSet::new(),
                dirty_parents: HashSet::new(),
            }),
        }
    }

    pub fn current_revision(&self) -> Revision {
        self.inner.read().current
    }

    pub fn earliest_revision(&self) -> Revision {
        self.inner.read().earliest
    }

    /// Add or update `(parent, child)`. Fails with [`Error::DeletedParent`]
    /// if `parent`'s collection has been tombstoned by a prior
    /// `remove(parent, None)`.
    pub fn set(&self, parent: P, child: u32, value: V) -> Result<()> {
        let mut inner = self.inner.write();

        if let Some(tail) = inner.parents.get(&parent).and_then(|h| h.last()) {
            if tail.deleted {
                return Err(Error::DeletedParent(format!("{parent:?}")));
            }
        }

        let pending_rev = inner.current + 1;
        let key = (parent.clone(), child);

        let last_committed_is_live = inner
            .values
            .get(&key)
            .and_then(|h| find_le(h, inner.current, |e| e.revision))
            .map(|e| !matches!(e.op, Op::Delete))
            .unwrap_or(false);
        let op = if last_committed_is_live {
            Op::Edit(value)
        } else {
            Op::Add(value)
        };
        let is_add = matches!(op, Op::Add(_));

        let history = inner.values.entry(key.clone()).or_default();
        push_or_replace(history, pending_rev, op);
        inner.dirty_values.insert(key);

        if is_add {
            let p_hist = inner.parents.entry(parent.clone()).or_default();
            let mut order = p_hist.last().map(|e| e.order.clone()).unwrap_or_default();
            if !order.contains(&child) {
                order.insert(0, child);
            }
            push_or_replace_parent(p_hist, pending_rev, order, false);
            inner.dirty_parents.insert(parent);
        }

        Ok(())
    }

    /// Remove a single child, or (when `child` is `None`) tombstone the
    /// whole parent collection, cascading tombstones onto every child
    /// currently live under it.
    pub fn remove(&self, parent: P, child: Option<u32>) -> Result<()> {
        let mut inner = self.inner.write();
        let pending_rev = inner.current + 1;

        match child {
            Some(c) => {
                let key = (parent.clone(), c);
                let currently_live = inner
                    .values
                    .get(&key)
                    .and_then(|h| h.last())
                    .map(|e| !matches!(e.op, Op::Delete))
                    .unwrap_or(false);
                if !currently_live {
                    return Err(Error::NotFound(format!("{parent:?}/{c}")));
                }

                let history = inner.values.get_mut(&key).expect("checked live above");
                push_or_replace(history, pending_rev, Op::Delete);
                inner.dirty_values.insert(key);

                let p_hist = inner.parents.entry(parent.clone()).or_default();
                let mut order = p_hist.last().map(|e| e.order.clone()).unwrap_or_default();
                order.retain(|id| *id != c);
                push_or_replace_parent(p_hist, pending_rev, order, false);
                inner.dirty_parents.insert(parent);

                Ok(())
            }
            None => {
                let live_order = match inner.parents.get(&parent).and_then(|h| h.last()) {
                    Some(tail) if !tail.deleted => tail.order.clone(),
                    _ => return Err(Error::NotFound(format!("{parent:?}"))),
                };

                for child_id in &live_order {
                    let key = (parent.clone(), *child_id);
                    if let Some(history) = inner.values.get_mut(&key) {
                        push_or_replace(history, pending_rev, Op::Delete);
                    }
                    inner.dirty_values.insert(key);
                }

                let p_hist = inner.parents.get_mut(&parent).expect("checked above");
                push_or_replace_parent(p_hist, pending_rev, Vec::new(), true);
                inner.dirty_parents.insert(parent);

                Ok(())
            }
        }
    }

    /// Value at `revision` (default: the latest write, committed or not).
    pub fn get(&self, parent: P, child: u32, revision: Option<Revision>) -> Result<V> {
        let inner = self.inner.read();
        value_locked(&inner, &parent, child, revision)
    }

    /// Live child ids under `parent` at `revision`, newest insertion
    /// first. A parent that was never given any children returns an
    /// empty list rather than erroring — only an explicit tombstone
    /// (`remove(parent, None)`) raises [`Error::NotFound`].
    pub fn get_children(&self, parent: P, revision: Option<Revision>) -> Result<Vec<u32>> {
        let inner = self.inner.read();
        children_locked(&inner, &parent, revision)
    }

    /// `(child_id, value)` pairs under `parent` at `revision`, in the
    /// same order as [`RevisionStore::get_children`].
    pub fn iterate(
        &self,
        parent: P,
        revision: Option<Revision>,
    ) -> Result<std::vec::IntoIter<(u32, V)>> {
        let inner = self.inner.read();
        let ids = children_locked(&inner, &parent, revision)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push((id, value_locked(&inner, &parent, id, revision)?));
        }
        Ok(out.into_iter())
    }

    /// Advance the current revision. Bundles every `set`/`remove` since
    /// the last commit under `next_revision`.
    pub fn commit(&self, next_revision: Revision) -> Result<()> {
        let mut inner = self.inner.write();
        if next_revision <= inner.current {
            return Err(Error::Internal(format!(
                "commit({next_revision}) must advance past current revision {}",
                inner.current
            )));
        }

        let old_pending = inner.current + 1;

        let dirty_values = std::mem::take(&mut inner.dirty_values);
        for key in dirty_values {
            if let Some(tail) = inner.values.get_mut(&key).and_then(|h| h.last_mut()) {
                if tail.revision == old_pending {
                    tail.revision = next_revision;
                }
            }
        }

        let dirty_parents = std::mem::take(&mut inner.dirty_parents);
        for parent in dirty_parents {
            if let Some(tail) = inner.parents.get_mut(&parent).and_then(|h| h.last_mut()) {
                if tail.revision == old_pending {
                    tail.revision = next_revision;
                }
            }
        }

        inner.current = next_revision;
        Ok(())
    }

    /// Discard history strictly older than `up_to_revision`. Data
    /// visible exactly at `up_to_revision` and later is retained.
    pub fn clean(&self, up_to_revision: Revision) -> Result<()> {
        let mut inner = self.inner.write();
        if up_to_revision > inner.current {
            return Err(Error::RevisionInFuture {
                requested: up_to_revision,
                current: inner.current,
            });
        }

        for history in inner.values.values_mut() {
            prune(history, up_to_revision, |e| e.revision);
        }
        for history in inner.parents.values_mut() {
            prune(history, up_to_revision, |e| e.revision);
        }
        inner.earliest = up_to_revision;
        Ok(())
    }

    /// `+1` for ids present at `rev_a` and absent or changed at `rev_b`,
    /// `-1` for ids present at `rev_b` and absent at `rev_a`, `0` for
    /// ids identical at both.
    pub fn diff(&self, parent: P, rev_a: Revision, rev_b: Revision) -> Result<Vec<(u32, i8)>> {
        let inner = self.inner.read();
        let ids_a = children_locked(&inner, &parent, Some(rev_a))?;
        let ids_b = children_locked(&inner, &parent, Some(rev_b))?;

        let mut map_a = HashMap::with_capacity(ids_a.len());
        for id in ids_a {
            map_a.insert(id, value_locked(&inner, &parent, id, Some(rev_a))?);
        }
        let mut map_b = HashMap::with_capacity(ids_b.len());
        for id in ids_b {
            map_b.insert(id, value_locked(&inner, &parent, id, Some(rev_b))?);
        }

        let mut out = Vec::new();
        for (id, va) in &map_a {
            match map_b.get(id) {
                None => out.push((*id, 1)),
                Some(vb) => out.push((*id, if va == vb { 0 } else { 1 })),
            }
        }
        for id in map_b.keys() {
            if !map_a.contains_key(id) {
                out.push((*id, -1));
            }
        }
        Ok(out)
    }
}

fn value_locked<P, V>(
    inner: &Inner<P, V>,
    parent: &P,
    child: u32,
    revision: Option<Revision>,
) -> Result<V>
where
    P: Clone + Eq + Hash + Debug,
    V: Clone,
{
    let missing = || Error::NotFound(format!("{parent:?}/{child}"));
    let history = inner
        .values
        .get(&(parent.clone(), child))
        .ok_or_else(missing)?;

    let entry = match revision {
        None => history.last(),
        Some(r) => {
            if r > inner.current {
                return Err(Error::RevisionInFuture {
                    requested: r,
                    current: inner.current,
                });
            }
            if r < inner.earliest {
                return Err(Error::RevisionGone {
                    requested: r,
                    earliest: inner.earliest,
                });
            }
            find_le(history, r, |e| e.revision)
        }
    }
    .ok_or_else(missing)?;

    match &entry.op {
        Op::Delete => Err(missing()),
        Op::Add(v) | Op::Edit(v) => Ok(v.clone()),
    }
}

fn children_locked<P, V>(
    inner: &Inner<P, V>,
    parent: &P,
    revision: Option<Revision>,
) -> Result<Vec<u32>>
where
    P: Clone + Eq + Hash + Debug,
{
    let history = match inner.parents.get(parent) {
        None => return Ok(Vec::new()),
        Some(h) => h,
    };

    let entry = match revision {
        None => history.last(),
        Some(r) => {
            if r > inner.current {
                return Err(Error::RevisionInFuture {
                    requested: r,
                    current: inner.current,
                });
            }
            if r < inner.earliest {
                return Err(Error::RevisionGone {
                    requested: r,
                    earliest: inner.earliest,
                });
            }
            find_le(history, r, |e| e.revision)
        }
    };

    match entry {
        None => Ok(Vec::new()),
        Some(e) if e.deleted => Err(Error::NotFound(format!("{parent:?}"))),
        Some(e) => Ok(e.order.clone()),
    }
}

/// Rightmost entry with `rev(entry) <= revision` (right-biased binary
/// search, as a sorted-by-revision append-only history allows).
fn find_le<T>(entries: &[T], revision: Revision, rev: impl Fn(&T) -> Revision) -> Option<&T> {
    let idx = entries.partition_point(|e| rev(e) <= revision);
    if idx == 0 {
        None
    } else {
        Some(&entries[idx - 1])
    }
}

fn push_or_replace<V>(history: &mut Vec<ValueEntry<V>>, revision: Revision, op: Op<V>) {
    if let Some(tail) = history.last_mut() {
        if tail.revision == revision {
            tail.op = op;
            return;
        }
    }
    history.push(ValueEntry { revision, op });
}

fn push_or_replace_parent(
    history: &mut Vec<ParentEntry>,
    revision: Revision,
    order: Vec<u32>,
    deleted: bool,
) {
    if let Some(tail) = history.last_mut() {
        if tail.revision == revision {
            tail.order = order;
            tail.deleted = deleted;
            return;
        }
    }
    history.push(ParentEntry {
        revision,
        order,
        deleted,
    });
}

fn prune<T>(entries: &mut Vec<T>, up_to: Revision, rev: impl Fn(&T) -> Revision) {
    let idx = entries.partition_point(|e| rev(e) <= up_to);
    let keep_from = idx.saturating_sub(1);
    if keep_from > 0 {
        entries.drain(0..keep_from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RevisionStore<&'static str, String> {
        RevisionStore::new()
    }

    #[test]
    fn add_then_commit_is_visible_at_new_revision() {
        let s = store();
        s.set("db", 1, "Library".to_string()).unwrap();
        s.commit(2).unwrap();

        assert_eq!(s.current_revision(), 2);
        assert_eq!(s.get("db", 1, Some(2)).unwrap(), "Library");
        assert!(matches!(
            s.get("db", 1, Some(1)).unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn default_revision_sees_uncommitted_writes() {
        let s = store();
        s.set("db", 1, "Library".to_string()).unwrap();
        assert_eq!(s.get("db", 1, None).unwrap(), "Library");
    }

    #[test]
    fn explicit_future_revision_is_rejected_before_commit() {
        let s = store();
        s.set("db", 1, "Library".to_string()).unwrap();
        assert!(matches!(
            s.get("db", 1, Some(2)).unwrap_err(),
            Error::RevisionInFuture { .. }
        ));
    }

    #[test]
    fn iterate_orders_newest_insertion_first() {
        let s = store();
        s.set("db", 1, "A".to_string()).unwrap();
        s.set("db", 2, "B".to_string()).unwrap();
        s.set("db", 3, "C".to_string()).unwrap();
        s.commit(2).unwrap();

        let ids: Vec<u32> = s.get_children("db", None).unwrap();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn delete_then_set_in_same_window_is_an_edit_not_an_add() {
        let s = store();
        s.set("db", 1, "A".to_string()).unwrap();
        s.commit(2).unwrap();

        s.remove("db", Some(1)).unwrap();
        s.set("db", 1, "A2".to_string()).unwrap();
        s.commit(3).unwrap();

        // still present, and the diff from rev 2 to rev 3 reports a
        // change (sign 1), not an add-after-tombstone artifact.
        assert_eq!(s.get("db", 1, Some(3)).unwrap(), "A2");
        let diff = s.diff("db", 3, 2).unwrap();
        assert_eq!(diff, vec![(1, 1)]);
    }

    #[test]
    fn remove_parent_cascades_tombstones_to_children() {
        let s = store();
        s.set("db", 1, "A".to_string()).unwrap();
        s.set("db", 2, "B".to_string()).unwrap();
        s.commit(2).unwrap();

        s.remove("db", None).unwrap();
        s.commit(3).unwrap();

        assert!(matches!(
            s.get_children("db", Some(3)).unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(s.get("db", 1, Some(3)).unwrap_err(), Error::NotFound(_)));
        // history at 2 is unaffected.
        assert_eq!(s.get_children("db", Some(2)).unwrap(), vec![2, 1]);
    }

    #[test]
    fn clean_reclaims_history_strictly_older_than_the_given_revision() {
        let s = store();
        s.set("db", 1, "A".to_string()).unwrap();
        s.commit(2).unwrap();
        s.set("db", 1, "A2".to_string()).unwrap();
        s.commit(3).unwrap();

        s.clean(3).unwrap();
        assert_eq!(s.earliest_revision(), 3);
        assert!(matches!(
            s.get("db", 1, Some(2)).unwrap_err(),
            Error::RevisionGone { .. }
        ));
        assert_eq!(s.get("db", 1, Some(3)).unwrap(), "A2");
    }

    #[test]
    fn diff_reports_additions_edits_and_removals() {
        let s = store();
        s.set("db", 1, "A".to_string()).unwrap();
        s.commit(2).unwrap();
        s.set("db", 2, "B".to_string()).unwrap();
        s.remove("db", Some(1)).unwrap();
        s.commit(3).unwrap();

        let mut diff = s.diff("db", 3, 2).unwrap();
        diff.sort();
        assert_eq!(diff, vec![(1, -1), (2, 1)]);
    }

    #[test]
    fn set_on_deleted_parent_fails() {
        let s = store();
        s.set("db", 1, "A".to_string()).unwrap();
        s.commit(2).unwrap();
        s.remove("db", None).unwrap();
        s.commit(3).unwrap();

        assert!(matches!(
            s.set("db", 2, "B".to_string()).unwrap_err(),
            Error::DeletedParent(_)
        ));
    }

    #[test]
    fn remove_missing_child_fails_not_found() {
        let s = store();
        assert!(matches!(
            s.remove("db", Some(1)).unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn empty_untouched_parent_lists_empty_not_an_error() {
        let s = store();
        assert_eq!(s.get_children("db", None).unwrap(), Vec::<u32>::new());
    }
}
