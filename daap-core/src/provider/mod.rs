//! The provider/session protocol: client session bookkeeping, the
//! long-poll revision wait, and the hand-off to a [`MediaSource`] for
//! actual byte streaming. The long-poll wait is built on a
//! `tokio::sync::watch` receiver; `check_sessions` reclaims history
//! once every active session has caught up to it.

pub mod media;
pub mod session;

pub use media::{ByteRange, MediaSource, MediaStream};
pub use session::{Session, SessionCounters, SessionState};

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::model::{Item, Library};
use crate::response::Capabilities;
use crate::store::Revision;

/// How long a `get_next_revision` long-poll is allowed to block before
/// it gives up and reports the current revision unchanged (a client
/// that polled right as nothing changed, not an error).
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(1800);

type Hook<A> = Box<dyn Fn(A) + Send + Sync>;

#[derive(Default)]
struct Hooks {
    updated: Vec<Hook<Revision>>,
    session_created: Vec<Hook<u32>>,
    session_destroyed: Vec<Hook<u32>>,
}

impl Hooks {
    fn fire_updated(&self, revision: Revision) {
        for hook in &self.updated {
            hook(revision);
        }
    }

    fn fire_session_created(&self, session_id: u32) {
        for hook in &self.session_created {
            hook(session_id);
        }
    }

    fn fire_session_destroyed(&self, session_id: u32) {
        for hook in &self.session_destroyed {
            hook(session_id);
        }
    }
}

struct SessionTable {
    sessions: HashMap<u32, Session>,
    next_id: u32,
}

/// Reverts a session from `Streaming` back to `Connected` when dropped,
/// on every exit path (normal completion, early return, or the caller's
/// future being cancelled/dropped by an aborted HTTP request).
pub struct StreamGuard {
    provider: Arc<ProviderInner>,
    session_id: u32,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let mut table = self.provider.sessions.lock();
        if let Some(session) = table.sessions.get_mut(&self.session_id) {
            session.state = SessionState::Connected;
        }
    }
}

struct ProviderInner {
    library: Arc<Library>,
    media: Arc<dyn MediaSource>,
    capabilities: Capabilities,
    sessions: Mutex<SessionTable>,
    revision_tx: watch::Sender<Revision>,
    hooks: Hooks,
}

/// The provider: owns the [`Library`], the session table, and the
/// revision broadcast channel. Cloning is cheap (an `Arc` handle) and
/// every clone shares the same sessions and library.
#[derive(Clone)]
pub struct Provider {
    inner: Arc<ProviderInner>,
}

impl Provider {
    pub fn new(library: Arc<Library>, media: Arc<dyn MediaSource>, capabilities: Capabilities) -> Self {
        let (revision_tx, _) = watch::channel(library.revision());
        Self {
            inner: Arc::new(ProviderInner {
                library,
                media,
                capabilities,
                sessions: Mutex::new(SessionTable {
                    sessions: HashMap::new(),
                    next_id: 1,
                }),
                revision_tx,
                hooks: Hooks::default(),
            }),
        }
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.inner.library
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    pub fn create_session(
        &self,
        user_agent: Option<String>,
        remote_address: Option<IpAddr>,
        client_version: Option<String>,
    ) -> u32 {
        let mut table = self.inner.sessions.lock();
        let id = table.next_id;
        table.next_id += 1;
        table
            .sessions
            .insert(id, Session::new(id, remote_address, user_agent, client_version));
        drop(table);
        self.inner.hooks.fire_session_created(id);
        id
    }

    /// Idempotent: destroying an unknown session is a no-op.
    pub fn destroy_session(&self, session_id: u32) {
        let removed = self.inner.sessions.lock().sessions.remove(&session_id).is_some();
        if removed {
            self.inner.hooks.fire_session_destroyed(session_id);
            // A lagging session might have been the only thing blocking
            // reclamation for everyone else.
            self.check_sessions();
        }
    }

    /// Blocks (subject to the 1800s bound) until the server's revision
    /// advances past `revision`, if the client is caught up
    /// (`delta == revision`). Otherwise returns the current revision
    /// immediately so the client can catch up on its own pace.
    pub async fn get_next_revision(
        &self,
        session_id: u32,
        revision: Revision,
        delta: Revision,
    ) -> Result<Revision> {
        {
            let mut table = self.inner.sessions.lock();
            let session = table
                .sessions
                .get_mut(&session_id)
                .ok_or(Error::UnknownSession(session_id as u64))?;
            session.state = SessionState::Connected;
            if delta != revision {
                return Ok(self.inner.library.revision());
            }
            session.revision = session.revision.max(revision);
        }

        self.check_sessions();

        let mut receiver = self.inner.revision_tx.subscribe();
        let wait = async {
            loop {
                let current = *receiver.borrow();
                if current > revision {
                    return current;
                }
                if receiver.changed().await.is_err() {
                    return *receiver.borrow();
                }
            }
        };

        match tokio::time::timeout(LONG_POLL_TIMEOUT, wait).await {
            Ok(next_revision) => Ok(next_revision),
            Err(_) => Ok(self.inner.library.revision()),
        }
    }

    /// The writer-side entry point: advances the library by one
    /// revision, wakes every long-polling session, and reclaims history
    /// once it is behind no active session.
    pub fn update(&self) -> Result<Revision> {
        let next_revision = self.inner.library.revision() + 1;
        self.inner.library.commit(next_revision)?;
        let _ = self.inner.revision_tx.send(next_revision);
        self.check_sessions();
        self.inner.hooks.fire_updated(next_revision);
        Ok(next_revision)
    }

    /// Reclaims revision history once every active session has caught
    /// up to it. A no-op with zero active sessions — there is nothing
    /// to reclaim against, so `clean` is skipped rather than called
    /// with a sentinel.
    fn check_sessions(&self) {
        let table = self.inner.sessions.lock();
        let Some(min_revision) = table.sessions.values().map(|s| s.revision).min() else {
            return;
        };
        drop(table);
        if min_revision == self.inner.library.revision() {
            let _ = self.inner.library.clean(min_revision);
        }
    }

    /// Resolves the `(revision, delta)` query pair shared by every
    /// listing endpoint into `(new_revision, old_revision)`: `delta ==
    /// 0` means a full (non-incremental) fetch against the live
    /// revision; any other `delta` means a diff against that baseline.
    pub fn resolve_view(&self, revision: Revision, delta: Revision) -> (Revision, Option<Revision>) {
        if delta == 0 {
            (self.inner.library.revision(), None)
        } else {
            (revision, Some(delta))
        }
    }

    pub fn on_updated(&mut self, hook: impl Fn(Revision) + Send + Sync + 'static) {
        Arc::get_mut(&mut self.inner)
            .expect("hooks must be registered before the provider is cloned/shared")
            .hooks
            .updated
            .push(Box::new(hook));
    }

    pub fn on_session_created(&mut self, hook: impl Fn(u32) + Send + Sync + 'static) {
        Arc::get_mut(&mut self.inner)
            .expect("hooks must be registered before the provider is cloned/shared")
            .hooks
            .session_created
            .push(Box::new(hook));
    }

    pub fn on_session_destroyed(&mut self, hook: impl Fn(u32) + Send + Sync + 'static) {
        Arc::get_mut(&mut self.inner)
            .expect("hooks must be registered before the provider is cloned/shared")
            .hooks
            .session_destroyed
            .push(Box::new(hook));
    }

    /// Streams item bytes for `item` within `database`. Transitions the
    /// session to `Streaming` for the lifetime of the returned
    /// [`StreamGuard`]; dropping it (end of stream, error, or request
    /// cancellation) reverts to `Connected`.
    pub async fn get_item(
        &self,
        session_id: u32,
        database: u32,
        item: u32,
        byte_range: Option<ByteRange>,
    ) -> Result<(MediaStream, StreamGuard)> {
        let record = self.inner.library.items(database).get(item)?;

        {
            let mut table = self.inner.sessions.lock();
            let session = table
                .sessions
                .get_mut(&session_id)
                .ok_or(Error::UnknownSession(session_id as u64))?;
            session.state = SessionState::Streaming;
            session.counters.items += 1;
            if byte_range.is_none() {
                session.counters.items_unique += 1;
            }
        }
        let guard = StreamGuard {
            provider: self.inner.clone(),
            session_id,
        };

        match self.inner.media.open_item(&record, byte_range).await {
            Ok(stream) => Ok((stream, guard)),
            Err(err) => {
                drop(guard);
                Err(err)
            }
        }
    }

    /// Streams artwork bytes for `item` within `database`.
    pub async fn get_artwork(
        &self,
        session_id: u32,
        database: u32,
        item: u32,
    ) -> Result<MediaStream> {
        if !self.inner.capabilities.supports_artwork {
            return Err(Error::NotSupported("artwork"));
        }
        let record = self.inner.library.items(database).get(item)?;
        {
            let mut table = self.inner.sessions.lock();
            let session = table
                .sessions
                .get_mut(&session_id)
                .ok_or(Error::UnknownSession(session_id as u64))?;
            session.counters.artworks += 1;
        }
        self.inner.media.open_artwork(&record).await
    }

    /// Fetches a copy of a session's current bookkeeping, mainly for
    /// diagnostics/tests.
    pub fn session_snapshot(&self, session_id: u32) -> Option<Session> {
        self.inner.sessions.lock().sessions.get(&session_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Database;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct NullMedia;

    #[async_trait]
    impl MediaSource for NullMedia {
        async fn open_item(&self, _item: &Item, _byte_range: Option<ByteRange>) -> Result<MediaStream> {
            Err(Error::NotSupported("streaming"))
        }

        async fn open_artwork(&self, _item: &Item) -> Result<MediaStream> {
            Err(Error::NotSupported("artwork"))
        }
    }

    fn provider() -> Provider {
        let library = Arc::new(Library::new("Test Server", 1));
        library
            .databases()
            .add(
                1,
                Database {
                    id: 1,
                    name: "Library".into(),
                    persistent_id: 1,
                },
            )
            .unwrap();
        library.commit(2).unwrap();
        Provider::new(
            library,
            Arc::new(NullMedia),
            Capabilities {
                supports_persistent_id: true,
                supports_artwork: false,
            },
        )
    }

    #[test]
    fn creating_and_destroying_a_session_fires_hooks_in_registration_order() {
        let mut p = provider();
        let created = Arc::new(AtomicU64::new(0));
        let destroyed = Arc::new(AtomicU64::new(0));
        let c = created.clone();
        let d = destroyed.clone();
        p.on_session_created(move |_id| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        p.on_session_destroyed(move |_id| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let id = p.create_session(None, None, None);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        p.destroy_session(id);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        // Idempotent: destroying again fires nothing.
        p.destroy_session(id);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delta_behind_revision_returns_immediately_without_blocking() {
        let p = provider();
        let id = p.create_session(None, None, None);
        let next = p.get_next_revision(id, 5, 0).await.unwrap();
        assert_eq!(next, p.library().revision());
    }

    #[tokio::test]
    async fn caught_up_client_unblocks_when_update_is_called() {
        let p = provider();
        let id = p.create_session(None, None, None);
        let starting_revision = p.library().revision();

        let waiter = {
            let p = p.clone();
            tokio::spawn(async move { p.get_next_revision(id, starting_revision, starting_revision).await })
        };

        // Give the waiter a chance to subscribe before we publish.
        tokio::task::yield_now().await;
        let next_revision = p.update().unwrap();

        let observed = waiter.await.unwrap().unwrap();
        assert_eq!(observed, next_revision);
    }

    #[tokio::test]
    async fn streaming_an_item_reverts_session_state_on_drop() {
        let p = provider();
        p.library()
            .items(1)
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
                    file_size: 1,
                    file_type: "audio/mpeg".into(),
                    file_suffix: "mp3".into(),
                    has_artwork: false,
                    file_name: "song.mp3".into(),
                },
            )
            .unwrap();
        p.library().commit(2).unwrap();

        let id = p.create_session(None, None, None);
        // NullMedia always errors, which still must revert state.
        let _ = p.get_item(id, 1, 10, None).await;
        let session = p.session_snapshot(id).unwrap();
        assert_eq!(session.state, SessionState::Connected);
    }

    #[test]
    fn resolve_view_treats_zero_delta_as_a_full_live_fetch() {
        let p = provider();
        let (new_revision, old_revision) = p.resolve_view(0, 0);
        assert_eq!(new_revision, p.library().revision());
        assert!(old_revision.is_none());

        let (new_revision, old_revision) = p.resolve_view(5, 3);
        assert_eq!(new_revision, 5);
        assert_eq!(old_revision, Some(3));
    }
}
