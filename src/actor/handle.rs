use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::{ActorStats, Command};
use crate::collection::Collection;
use crate::doc::{CasResult, Codec, Document, VersionedDoc, NO_DOCUMENT};
use crate::engine::{ListOptions, ListPage};
use crate::error::StoreError;
use crate::registry::ActorId;

/// Client handle to a [`StoreActor`](super::StoreActor).
///
/// Cheap to clone; every clone talks to the same actor. Values are encoded
/// with the actor's codec before they are sent and decoded after they come
/// back, so the actor itself only ever sees bytes.
#[derive(Clone)]
pub struct StoreHandle {
    id: ActorId,
    sender: mpsc::Sender<Command>,
    codec: Codec,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("id", &self.id)
            .field("codec", &self.codec)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl StoreHandle {
    pub(crate) fn new(id: ActorId, sender: mpsc::Sender<Command>, codec: Codec) -> Self {
        Self { id, sender, codec }
    }

    /// Identity of the actor behind this handle.
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Whether the actor has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Typed accessor for documents of one collection.
    pub fn collection<D: Document>(&self) -> Collection<'_, D> {
        Collection::new(self)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, StoreError>>) -> Command,
    ) -> Result<T, StoreError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| StoreError::ActorStopped)?;
        response.await.map_err(|_| StoreError::ActorStopped)?
    }

    /// Read a document. Returns `None` if the key holds nothing.
    pub async fn get_doc<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<VersionedDoc<T>>, StoreError> {
        let key = validate_key(key)?;
        let stored = self.request(|reply| Command::Get { key, reply }).await?;
        stored
            .map(|s| {
                let data = self.codec.decode(&s.bytes)?;
                Ok::<_, StoreError>(VersionedDoc::new(s.version, data))
            })
            .transpose()
    }

    /// Read a document that must exist.
    pub async fn require_doc<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<VersionedDoc<T>, StoreError> {
        self.get_doc(key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    /// Write `value` iff the stored version equals `expected_version`.
    ///
    /// Use [`NO_DOCUMENT`] to create a key that must not exist yet. A stale
    /// version is reported as `CasResult { ok: false, version: current }`,
    /// not as an error.
    pub async fn cas_put<V: Serialize + ?Sized>(
        &self,
        key: &str,
        expected_version: u64,
        value: &V,
    ) -> Result<CasResult, StoreError> {
        let key = validate_key(key)?;
        let bytes = self.codec.encode(value)?;
        self.request(|reply| Command::CasPut {
            key,
            expected: expected_version,
            bytes,
            reply,
        })
        .await
    }

    /// Like [`cas_put`](Self::cas_put), but a stale version is a
    /// [`StoreError::Conflict`]. Returns the new version.
    pub async fn cas_put_strict<V: Serialize + ?Sized>(
        &self,
        key: &str,
        expected_version: u64,
        value: &V,
    ) -> Result<u64, StoreError> {
        let result = self.cas_put(key, expected_version, value).await?;
        if result.ok {
            Ok(result.version)
        } else {
            Err(StoreError::Conflict {
                key: key.to_string(),
                expected: expected_version,
                actual: result.version,
            })
        }
    }

    /// Unconditional write (last writer wins). Still advances the version,
    /// which is returned.
    pub async fn put<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
    ) -> Result<u64, StoreError> {
        let key = validate_key(key)?;
        let bytes = self.codec.encode(value)?;
        self.request(|reply| Command::Put { key, bytes, reply })
            .await
    }

    /// Remove a key. Returns true if a document existed.
    pub async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let key = validate_key(key)?;
        self.request(|reply| Command::Delete { key, reply }).await
    }

    /// Existence check without decoding the value.
    pub async fn has(&self, key: &str) -> Result<bool, StoreError> {
        let key = validate_key(key)?;
        self.request(|reply| Command::Has { key, reply }).await
    }

    /// Values of keys starting with `prefix`, in engine order, at most `limit`
    /// (or the actor's configured ceiling).
    pub async fn list_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<T>, StoreError> {
        let prefix = prefix.to_string();
        let stored = self
            .request(|reply| Command::ListValues {
                prefix,
                limit,
                reply,
            })
            .await?;
        stored.iter().map(|s| self.codec.decode(&s.bytes)).collect()
    }

    /// One page of keys. Pass the returned cursor back to continue.
    pub async fn list_keys(&self, options: ListOptions) -> Result<ListPage, StoreError> {
        self.request(|reply| Command::ListKeys { options, reply })
            .await
    }

    /// Read several documents; absent keys are omitted from the result.
    pub async fn get_many<T: DeserializeOwned>(
        &self,
        keys: &[&str],
    ) -> Result<Vec<(String, VersionedDoc<T>)>, StoreError> {
        let keys = keys
            .iter()
            .map(|k| validate_key(k))
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self.request(|reply| Command::GetMany { keys, reply }).await?;
        stored
            .into_iter()
            .map(|(key, s)| {
                let data = self.codec.decode(&s.bytes)?;
                Ok((key, VersionedDoc::new(s.version, data)))
            })
            .collect()
    }

    /// Write several keys as one unit. Each key's version advances; the new
    /// versions are returned in input order.
    pub async fn put_many<V: Serialize>(
        &self,
        entries: &[(&str, V)],
    ) -> Result<Vec<(String, u64)>, StoreError> {
        let entries = entries
            .iter()
            .map(|(key, value)| Ok((validate_key(key)?, self.codec.encode(value)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.request(|reply| Command::PutMany { entries, reply }).await
    }

    /// Remove several keys as one unit. Returns how many existed.
    pub async fn delete_many(&self, keys: &[&str]) -> Result<usize, StoreError> {
        let keys = keys
            .iter()
            .map(|k| validate_key(k))
            .collect::<Result<Vec<_>, _>>()?;
        self.request(|reply| Command::DeleteMany { keys, reply }).await
    }

    /// Read-modify-write with optimistic retry.
    ///
    /// Reads the current document, applies `f` to it (`None` when the key is
    /// absent) and CAS-writes the result against the version that was read.
    /// If another writer got in first, the document is re-read and `f` runs
    /// again, up to `max_attempts` times in total.
    pub async fn update<T, F>(
        &self,
        key: &str,
        max_attempts: u32,
        mut f: F,
    ) -> Result<VersionedDoc<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(Option<T>) -> Result<T, StoreError>,
    {
        let mut last = None;
        for _ in 0..max_attempts.max(1) {
            let current = self.get_doc::<T>(key).await?;
            let expected = current.as_ref().map_or(NO_DOCUMENT, |doc| doc.version);
            let next = f(current.map(|doc| doc.data))?;
            let result = self.cas_put(key, expected, &next).await?;
            if result.ok {
                return Ok(VersionedDoc::new(result.version, next));
            }
            last = Some((expected, result.version));
        }
        let (expected, actual) = last.unwrap_or((NO_DOCUMENT, NO_DOCUMENT));
        Err(StoreError::Conflict {
            key: key.to_string(),
            expected,
            actual,
        })
    }

    /// Counters from the actor.
    pub async fn stats(&self) -> Result<ActorStats, StoreError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Command::Stats { reply })
            .await
            .map_err(|_| StoreError::ActorStopped)?;
        response.await.map_err(|_| StoreError::ActorStopped)
    }

    /// Stop the actor. Commands already queued are still processed; any
    /// command sent after this returns fails with `ActorStopped`.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| StoreError::ActorStopped)?;
        response.await.map_err(|_| StoreError::ActorStopped)
    }
}

fn validate_key(key: &str) -> Result<String, StoreError> {
    if key.is_empty() {
        return Err(StoreError::Validation("key must not be empty".into()));
    }
    Ok(key.to_string())
}
