use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{ActorStats, Command, StoreConfig, StoreHandle};
use crate::doc::{CasResult, NO_DOCUMENT};
use crate::engine::{ListOptions, ListPage, StorageEngine, StoredDoc};
use crate::error::StoreError;
use crate::registry::ActorId;

/// The single writer for one key namespace.
///
/// Owns its engine outright; the only way in is the mailbox.
pub struct StoreActor<E> {
    id: ActorId,
    engine: E,
    config: StoreConfig,
    mailbox: mpsc::Receiver<Command>,
    stats: ActorStats,
}

impl<E: StorageEngine> StoreActor<E> {
    /// Spawn an actor on the current tokio runtime and return a handle to it.
    ///
    /// Must be called from within a runtime. The actor stops when every
    /// handle is dropped or when [`StoreHandle::shutdown`] is called.
    pub fn spawn(id: ActorId, engine: E, config: StoreConfig) -> StoreHandle {
        let (sender, mailbox) = mpsc::channel(config.mailbox_capacity.max(1));
        let actor = StoreActor {
            id,
            engine,
            config,
            mailbox,
            stats: ActorStats::default(),
        };
        tokio::spawn(actor.run());
        StoreHandle::new(id, sender, config.codec)
    }

    async fn run(mut self) {
        debug!(actor = %self.id, "store actor started");
        while let Some(command) = self.mailbox.recv().await {
            trace!(actor = %self.id, command = command.name(), "handling command");
            self.stats.commands += 1;
            self.handle(command);
        }
        debug!(
            actor = %self.id,
            commands = self.stats.commands,
            "store actor stopped"
        );
    }

    // A dropped reply receiver means the caller gave up (cancel or timeout);
    // the command has still been applied, only the answer is discarded.
    fn handle(&mut self, command: Command) {
        match command {
            Command::Get { key, reply } => {
                let _ = reply.send(self.engine.get(&key).map_err(StoreError::from));
            }
            Command::GetMany { keys, reply } => {
                let _ = reply.send(self.engine.get_many(&keys).map_err(StoreError::from));
            }
            Command::Has { key, reply } => {
                let _ = reply.send(self.engine.contains(&key).map_err(StoreError::from));
            }
            Command::CasPut {
                key,
                expected,
                bytes,
                reply,
            } => {
                let _ = reply.send(self.cas_put(&key, expected, bytes));
            }
            Command::Put { key, bytes, reply } => {
                let _ = reply.send(self.put(&key, bytes));
            }
            Command::PutMany { entries, reply } => {
                let _ = reply.send(self.put_many(entries));
            }
            Command::Delete { key, reply } => {
                let _ = reply.send(self.delete(&key));
            }
            Command::DeleteMany { keys, reply } => {
                let _ = reply.send(self.delete_many(&keys));
            }
            Command::ListValues {
                prefix,
                limit,
                reply,
            } => {
                let _ = reply.send(self.list_values(prefix, limit));
            }
            Command::ListKeys { mut options, reply } => {
                options.limit = Some(self.config.clamp_limit(options.limit));
                let _ = reply.send(self.engine.list(&options).map_err(StoreError::from));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats);
            }
            Command::Shutdown { reply } => {
                // Refuse new commands; those already queued still run.
                self.mailbox.close();
                let _ = reply.send(());
            }
        }
    }

    fn current_version(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self
            .engine
            .get(key)?
            .map_or(NO_DOCUMENT, |stored| stored.version))
    }

    fn cas_put(
        &mut self,
        key: &str,
        expected: u64,
        bytes: Vec<u8>,
    ) -> Result<CasResult, StoreError> {
        let current = self.current_version(key)?;
        if current != expected {
            self.stats.cas_rejected += 1;
            debug!(
                actor = %self.id,
                key,
                expected,
                current,
                "rejected stale compare-and-swap"
            );
            return Ok(CasResult::stale(current));
        }

        let version = current + 1;
        self.engine.put(key, StoredDoc { version, bytes })?;
        self.stats.cas_applied += 1;
        Ok(CasResult::applied(version))
    }

    /// Last writer wins, but the version still advances so that CAS callers
    /// holding the previous version are rejected.
    fn put(&mut self, key: &str, bytes: Vec<u8>) -> Result<u64, StoreError> {
        let version = self.current_version(key)? + 1;
        self.engine.put(key, StoredDoc { version, bytes })?;
        self.stats.puts += 1;
        Ok(version)
    }

    fn put_many(
        &mut self,
        entries: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<(String, u64)>, StoreError> {
        let written = self.engine.transaction(|engine| {
            let mut written = Vec::with_capacity(entries.len());
            for (key, bytes) in entries {
                let version = engine.get(&key)?.map_or(NO_DOCUMENT, |s| s.version) + 1;
                engine.put(&key, StoredDoc { version, bytes })?;
                written.push((key, version));
            }
            Ok(written)
        })?;
        self.stats.puts += written.len();
        Ok(written)
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let existed = self.engine.delete(key)?;
        if existed {
            self.stats.deletes += 1;
        }
        Ok(existed)
    }

    fn delete_many(&mut self, keys: &[String]) -> Result<usize, StoreError> {
        let removed = self.engine.transaction(|engine| engine.delete_many(keys))?;
        self.stats.deletes += removed;
        Ok(removed)
    }

    fn list_values(
        &self,
        prefix: String,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDoc>, StoreError> {
        let limit = self.config.clamp_limit(limit);
        let options = ListOptions::prefix(prefix).with_limit(limit);
        let ListPage { keys, .. } = self.engine.list(&options)?;
        let found = self.engine.get_many(&keys)?;
        Ok(found.into_iter().map(|(_, stored)| stored).collect())
    }
}
