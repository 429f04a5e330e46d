//! InMemoryEngine - IndexMap-backed engine for testing and development.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use super::{
    decode_cursor, encode_cursor, EngineError, ListOptions, ListPage, StorageEngine, StoredDoc,
};

/// Internal stored representation: the document plus its insertion sequence.
#[derive(Clone)]
struct Slot {
    seq: u64,
    doc: StoredDoc,
}

/// What a key held before a write inside a transaction touched it:
/// its position and slot, or nothing if it was absent.
struct Undo {
    key: String,
    previous: Option<(usize, Slot)>,
}

#[derive(Default)]
struct Entries {
    map: IndexMap<String, Slot>,
    next_seq: u64,
    /// Active while a checkpoint is open; writes push the state they replace.
    journal: Option<Vec<Undo>>,
}

impl Entries {
    fn record(&mut self, key: &str) {
        if let Some(journal) = self.journal.as_mut() {
            let previous = self
                .map
                .get_full(key)
                .map(|(index, _, slot)| (index, slot.clone()));
            journal.push(Undo {
                key: key.to_string(),
                previous,
            });
        }
    }
}

/// Position in the undo journal to roll back to.
///
/// Costs nothing up front; a rollback only touches the keys written since.
pub struct InMemoryCheckpoint {
    mark: usize,
    next_seq: u64,
    outermost: bool,
}

/// In-memory engine backed by an `IndexMap`.
///
/// Keys list in insertion order. Overwriting a key keeps its position;
/// deleting and re-creating it moves it to the end. Clone-friendly via Arc,
/// so a test can keep a clone and inspect what the actor wrote.
#[derive(Clone, Default)]
pub struct InMemoryEngine {
    storage: Arc<RwLock<Entries>>,
}

impl InMemoryEngine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize, EngineError> {
        Ok(self.read()?.map.len())
    }

    pub fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries>, EngineError> {
        self.storage
            .read()
            .map_err(|_| EngineError::Poisoned("in-memory storage".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>, EngineError> {
        self.storage
            .write()
            .map_err(|_| EngineError::Poisoned("in-memory storage".into()))
    }
}

impl StorageEngine for InMemoryEngine {
    type Checkpoint = InMemoryCheckpoint;

    fn get(&self, key: &str) -> Result<Option<StoredDoc>, EngineError> {
        Ok(self.read()?.map.get(key).map(|slot| slot.doc.clone()))
    }

    fn put(&mut self, key: &str, doc: StoredDoc) -> Result<(), EngineError> {
        let mut entries = self.write()?;
        entries.record(key);
        if let Some(slot) = entries.map.get_mut(key) {
            slot.doc = doc;
            return Ok(());
        }
        entries.next_seq += 1;
        let seq = entries.next_seq;
        entries.map.insert(key.to_string(), Slot { seq, doc });
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, EngineError> {
        let mut entries = self.write()?;
        if !entries.map.contains_key(key) {
            return Ok(false);
        }
        entries.record(key);
        // shift_remove keeps the remaining keys in insertion order.
        Ok(entries.map.shift_remove(key).is_some())
    }

    fn contains(&self, key: &str) -> Result<bool, EngineError> {
        Ok(self.read()?.map.contains_key(key))
    }

    fn list(&self, options: &ListOptions) -> Result<ListPage, EngineError> {
        let after = options.cursor.as_deref().map(decode_cursor).transpose()?;
        let limit = options.limit.unwrap_or(usize::MAX);
        let entries = self.read()?;

        let start = match after {
            Some(seq) => entries
                .map
                .values()
                .position(|slot| slot.seq > seq)
                .unwrap_or(entries.map.len()),
            None => 0,
        };

        let mut keys = Vec::new();
        let mut last_seq = None;
        let mut more = false;
        for (key, slot) in entries.map.iter().skip(start) {
            if let Some(prefix) = &options.prefix {
                if !key.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            if keys.len() == limit {
                more = true;
                break;
            }
            keys.push(key.clone());
            last_seq = Some(slot.seq);
        }

        let cursor = more.then(|| encode_cursor(last_seq.or(after).unwrap_or(0)));
        Ok(ListPage {
            keys,
            is_complete: !more,
            cursor,
        })
    }

    fn checkpoint(&self) -> Result<InMemoryCheckpoint, EngineError> {
        let mut entries = self.write()?;
        let open = entries.journal.as_ref().map(Vec::len);
        if open.is_none() {
            entries.journal = Some(Vec::new());
        }
        Ok(InMemoryCheckpoint {
            mark: open.unwrap_or(0),
            next_seq: entries.next_seq,
            outermost: open.is_none(),
        })
    }

    fn commit(&mut self, checkpoint: InMemoryCheckpoint) -> Result<(), EngineError> {
        // An enclosing checkpoint still needs these entries to roll back.
        if checkpoint.outermost {
            self.write()?.journal = None;
        }
        Ok(())
    }

    fn rollback(&mut self, checkpoint: InMemoryCheckpoint) -> Result<(), EngineError> {
        let mut entries = self.write()?;
        let undo = match entries.journal.as_mut() {
            Some(journal) => journal.split_off(checkpoint.mark.min(journal.len())),
            None => Vec::new(),
        };

        // Newest first, so each entry sees the map exactly as its write left it.
        for Undo { key, previous } in undo.into_iter().rev() {
            match previous {
                Some((index, slot)) if !entries.map.contains_key(&key) => {
                    entries.map.shift_insert(index, key, slot);
                }
                Some((_, slot)) => {
                    entries.map.insert(key, slot);
                }
                None => {
                    entries.map.shift_remove(&key);
                }
            }
        }

        entries.next_seq = checkpoint.next_seq;
        if checkpoint.outermost {
            entries.journal = None;
        }
        Ok(())
    }
}
