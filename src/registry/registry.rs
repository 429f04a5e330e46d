use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use super::ActorId;
use crate::actor::{StoreActor, StoreConfig, StoreHandle};
use crate::engine::{InMemoryEngine, StorageEngine};
use crate::error::StoreError;

struct Slot {
    name: String,
    handle: StoreHandle,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    index: HashMap<ActorId, usize>,
}

type EngineFactory<E> = Box<dyn Fn(&str) -> E + Send + Sync>;

/// Maps namespace names to running store actors.
///
/// Handles live in an arena indexed by [`ActorId`]. Each name gets one
/// actor, created lazily with the registry's engine factory on first use.
pub struct StoreRegistry<E> {
    factory: EngineFactory<E>,
    config: StoreConfig,
    arena: Mutex<Arena>,
}

impl StoreRegistry<InMemoryEngine> {
    /// Registry whose actors each get a fresh in-memory engine.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(|_| InMemoryEngine::new(), config)
    }
}

impl<E: StorageEngine> StoreRegistry<E> {
    pub fn new(factory: impl Fn(&str) -> E + Send + Sync + 'static, config: StoreConfig) -> Self {
        Self {
            factory: Box::new(factory),
            config,
            arena: Mutex::new(Arena::default()),
        }
    }

    pub fn id_from_name(&self, name: &str) -> ActorId {
        ActorId::from_name(name)
    }

    /// Return the actor for `name`, spawning it if this is the first request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_named(&self, name: &str) -> Result<StoreHandle, StoreError> {
        let id = ActorId::from_name(name);
        let mut arena = self.arena.lock();

        if let Some(&index) = arena.index.get(&id) {
            let slot = &arena.slots[index];
            if slot.name != name {
                return Err(StoreError::Validation(format!(
                    "namespace {:?} collides with {:?} on actor id {}",
                    name, slot.name, id
                )));
            }
            return Ok(slot.handle.clone());
        }

        let engine = (self.factory)(name);
        let handle = StoreActor::spawn(id, engine, self.config);
        debug!(actor = %id, namespace = name, "registered store actor");

        let index = arena.slots.len();
        arena.slots.push(Slot {
            name: name.to_string(),
            handle: handle.clone(),
        });
        arena.index.insert(id, index);
        Ok(handle)
    }

    /// Resolve an id to its handle. An unknown id is a configuration error.
    pub fn get(&self, id: ActorId) -> Result<StoreHandle, StoreError> {
        let arena = self.arena.lock();
        arena
            .index
            .get(&id)
            .map(|&index| arena.slots[index].handle.clone())
            .ok_or(StoreError::UnknownActor(id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<StoreHandle, StoreError> {
        self.get(ActorId::from_name(name))
    }

    /// Names of all registered namespaces, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.arena
            .lock()
            .slots
            .iter()
            .map(|slot| slot.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut every actor down and forget them.
    pub async fn shutdown_all(&self) {
        let slots = std::mem::take(&mut *self.arena.lock());
        for slot in slots.slots {
            // An actor that already stopped has nothing left to drain.
            let _ = slot.handle.shutdown().await;
        }
    }
}
