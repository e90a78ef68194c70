//! Chunk-partitioned world state reconciled from server delta messages.
//!
//! The server is authoritative: this store never invents entities, it only
//! mirrors chunk-add/remove and entity-delta messages. Player entities live
//! in a single global map rather than per chunk, so the locally controlled
//! player stays queryable while its chunk membership is in flux.

use log::debug;
use shared::{ChunkCoord, ChunkEntities, Entity, EntityKind, EntityRef};
use std::collections::HashMap;

/// A fixed-size square region of the world, owning one id-keyed collection
/// per non-player entity kind.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub biome: String,
    pub resources: HashMap<String, Entity>,
    pub mobs: HashMap<String, Entity>,
    pub structures: HashMap<String, Entity>,
    pub npcs: HashMap<String, Entity>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, biome: impl Into<String>) -> Self {
        Self {
            coord,
            biome: biome.into(),
            resources: HashMap::new(),
            mobs: HashMap::new(),
            structures: HashMap::new(),
            npcs: HashMap::new(),
        }
    }

    /// Builds a chunk from the payload of a `chunkAdd` message.
    pub fn from_add(coord: ChunkCoord, biome: String, entities: ChunkEntities) -> Self {
        let mut chunk = Chunk::new(coord, biome);
        for entity in entities.resources {
            chunk.resources.insert(entity.id.clone(), entity);
        }
        for entity in entities.mobs {
            chunk.mobs.insert(entity.id.clone(), entity);
        }
        for entity in entities.structures {
            chunk.structures.insert(entity.id.clone(), entity);
        }
        for entity in entities.npcs {
            chunk.npcs.insert(entity.id.clone(), entity);
        }
        chunk
    }

    fn collection(&self, kind: EntityKind) -> Option<&HashMap<String, Entity>> {
        match kind {
            EntityKind::Resource => Some(&self.resources),
            EntityKind::Mob => Some(&self.mobs),
            EntityKind::Structure => Some(&self.structures),
            EntityKind::Npc => Some(&self.npcs),
            EntityKind::Player => None,
        }
    }

    fn collection_mut(&mut self, kind: EntityKind) -> Option<&mut HashMap<String, Entity>> {
        match kind {
            EntityKind::Resource => Some(&mut self.resources),
            EntityKind::Mob => Some(&mut self.mobs),
            EntityKind::Structure => Some(&mut self.structures),
            EntityKind::Npc => Some(&mut self.npcs),
            EntityKind::Player => None,
        }
    }

    fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.resources
            .values()
            .chain(self.mobs.values())
            .chain(self.structures.values())
            .chain(self.npcs.values())
    }
}

/// The client's continuously-stale mirror of the server world.
#[derive(Debug, Default)]
pub struct WorldState {
    chunks: HashMap<ChunkCoord, Chunk>,
    players: HashMap<String, Entity>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.coord, chunk);
    }

    /// Removing a chunk discards every entity it owned. Entities that
    /// crossed out of it arrive again via deltas targeting their new chunk.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) {
        self.chunks.remove(&coord);
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn player(&self, id: &str) -> Option<&Entity> {
        self.players.get(id)
    }

    /// Applies one `entityDelta`. Player-kind entries always target the
    /// global player map; other kinds require the named chunk to exist and
    /// are otherwise dropped (the chunk-add is expected to arrive first,
    /// and chunk-boundary races make late deltas legitimate).
    pub fn apply_delta(
        &mut self,
        coord: ChunkCoord,
        updates: Vec<Entity>,
        removes: Vec<EntityRef>,
        now_ms: u64,
    ) {
        let chunk_known = self.chunks.contains_key(&coord);
        if !chunk_known {
            debug!("delta for unknown chunk {:?}, non-player entries dropped", coord);
        }

        for mut entity in updates {
            if entity.kind == EntityKind::Player {
                let previous = self.players.get(&entity.id).map(|old| (old.x, old.y));
                stamp_previous(&mut entity, previous, now_ms);
                self.players.insert(entity.id.clone(), entity);
                continue;
            }
            if !chunk_known {
                continue;
            }
            // An id lives in at most one chunk per kind; drop stale copies
            // left behind by a chunk-boundary crossing before inserting. The
            // evicted copy still carries the pre-crossing position, which is
            // the interpolation start when the target chunk has no copy.
            let evicted = self.evict_elsewhere(&entity.id, entity.kind, coord);
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                if let Some(collection) = chunk.collection_mut(entity.kind) {
                    let previous = collection
                        .get(&entity.id)
                        .map(|old| (old.x, old.y))
                        .or_else(|| evicted.map(|old| (old.x, old.y)));
                    stamp_previous(&mut entity, previous, now_ms);
                    collection.insert(entity.id.clone(), entity);
                }
            }
        }

        for remove in removes {
            if remove.kind == EntityKind::Player {
                self.players.remove(&remove.id);
                continue;
            }
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                if let Some(collection) = chunk.collection_mut(remove.kind) {
                    collection.remove(&remove.id);
                }
            }
        }
    }

    fn evict_elsewhere(&mut self, id: &str, kind: EntityKind, except: ChunkCoord) -> Option<Entity> {
        let mut evicted = None;
        for chunk in self.chunks.values_mut() {
            if chunk.coord == except {
                continue;
            }
            if let Some(collection) = chunk.collection_mut(kind) {
                if let Some(old) = collection.remove(id) {
                    evicted = Some(old);
                }
            }
        }
        evicted
    }

    /// Linear search; fine at tens of entities per chunk. An id→location
    /// index would be the right optimization if counts grow, not a
    /// contract change.
    pub fn find_entity_by_id(&self, id: &str) -> Option<&Entity> {
        if let Some(player) = self.players.get(id) {
            return Some(player);
        }
        self.chunks
            .values()
            .flat_map(|chunk| chunk.entities())
            .find(|entity| entity.id == id)
    }

    /// All entities within `radius` of the point, closest first. Distance
    /// ties keep iteration order; targeting only needs the closest match.
    pub fn entities_near(&self, x: f32, y: f32, radius: f32) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .players
            .values()
            .chain(self.chunks.values().flat_map(|chunk| chunk.entities()))
            .filter(|entity| entity.distance_to(x, y) <= radius)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.distance_to(x, y)
                .partial_cmp(&b.distance_to(x, y))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        found
    }

    /// Drops everything; called on disconnect and session revocation so
    /// stale entities never render after a reconnect.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.players.clear();
    }
}

fn stamp_previous(entity: &mut Entity, previous: Option<(f32, f32)>, now_ms: u64) {
    if let Some((x, y)) = previous {
        entity.prev_x = Some(x);
        entity.prev_y = Some(y);
    }
    entity.updated_at = Some(now_ms);
}
