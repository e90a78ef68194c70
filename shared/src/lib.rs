//! Wire protocol and entity model shared by the client core and its tests.
//!
//! Messages are newline-free JSON objects discriminated by a `type` field.
//! The server is authoritative for every field here; the only state the
//! client adds is interpolation bookkeeping, which never goes on the wire.

use serde::{Deserialize, Serialize};

/// Side length of a world chunk, in world units.
pub const CHUNK_SIZE: f32 = 128.0;

/// Time span over which a rendered entity eases from its previous to its
/// current known position. Comparable to, but shorter than, the server tick.
pub const INTERPOLATION_WINDOW_MS: u64 = 100;

/// Fraction of the remaining distance the camera covers per update tick.
pub const CAMERA_EASING: f32 = 0.1;

/// Base scale of the world-to-screen transform at zoom 1.0.
pub const PIXELS_PER_UNIT: f32 = 4.0;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 2.5;

/// A press held this long (without drifting) resolves as a long-press.
pub const LONG_PRESS_MS: u64 = 275;

/// A touch that drifts this far before resolving becomes a joystick drag.
pub const TOUCH_DRAG_THRESHOLD_PX: f32 = 12.0;

/// Drag distance at which the joystick vector saturates to unit length.
pub const JOYSTICK_MAX_RADIUS_PX: f32 = 64.0;

pub const ATTACK_COOLDOWN_MS: u64 = 500;
pub const INTERACT_COOLDOWN_MS: u64 = 400;

/// Cadence of outbound intent frames (20 Hz).
pub const INPUT_TICK_MS: u64 = 50;

/// Idle send threshold; strictly shorter than the server's idle timeout.
pub const KEEPALIVE_MS: u64 = 10_000;

/// Integer grid coordinates of a chunk, serialized as `[cx, cy]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord(pub i32, pub i32);

impl ChunkCoord {
    /// Chunk containing the given world position (floor division, so
    /// negative coordinates land in negative chunks).
    pub fn containing(x: f32, y: f32) -> Self {
        ChunkCoord(
            (x / CHUNK_SIZE).floor() as i32,
            (y / CHUNK_SIZE).floor() as i32,
        )
    }
}

/// Entity category. Local vs. remote player is not a wire distinction;
/// the client compares ids against the session's player id where it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Resource,
    Mob,
    Structure,
    Npc,
}

/// One simulated object as the server describes it, plus client-only
/// interpolation bookkeeping (`prev_x`/`prev_y`/`updated_at`) that is
/// never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_health: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip)]
    pub prev_x: Option<f32>,
    #[serde(skip)]
    pub prev_y: Option<f32>,
    /// Milliseconds timestamp of the last server update applied locally.
    #[serde(skip)]
    pub updated_at: Option<u64>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            kind,
            subtype: None,
            x,
            y,
            health: None,
            max_health: None,
            level: None,
            name: None,
            prev_x: None,
            prev_y: None,
            updated_at: None,
        }
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Reference to an entity in a delta's remove list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub kind: EntityKind,
}

/// Per-kind entity payload of a `chunkAdd` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkEntities {
    #[serde(default)]
    pub resources: Vec<Entity>,
    #[serde(default)]
    pub mobs: Vec<Entity>,
    #[serde(default)]
    pub structures: Vec<Entity>,
    #[serde(default)]
    pub npcs: Vec<Entity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub progress: u32,
    pub goal: u32,
    pub completed: bool,
}

/// Server-to-client messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Welcome {
        id: String,
        token: String,
        version: u32,
        spawned: bool,
    },
    SessionRevoked {
        reason: String,
    },
    ChunkAdd {
        coord: ChunkCoord,
        biome: String,
        entities: ChunkEntities,
    },
    ChunkRemove {
        coord: ChunkCoord,
    },
    EntityDelta {
        chunk: ChunkCoord,
        updates: Vec<Entity>,
        removes: Vec<EntityRef>,
    },
    Achievement {
        id: String,
        name: String,
    },
    Notification {
        text: String,
    },
    NpcInteraction {
        npc_id: String,
        name: String,
        text: String,
        options: Vec<String>,
    },
    QuestUpdate {
        quest: Quest,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
}

/// Client-to-server intent messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Input {
        dx: f32,
        dy: f32,
        attack: bool,
        interact: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aim: Option<[f32; 2]>,
    },
    Spawn {
        settlement_id: u32,
    },
    Craft {
        recipe: String,
    },
    Slot {
        slot: u8,
    },
    SwapSlots {
        from: u8,
        to: u8,
    },
    Name {
        name: String,
    },
    NpcAction {
        npc_id: String,
        option: u32,
    },
    AcceptQuest {
        quest_id: String,
    },
}

impl ClientMessage {
    /// Zero-motion input frame; doubles as the keepalive payload.
    pub fn idle_input() -> Self {
        ClientMessage::Input {
            dx: 0.0,
            dy: 0.0,
            attack: false,
            interact: false,
            aim: None,
        }
    }
}

/// Session-claim contract boundary (HTTP-like, outside the socket
/// transport): the client trades a chosen handle for an id and a
/// bearer token, then reuses the token on every connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub handle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub id: String,
    pub token: String,
}
