//! Client driver: owns the synchronization components and runs the
//! single-task event loop over the socket and the periodic timers.

use crate::camera::Camera;
use crate::input::InputGestureManager;
use crate::interp;
use crate::session::{SessionConnection, TokenStore};
use crate::world::{Chunk, WorldState};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage, INPUT_TICK_MS, KEEPALIVE_MS};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::interval;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

pub struct Client {
    session: SessionConnection,
    world: WorldState,
    camera: Camera,
    input: InputGestureManager,
    display_name: Option<String>,
    name_sent: bool,
    screen_width: f32,
    screen_height: f32,
}

impl Client {
    pub fn new(
        url: impl Into<String>,
        token_store: Box<dyn TokenStore>,
        screen_width: f32,
        screen_height: f32,
    ) -> Self {
        Client {
            session: SessionConnection::new(url, token_store),
            world: WorldState::new(),
            camera: Camera::new(),
            input: InputGestureManager::new(),
            display_name: None,
            name_sent: false,
            screen_width,
            screen_height,
        }
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    pub fn session(&mut self) -> &mut SessionConnection {
        &mut self.session
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn camera(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Device events from the embedding platform land here.
    pub fn input(&mut self) -> &mut InputGestureManager {
        &mut self.input
    }

    /// Routes one inbound message to world mutation. `welcome` and
    /// `sessionRevoked` bookkeeping already happened inside the session;
    /// presentation messages reach their consumers via subscriptions.
    pub async fn handle_message(&mut self, message: ServerMessage, now_ms: u64) {
        match message {
            ServerMessage::Welcome { .. } => {
                if !self.name_sent {
                    if let Some(name) = self.display_name.clone() {
                        if self.session.send(&ClientMessage::Name { name }).await {
                            self.name_sent = true;
                        }
                    }
                }
            }
            ServerMessage::SessionRevoked { .. } => {
                self.on_disconnect();
            }
            ServerMessage::ChunkAdd {
                coord,
                biome,
                entities,
            } => {
                self.world.add_chunk(Chunk::from_add(coord, biome, entities));
            }
            ServerMessage::ChunkRemove { coord } => {
                self.world.remove_chunk(coord);
            }
            ServerMessage::EntityDelta {
                chunk,
                updates,
                removes,
            } => {
                self.world.apply_delta(chunk, updates, removes, now_ms);
            }
            ServerMessage::Error { code, message, .. } => {
                error!("server error {}: {}", code, message);
            }
            ServerMessage::Achievement { name, .. } => {
                info!("achievement unlocked: {}", name);
            }
            ServerMessage::Notification { text } => {
                info!("{}", text);
            }
            ServerMessage::NpcInteraction { .. } | ServerMessage::QuestUpdate { .. } => {
                debug!("presentation message delivered to subscribers");
            }
        }
    }

    /// Discards all world state so nothing stale renders after a
    /// reconnect with a different world snapshot.
    pub fn on_disconnect(&mut self) {
        self.world.clear();
        self.camera.reset();
        self.input.window_blur();
    }

    /// Eases the camera toward the local player's interpolated position.
    pub fn update_camera(&mut self, now_ms: u64) {
        let target = self
            .session
            .session()
            .player_id
            .as_deref()
            .and_then(|id| self.world.player(id))
            .map(|player| interp::position_at(player, now_ms));
        if let Some((x, y)) = target {
            self.camera.follow(x, y);
        }
        self.camera.update();
    }

    // Typed intent constructors so presentation code emits through one path.

    pub async fn craft(&mut self, recipe: &str) -> bool {
        self.session
            .send(&ClientMessage::Craft {
                recipe: recipe.to_string(),
            })
            .await
    }

    pub async fn select_slot(&mut self, slot: u8) -> bool {
        self.session.send(&ClientMessage::Slot { slot }).await
    }

    pub async fn swap_slots(&mut self, from: u8, to: u8) -> bool {
        self.session.send(&ClientMessage::SwapSlots { from, to }).await
    }

    pub async fn npc_action(&mut self, npc_id: &str, option: u32) -> bool {
        self.session
            .send(&ClientMessage::NpcAction {
                npc_id: npc_id.to_string(),
                option,
            })
            .await
    }

    pub async fn accept_quest(&mut self, quest_id: &str) -> bool {
        self.session
            .send(&ClientMessage::AcceptQuest {
                quest_id: quest_id.to_string(),
            })
            .await
    }

    /// Connects and drives the event loop until the connection closes.
    /// Returns cleanly on close; the caller decides whether to retry.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.session.connect().await?;

        let mut input_interval = interval(Duration::from_millis(INPUT_TICK_MS));
        let mut camera_interval = interval(Duration::from_millis(16));
        let mut keepalive_interval = interval(Duration::from_millis(KEEPALIVE_MS / 4));

        loop {
            tokio::select! {
                message = self.session.recv() => {
                    match message {
                        Some(message) => self.handle_message(message, now_ms()).await,
                        None => break,
                    }
                },

                _ = input_interval.tick() => {
                    let frame = self.input.tick(
                        now_ms(),
                        &self.camera,
                        self.screen_width,
                        self.screen_height,
                    );
                    if !self.session.send(&frame).await {
                        warn!("intent dropped, channel not open");
                    }
                },

                _ = camera_interval.tick() => {
                    self.update_camera(now_ms());
                },

                _ = keepalive_interval.tick() => {
                    self.session.maybe_keepalive().await;
                },
            }
        }

        self.on_disconnect();
        Ok(())
    }

    /// Caller-side reconnect policy: bounded attempts with exponential
    /// backoff, disabled entirely once the session is revoked.
    pub async fn run_with_reconnect(
        &mut self,
        max_attempts: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut attempt = 0;
        loop {
            match self.run().await {
                Ok(()) => {
                    if self.session.session().revoked {
                        info!("session revoked, not reconnecting");
                        return Ok(());
                    }
                    attempt = 0;
                }
                Err(e) => {
                    warn!("connect failed: {}", e);
                }
            }
            attempt += 1;
            if attempt > max_attempts {
                error!("giving up after {} reconnect attempts", max_attempts);
                return Ok(());
            }
            let backoff = Duration::from_millis(500 * (1 << attempt.min(6)));
            info!("reconnecting in {:?} (attempt {}/{})", backoff, attempt, max_attempts);
            tokio::time::sleep(backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;
    use shared::{ChunkCoord, ChunkEntities, Entity, EntityKind};

    fn client() -> Client {
        Client::new(
            "ws://localhost:9000/ws",
            Box::new(MemoryTokenStore::new()),
            800.0,
            600.0,
        )
    }

    fn chunk_add(coord: ChunkCoord) -> ServerMessage {
        ServerMessage::ChunkAdd {
            coord,
            biome: "plains".into(),
            entities: ChunkEntities {
                mobs: vec![Entity::new("mob-1", EntityKind::Mob, 10.0, 10.0)],
                ..ChunkEntities::default()
            },
        }
    }

    #[tokio::test]
    async fn test_chunk_messages_mutate_world() {
        let mut client = client();
        let coord = ChunkCoord(0, 0);
        client.handle_message(chunk_add(coord), 0).await;
        assert!(client.world().find_entity_by_id("mob-1").is_some());

        client
            .handle_message(ServerMessage::ChunkRemove { coord }, 10)
            .await;
        assert!(client.world().find_entity_by_id("mob-1").is_none());
    }

    #[tokio::test]
    async fn test_delta_message_reaches_world() {
        let mut client = client();
        let coord = ChunkCoord(0, 0);
        client.handle_message(chunk_add(coord), 0).await;
        client
            .handle_message(
                ServerMessage::EntityDelta {
                    chunk: coord,
                    updates: vec![Entity::new("mob-1", EntityKind::Mob, 50.0, 50.0)],
                    removes: vec![],
                },
                100,
            )
            .await;

        let entity = client.world().find_entity_by_id("mob-1").unwrap();
        assert_eq!(entity.x, 50.0);
        assert_eq!(entity.prev_x, Some(10.0));
    }

    #[tokio::test]
    async fn test_disconnect_cleanup_empties_world() {
        let mut client = client();
        let coord = ChunkCoord(0, 0);
        client.handle_message(chunk_add(coord), 0).await;
        client
            .handle_message(
                ServerMessage::EntityDelta {
                    chunk: coord,
                    updates: vec![Entity::new("p-1", EntityKind::Player, 1.0, 1.0)],
                    removes: vec![],
                },
                0,
            )
            .await;
        assert!(!client.world().entities_near(0.0, 0.0, f32::MAX).is_empty());

        client.on_disconnect();
        assert!(client.world().entities_near(0.0, 0.0, f32::MAX).is_empty());
    }

    #[tokio::test]
    async fn test_revocation_message_discards_world() {
        let mut client = client();
        client.handle_message(chunk_add(ChunkCoord(0, 0)), 0).await;
        client
            .handle_message(
                ServerMessage::SessionRevoked {
                    reason: "expired".into(),
                },
                0,
            )
            .await;
        assert!(client.world().entities_near(0.0, 0.0, f32::MAX).is_empty());
    }

    #[tokio::test]
    async fn test_camera_follows_local_player() {
        let mut client = client();
        client.session().apply_inbound(&ServerMessage::Welcome {
            id: "p-1".into(),
            token: "tok".into(),
            version: 1,
            spawned: true,
        });
        client
            .handle_message(
                ServerMessage::EntityDelta {
                    chunk: ChunkCoord(0, 0),
                    updates: vec![Entity::new("p-1", EntityKind::Player, 64.0, -32.0)],
                    removes: vec![],
                },
                0,
            )
            .await;

        client.update_camera(1_000);
        assert_eq!((client.camera().x, client.camera().y), (64.0, -32.0));
    }
}
