//! # Client synchronization core
//!
//! Keeps a local, continuously-stale view of a server-authoritative world
//! consistent and visually smooth despite network jitter, delta-only
//! updates, and ambiguous touch/mouse input.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Owns the persistent websocket, the bearer-token identity, the keepalive
//! policy, and multi-subscriber dispatch of inbound messages. Reconnect
//! policy is deliberately the caller's job, driven by close notifications.
//!
//! ### World Module (`world`)
//! Chunk-partitioned entity store reconciled from additive chunk and delta
//! messages. Player entities live in a global map so the local player stays
//! visible across chunk churn.
//!
//! ### Interpolation Module (`interp`)
//! Pure accessor that eases a rendered position between an entity's last
//! two known positions over a fixed window.
//!
//! ### Camera Module (`camera`)
//! Smoothed viewpoint with exact-inverse world/screen transforms; eased
//! follow that snaps on the first target after spawn.
//!
//! ### Input Module (`input`)
//! Per-contact gesture state machine turning raw pointer/touch/keyboard
//! events into a fixed-rate stream of intent messages, with cooldowns and
//! modal gating.
//!
//! ### Network Module (`network`)
//! The driver that constructs the components once per client session,
//! runs the event loop, and applies the bounded-backoff reconnect policy.
//!
//! Rendering (sprites, bars, menus, dialogs) is out of scope: it reads
//! entity state through `world`/`interp`/`camera` and emits intents
//! through the typed constructors on `network::Client`.

pub mod camera;
pub mod input;
pub mod interp;
pub mod network;
pub mod session;
pub mod world;
