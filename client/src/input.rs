//! Gesture disambiguation: raw pointer/touch/keyboard events in, a fixed
//! cadence of intent frames out.
//!
//! Each active contact runs a small state machine
//! (pending → tap | long-press | joystick). Roles are explicit: at most one
//! contact owns joystick duty and at most one owns action duty, first
//! claimant wins until lift. A drag claims the joystick regardless of which
//! half of the screen it started on; there is a single long-press threshold.

use crate::camera::Camera;
use log::debug;
use shared::{
    ClientMessage, ATTACK_COOLDOWN_MS, INTERACT_COOLDOWN_MS, JOYSTICK_MAX_RADIUS_PX,
    LONG_PRESS_MS, TOUCH_DRAG_THRESHOLD_PX,
};
use std::collections::{HashMap, HashSet};

/// The mouse is modeled as one always-present pointer with a fixed id.
pub const MOUSE_POINTER: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContactState {
    /// Pressed, not yet classified.
    Pending,
    /// Claimed movement duty; drives the joystick vector until lift.
    Joystick,
    /// Long-press already fired, or the gesture was cancelled; release is inert.
    Consumed,
}

#[derive(Debug, Clone)]
struct Contact {
    kind: PointerKind,
    start_x: f32,
    start_y: f32,
    x: f32,
    y: f32,
    pressed_at: u64,
    state: ContactState,
}

impl Contact {
    fn drift(&self) -> f32 {
        let dx = self.x - self.start_x;
        let dy = self.y - self.start_y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Classifies device events into movement + one-shot actions and builds the
/// outbound intent frame each tick.
pub struct InputGestureManager {
    contacts: HashMap<u64, Contact>,
    joystick_owner: Option<u64>,
    action_owner: Option<u64>,
    joystick_dx: f32,
    joystick_dy: f32,
    keys: HashSet<Key>,
    attack_pending: bool,
    interact_pending: bool,
    /// Screen point of the gesture that armed the pending one-shot.
    aim_screen: Option<(f32, f32)>,
    last_attack_at: Option<u64>,
    last_interact_at: Option<u64>,
    open_modals: HashSet<String>,
}

impl InputGestureManager {
    pub fn new() -> Self {
        Self {
            contacts: HashMap::new(),
            joystick_owner: None,
            action_owner: None,
            joystick_dx: 0.0,
            joystick_dy: 0.0,
            keys: HashSet::new(),
            attack_pending: false,
            interact_pending: false,
            aim_screen: None,
            last_attack_at: None,
            last_interact_at: None,
            open_modals: HashSet::new(),
        }
    }

    /// Registers or unregisters an open modal dialog by name. While any
    /// modal is open, presses do not start gameplay gestures.
    pub fn set_modal_open(&mut self, name: &str, open: bool) {
        if open {
            self.open_modals.insert(name.to_string());
        } else {
            self.open_modals.remove(name);
        }
    }

    pub fn modal_active(&self) -> bool {
        !self.open_modals.is_empty()
    }

    pub fn pointer_down(&mut self, id: u64, kind: PointerKind, x: f32, y: f32, now_ms: u64) {
        if self.modal_active() {
            debug!("press ignored, modal open");
            return;
        }
        self.contacts.insert(
            id,
            Contact {
                kind,
                start_x: x,
                start_y: y,
                x,
                y,
                pressed_at: now_ms,
                state: ContactState::Pending,
            },
        );
        if self.action_owner.is_none() {
            self.action_owner = Some(id);
        }
    }

    pub fn pointer_move(&mut self, id: u64, x: f32, y: f32) {
        let Some(contact) = self.contacts.get_mut(&id) else {
            return;
        };
        contact.x = x;
        contact.y = y;

        match contact.state {
            ContactState::Pending if contact.drift() > TOUCH_DRAG_THRESHOLD_PX => {
                if contact.kind == PointerKind::Touch && self.joystick_owner.is_none() {
                    contact.state = ContactState::Joystick;
                    self.joystick_owner = Some(id);
                    // Movement duty supersedes any provisional action claim.
                    // Roles are only ever assigned at press time: a contact
                    // that was passed over for the action role stays inert
                    // until lifted, even if the role frees up mid-press.
                    if self.action_owner == Some(id) {
                        self.action_owner = None;
                    }
                } else {
                    contact.state = ContactState::Consumed;
                }
            }
            _ => {}
        }

        if self.joystick_owner == Some(id) {
            if let Some(contact) = self.contacts.get(&id) {
                let dx = contact.x - contact.start_x;
                let dy = contact.y - contact.start_y;
                let magnitude = (dx * dx + dy * dy).sqrt().max(JOYSTICK_MAX_RADIUS_PX);
                self.joystick_dx = dx / magnitude;
                self.joystick_dy = dy / magnitude;
            }
        }
    }

    /// Resolves long-press timers; call at least once per input tick.
    pub fn poll(&mut self, now_ms: u64) {
        let mut resolved: Option<(u64, f32, f32)> = None;
        for (&id, contact) in &self.contacts {
            if contact.state == ContactState::Pending
                && self.action_owner == Some(id)
                && now_ms.saturating_sub(contact.pressed_at) >= LONG_PRESS_MS
                && contact.drift() <= TOUCH_DRAG_THRESHOLD_PX
            {
                resolved = Some((id, contact.x, contact.y));
                break;
            }
        }
        if let Some((id, x, y)) = resolved {
            if let Some(contact) = self.contacts.get_mut(&id) {
                contact.state = ContactState::Consumed;
            }
            self.fire_interact(x, y, now_ms);
        }
    }

    pub fn pointer_up(&mut self, id: u64, now_ms: u64) {
        let Some(contact) = self.contacts.remove(&id) else {
            return;
        };

        if self.joystick_owner == Some(id) {
            self.joystick_owner = None;
            self.joystick_dx = 0.0;
            self.joystick_dy = 0.0;
        }

        if contact.state == ContactState::Pending
            && self.action_owner == Some(id)
            && contact.drift() <= TOUCH_DRAG_THRESHOLD_PX
        {
            // A release straddling the threshold without a poll in between
            // still resolves on the correct side of it.
            if now_ms.saturating_sub(contact.pressed_at) >= LONG_PRESS_MS {
                self.fire_interact(contact.x, contact.y, now_ms);
            } else {
                self.fire_attack(contact.x, contact.y, now_ms);
            }
        }

        if self.action_owner == Some(id) {
            self.action_owner = None;
        }
    }

    fn fire_attack(&mut self, x: f32, y: f32, now_ms: u64) {
        let ready = match self.last_attack_at {
            Some(at) => now_ms.saturating_sub(at) >= ATTACK_COOLDOWN_MS,
            None => true,
        };
        if !ready {
            debug!("attack suppressed by cooldown");
            return;
        }
        self.attack_pending = true;
        self.aim_screen = Some((x, y));
        self.last_attack_at = Some(now_ms);
    }

    fn fire_interact(&mut self, x: f32, y: f32, now_ms: u64) {
        let ready = match self.last_interact_at {
            Some(at) => now_ms.saturating_sub(at) >= INTERACT_COOLDOWN_MS,
            None => true,
        };
        if !ready {
            debug!("interact suppressed by cooldown");
            return;
        }
        self.interact_pending = true;
        self.aim_screen = Some((x, y));
        self.last_interact_at = Some(now_ms);
    }

    pub fn key_down(&mut self, key: Key) {
        self.keys.insert(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.keys.remove(&key);
    }

    /// Clears held keys and movement so a focus loss cannot leave the
    /// player drifting on a stuck key.
    pub fn window_blur(&mut self) {
        self.keys.clear();
        self.contacts.clear();
        self.joystick_owner = None;
        self.action_owner = None;
        self.joystick_dx = 0.0;
        self.joystick_dy = 0.0;
    }

    fn keyboard_vector(&self) -> (f32, f32) {
        let mut dx = 0.0f32;
        let mut dy = 0.0f32;
        if self.keys.contains(&Key::Left) {
            dx -= 1.0;
        }
        if self.keys.contains(&Key::Right) {
            dx += 1.0;
        }
        if self.keys.contains(&Key::Up) {
            dy -= 1.0;
        }
        if self.keys.contains(&Key::Down) {
            dy += 1.0;
        }
        let magnitude = (dx * dx + dy * dy).sqrt();
        if magnitude > 1.0 {
            (dx / magnitude, dy / magnitude)
        } else {
            (dx, dy)
        }
    }

    /// Current movement vector; an active joystick takes precedence over
    /// the keyboard.
    pub fn movement(&self) -> (f32, f32) {
        if self.joystick_owner.is_some() {
            (self.joystick_dx, self.joystick_dy)
        } else {
            self.keyboard_vector()
        }
    }

    /// Builds the outbound intent frame for one tick. Fires unconditionally
    /// (even at zero movement) so the stream doubles as a liveness signal;
    /// one-shot flags are cleared here so they send exactly once.
    pub fn tick(
        &mut self,
        now_ms: u64,
        camera: &Camera,
        screen_width: f32,
        screen_height: f32,
    ) -> ClientMessage {
        self.poll(now_ms);

        let (dx, dy) = self.movement();
        let attack = self.attack_pending;
        let interact = self.interact_pending;
        let aim = if attack || interact {
            self.aim_screen.map(|(sx, sy)| {
                let (wx, wy) = camera.screen_to_world(sx, sy, screen_width, screen_height);
                [wx, wy]
            })
        } else {
            None
        };

        self.attack_pending = false;
        self.interact_pending = false;
        self.aim_screen = None;

        ClientMessage::Input {
            dx,
            dy,
            attack,
            interact,
            aim,
        }
    }
}

impl Default for InputGestureManager {
    fn default() -> Self {
        Self::new()
    }
}
