//! Time-based interpolation between an entity's last two known positions.

use shared::{Entity, INTERPOLATION_WINDOW_MS};

/// Rendered position of an entity at `now_ms`.
///
/// An entity with no recorded previous position renders at its current
/// position (cold start, no interpolation lag). Otherwise the position
/// eases linearly from previous to current over the interpolation window
/// starting at the entity's last update. Pure; safe to call every frame.
pub fn position_at(entity: &Entity, now_ms: u64) -> (f32, f32) {
    let (prev_x, prev_y, updated_at) = match (entity.prev_x, entity.prev_y, entity.updated_at) {
        (Some(px), Some(py), Some(at)) => (px, py, at),
        _ => return (entity.x, entity.y),
    };

    let elapsed = now_ms.saturating_sub(updated_at) as f32;
    let t = (elapsed / INTERPOLATION_WINDOW_MS as f32).clamp(0.0, 1.0);

    (
        prev_x + (entity.x - prev_x) * t,
        prev_y + (entity.y - prev_y) * t,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::EntityKind;

    fn moving_entity() -> Entity {
        let mut entity = Entity::new("mob-1", EntityKind::Mob, 100.0, 200.0);
        entity.prev_x = Some(0.0);
        entity.prev_y = Some(0.0);
        entity.updated_at = Some(1_000);
        entity
    }

    #[test]
    fn test_cold_start_returns_current_position() {
        let entity = Entity::new("mob-1", EntityKind::Mob, 42.0, 7.0);
        assert_eq!(position_at(&entity, 99_999), (42.0, 7.0));
    }

    #[test]
    fn test_before_update_returns_previous_position() {
        let entity = moving_entity();
        assert_eq!(position_at(&entity, 900), (0.0, 0.0));
        assert_eq!(position_at(&entity, 1_000), (0.0, 0.0));
    }

    #[test]
    fn test_after_window_returns_current_position() {
        let entity = moving_entity();
        assert_eq!(
            position_at(&entity, 1_000 + INTERPOLATION_WINDOW_MS),
            (100.0, 200.0)
        );
        assert_eq!(position_at(&entity, 5_000), (100.0, 200.0));
    }

    #[test]
    fn test_linear_and_monotonic_inside_window() {
        let entity = moving_entity();
        let (x, y) = position_at(&entity, 1_050);
        assert_approx_eq!(x, 50.0, 0.001);
        assert_approx_eq!(y, 100.0, 0.001);

        let mut last_x = -1.0;
        for ms in (1_000..=1_100).step_by(10) {
            let (x, _) = position_at(&entity, ms);
            assert!(x >= last_x);
            last_x = x;
        }
    }
}
