//! Smoothed viewpoint and the world-unit / screen-pixel mapping.

use shared::{CAMERA_EASING, MAX_ZOOM, MIN_ZOOM, PIXELS_PER_UNIT};

/// Eased follow camera. The first `follow` after construction or `reset`
/// snaps straight to the target so spawning does not slide in from afar.
#[derive(Debug, Clone)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    zoom: f32,
    target_x: f32,
    target_y: f32,
    snapped: bool,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            target_x: 0.0,
            target_y: 0.0,
            snapped: false,
        }
    }

    /// Sets the desired look-at point.
    pub fn follow(&mut self, target_x: f32, target_y: f32) {
        self.target_x = target_x;
        self.target_y = target_y;
        if !self.snapped {
            self.x = target_x;
            self.y = target_y;
            self.snapped = true;
        }
    }

    /// Eases toward the target by a fixed fraction of the remaining
    /// distance. Cannot overshoot; always converges.
    pub fn update(&mut self) {
        self.x += (self.target_x - self.x) * CAMERA_EASING;
        self.y += (self.target_y - self.y) * CAMERA_EASING;
    }

    pub fn adjust_zoom(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Forgets the snap so the next `follow` applies instantly (respawn).
    pub fn reset(&mut self) {
        self.snapped = false;
    }

    fn scale(&self) -> f32 {
        PIXELS_PER_UNIT * self.zoom
    }

    /// World position to screen pixels, centered on the canvas midpoint.
    pub fn world_to_screen(&self, wx: f32, wy: f32, width: f32, height: f32) -> (f32, f32) {
        (
            (wx - self.x) * self.scale() + width / 2.0,
            (wy - self.y) * self.scale() + height / 2.0,
        )
    }

    /// Exact inverse of `world_to_screen`.
    pub fn screen_to_world(&self, sx: f32, sy: f32, width: f32, height: f32) -> (f32, f32) {
        (
            (sx - width / 2.0) / self.scale() + self.x,
            (sy - height / 2.0) / self.scale() + self.y,
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_first_follow_snaps() {
        let mut camera = Camera::new();
        camera.follow(500.0, -300.0);
        assert_eq!((camera.x, camera.y), (500.0, -300.0));
    }

    #[test]
    fn test_later_follow_eases() {
        let mut camera = Camera::new();
        camera.follow(0.0, 0.0);
        camera.follow(100.0, 0.0);
        assert_eq!(camera.x, 0.0);
        camera.update();
        assert_approx_eq!(camera.x, 10.0, 0.001);
    }

    #[test]
    fn test_reset_makes_next_follow_snap_again() {
        let mut camera = Camera::new();
        camera.follow(0.0, 0.0);
        camera.reset();
        camera.follow(900.0, 900.0);
        assert_eq!((camera.x, camera.y), (900.0, 900.0));
    }

    #[test]
    fn test_update_converges_without_overshoot() {
        let mut camera = Camera::new();
        camera.follow(0.0, 0.0);
        camera.follow(200.0, -50.0);

        let mut last_distance = f32::MAX;
        for _ in 0..200 {
            camera.update();
            assert!(camera.x <= 200.0, "overshot target");
            assert!(camera.y >= -50.0, "overshot target");
            let distance = ((200.0 - camera.x).powi(2) + (-50.0 - camera.y).powi(2)).sqrt();
            assert!(distance <= last_distance);
            last_distance = distance;
        }
        assert!(last_distance < 0.01);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut camera = Camera::new();
        camera.adjust_zoom(100.0);
        assert_eq!(camera.zoom(), MAX_ZOOM);
        camera.adjust_zoom(-100.0);
        assert_eq!(camera.zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_transform_round_trip_across_zoom_range() {
        let mut camera = Camera::new();
        camera.follow(37.5, -12.25);

        for zoom_step in 0..=4 {
            camera.adjust_zoom(-10.0); // floor at MIN_ZOOM
            camera.adjust_zoom(zoom_step as f32 * 0.5);
            for &(sx, sy) in &[(0.0, 0.0), (400.0, 300.0), (799.0, 599.0), (13.0, 580.0)] {
                let (wx, wy) = camera.screen_to_world(sx, sy, 800.0, 600.0);
                let (rx, ry) = camera.world_to_screen(wx, wy, 800.0, 600.0);
                assert_approx_eq!(rx, sx, 0.001);
                assert_approx_eq!(ry, sy, 0.001);
            }
        }
    }
}
