use crate::settings;

use glam::{Mat4, Vec3};
use std::f32::consts::PI;

// Keeps the camera from flipping over the poles.
const POLAR_EPSILON: f32 = 0.000_001;
// Scale applied to the orbit radius per scroll step.
const ZOOM_STEP: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct Camera {
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    position: Vec3,
    target: Vec3,
}

impl Camera {
    pub fn new(settings: &settings::Camera, width: u32, height: u32) -> Self {
        Self {
            fov_y: settings.fov_y_degrees.to_radians(),
            aspect: aspect_ratio(width, height),
            near: settings.near,
            far: settings.far,
            position: Vec3::from(settings.position),
            target: Vec3::ZERO,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn view_projection(&self) -> Mat4 {
        let projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        let view = Mat4::look_at_rh(self.position, self.target, Vec3::Y);
        projection * view
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Orbits the camera around its target in response to pointer drags.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    settings: settings::Controls,

    radius: f32,
    // Azimuth around the Y axis, measured from +Z.
    theta: f32,
    // Polar angle, measured from +Y.
    phi: f32,

    delta_theta: f32,
    delta_phi: f32,
    scale: f32,

    pointer: Option<(f32, f32)>,
}

impl OrbitControls {
    pub fn new(settings: &settings::Controls, camera: &Camera) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.length();
        let (theta, phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        Self {
            settings: settings.clone(),
            radius,
            theta,
            phi,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pointer: None,
        }
    }

    pub fn update_settings(&mut self, settings: &settings::Controls) {
        self.settings = settings.clone();
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.pointer = Some((x, y));
    }

    /// Rotate by the distance the pointer moved since the last event.
    /// `viewport_height` is in the same units as the pointer position.
    pub fn pointer_move(&mut self, x: f32, y: f32, viewport_height: f32) {
        let Some((last_x, last_y)) = self.pointer else {
            return;
        };
        self.pointer = Some((x, y));

        let height = viewport_height.max(1.0);
        self.rotate_left(2.0 * PI * (x - last_x) / height * self.settings.rotate_speed);
        self.rotate_up(2.0 * PI * (y - last_y) / height * self.settings.rotate_speed);
    }

    pub fn pointer_up(&mut self) {
        self.pointer = None;
    }

    /// Positive steps zoom in. Ignored unless zooming is enabled.
    pub fn zoom(&mut self, steps: f32) {
        if !self.settings.enable_zoom {
            return;
        }

        self.scale *= ZOOM_STEP.powf(steps * self.settings.zoom_speed);
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Apply pending rotation to the camera. Call once per frame.
    pub fn update(&mut self, camera: &mut Camera) {
        let factor = if self.settings.enable_damping {
            self.settings.damping_factor
        } else {
            1.0
        };

        self.theta += self.delta_theta * factor;
        self.phi = (self.phi + self.delta_phi * factor).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        self.radius = (self.radius * self.scale).max(camera.near);

        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        camera.position = camera.target
            + self.radius * Vec3::new(sin_phi * sin_theta, cos_phi, sin_phi * cos_theta);

        self.delta_theta *= 1.0 - factor;
        self.delta_phi *= 1.0 - factor;
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn setup(controls: settings::Controls) -> (Camera, OrbitControls) {
        let camera = Camera::new(&settings::Camera::default(), 1280, 800);
        let orbit = OrbitControls::new(&controls, &camera);
        (camera, orbit)
    }

    #[test]
    fn test_initial_position_is_kept() {
        let (mut camera, mut orbit) = setup(settings::Controls::default());

        orbit.update(&mut camera);

        assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn test_damped_rotation_converges() {
        let (mut camera, mut orbit) = setup(settings::Controls::default());

        orbit.rotate_left(-PI / 2.0);
        orbit.update(&mut camera);
        // Only a fraction of the rotation is applied per frame.
        assert!(camera.position().x < 0.1);

        for _ in 0..500 {
            orbit.update(&mut camera);
        }

        assert_relative_eq!(camera.position().x, 1.0, epsilon = 1e-4);
        assert_relative_eq!(camera.position().length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_undamped_rotation_is_immediate() {
        let (mut camera, mut orbit) = setup(settings::Controls {
            enable_damping: false,
            ..Default::default()
        });

        orbit.rotate_left(-PI / 2.0);
        orbit.update(&mut camera);

        assert!(camera.position().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_drag_rotates_camera() {
        let (mut camera, mut orbit) = setup(settings::Controls {
            enable_damping: false,
            ..Default::default()
        });

        // Moving without a pressed pointer does nothing.
        orbit.pointer_move(100.0, 0.0, 800.0);
        orbit.update(&mut camera);
        assert!(camera.position().abs_diff_eq(Vec3::Z, 1e-6));

        orbit.pointer_down(0.0, 0.0);
        orbit.pointer_move(200.0, 0.0, 800.0);
        orbit.pointer_up();
        orbit.update(&mut camera);

        // A quarter of the viewport height turns by a quarter turn.
        assert!(camera.position().abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_polar_angle_is_clamped() {
        let (mut camera, mut orbit) = setup(settings::Controls {
            enable_damping: false,
            ..Default::default()
        });

        orbit.rotate_up(10.0);
        orbit.update(&mut camera);

        assert!(camera.position().y <= 1.0);
        assert!(camera.position().y > 0.99);
        assert!(camera.view_projection().is_finite());
    }

    #[test]
    fn test_zoom_disabled() {
        let (mut camera, mut orbit) = setup(settings::Controls::default());

        orbit.zoom(5.0);
        orbit.update(&mut camera);

        assert_relative_eq!(camera.position().length(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zoom_enabled() {
        let (mut camera, mut orbit) = setup(settings::Controls {
            enable_zoom: true,
            ..Default::default()
        });

        orbit.zoom(1.0);
        orbit.update(&mut camera);

        assert_relative_eq!(camera.position().length(), ZOOM_STEP, epsilon = 1e-6);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let (mut camera, _) = setup(settings::Controls::default());

        camera.resize(800, 800);
        assert_relative_eq!(camera.aspect(), 1.0);

        camera.resize(0, 0);
        assert_relative_eq!(camera.aspect(), 1.0);
    }
}
