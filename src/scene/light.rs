//! Light types for the scene

use glam::{Mat4, Vec3, Vec4};

/// Point light that also renders the shadow map from its position
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Vec4,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(500.0, 500.0, -500.0),
            target: Vec3::ZERO,
            color: Vec4::new(0.7, 0.7, 1.0, 1.0),
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 1.0,
            far: 3000.0,
        }
    }
}

impl ShadowLight {
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position,
            color,
            ..Default::default()
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_lh(self.position, self.target, Vec3::Y)
    }

    /// Square shadow map, so the aspect is fixed at 1
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, 1.0, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_inside_light_frustum() {
        let light = ShadowLight::default();
        let clip = light.projection_matrix() * light.view_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
