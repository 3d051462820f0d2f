use cgmath::{vec3, Deg, EuclideanSpace, Matrix4, PerspectiveFov, Point3, Rad, Transform, Vector2, Vector3};
use crate::j3d::shp1::Shape;
use crate::settings::Settings;
use std::f32::consts::PI;

#[derive(Clone, Debug)]
pub struct Eye {
    pub position: Point3<f32>,
    pub azimuth: f32,
    pub altitude: f32,
    pub aspect_ratio: f32,
}

impl Eye {
    /// An eye looking down -Z at the bounding box of `shapes`, far
    /// enough back to see all of it.
    pub fn framing(shapes: &[Shape], fov_y: f32) -> Eye {
        let mut eye = Eye::default();
        if shapes.is_empty() {
            return eye;
        }
        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);
        for shape in shapes {
            for i in 0..3 {
                min[i] = min[i].min(shape.min[i]);
                max[i] = max[i].max(shape.max[i]);
            }
        }
        let center = min.midpoint(max);
        let radius = (max - min).x.max((max - min).y) / 2.0;
        let half_fov = Rad::from(Deg(fov_y / 2.0)).0;
        let distance = radius / half_fov.tan() + (max.z - center.z);
        eye.position = center + vec3(0.0, 0.0, distance.max(1.0));
        eye
    }

    pub fn model_view(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(Rad(-self.altitude)) *
        Matrix4::from_angle_y(Rad(-self.azimuth)) *
        Matrix4::from_translation(-self.position.to_vec())
    }

    pub fn projection(&self, settings: &Settings) -> Matrix4<f32> {
        let persp = PerspectiveFov {
            fovy: Rad::from(Deg(settings.fov_y)),
            aspect: self.aspect_ratio,
            near: settings.z_near,
            far: settings.z_far,
        };
        Matrix4::from(persp)
    }

    /// Move in the direction of dv. X = forward, Y = right-side, Z = up.
    pub fn move_by(&mut self, dv: Vector3<f32>) {
        // Treating the eye as if it were inclined neither up nor down,
        // transform the forward/side/up basis in camera space into
        // world space.
        let t = Matrix4::from_angle_y(Rad(self.azimuth));
        let forward = t.transform_vector(vec3(0.0, 0.0, -1.0));
        let side = t.transform_vector(vec3(1.0, 0.0, 0.0));
        let up = t.transform_vector(vec3(0.0, 1.0, 0.0));

        self.position += forward * dv.x + side * dv.y + up * dv.z;
    }

    pub fn free_look(&mut self, dv: Vector2<f32>) {
        self.azimuth -= dv.x;
        self.altitude -= dv.y;

        // Wrap once (expect dv to be small) for azimuth
        if self.azimuth >= 2.0 * PI {
            self.azimuth -= 2.0 * PI;
        } else if self.azimuth < 0.0 {
            self.azimuth += 2.0 * PI;
        }

        // Clamp into allowable altitude range to avoid singularities
        // at the poles.
        let max_alt = 0.499 * PI;
        self.altitude = self.altitude.max(-max_alt).min(max_alt);
    }
}

impl Default for Eye {
    fn default() -> Eye {
        Eye {
            position: Point3::new(0.0, 0.0, 0.0),
            azimuth: 0.0,
            altitude: 0.0,
            aspect_ratio: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{vec2, Vector4};

    #[test]
    fn looks_down_negative_z() {
        let eye = Eye { position: Point3::new(0.0, 0.0, 10.0), ..Eye::default() };
        let p = eye.model_view() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.z + 10.0).abs() < 1e-5);
    }

    #[test]
    fn altitude_is_clamped() {
        let mut eye = Eye::default();
        eye.free_look(vec2(0.0, -10.0));
        assert!(eye.altitude < 0.5 * PI);
        eye.free_look(vec2(0.1, 0.0));
        assert!(eye.azimuth > 0.0 && eye.azimuth < 2.0 * PI);
    }

    #[test]
    fn forward_follows_azimuth() {
        let mut eye = Eye::default();
        eye.azimuth = 0.5 * PI;
        eye.move_by(vec3(1.0, 0.0, 0.0));
        assert!((eye.position.x + 1.0).abs() < 1e-5);
        assert!(eye.position.z.abs() < 1e-5);
    }
}
