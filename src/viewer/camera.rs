//! Scene and compositor cameras

use dolly::prelude::*;
use glam::{Mat4, Vec3};

/// 35mm film gauge, the default used for focal length conversions
pub const DEFAULT_FILM_GAUGE: f32 = 35.0;

/// Perspective camera with a physical focal length.
///
/// Placement goes through a dolly rig (position + look-at); the camera does
/// not move after construction.
pub struct PerspectiveCamera {
    rig: CameraRig,
    /// Vertical FOV in degrees
    pub fov: f32,
    /// Width / height
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// Film width in mm
    pub film_gauge: f32,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            rig: build_rig(Vec3::ZERO, Vec3::NEG_Z),
            fov,
            aspect,
            near,
            far,
            film_gauge: DEFAULT_FILM_GAUGE,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    /// Place the camera at `position` looking at `target`.
    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.rig = build_rig(position, target);
    }

    /// Film height for the current aspect (the gauge spans the longer side).
    pub fn film_height(&self) -> f32 {
        self.film_gauge / self.aspect.max(1.0)
    }

    /// Set the lens focal length in mm; recomputes the vertical FOV.
    pub fn set_focal_length(&mut self, focal_length: f32) {
        let v_extent_slope = 0.5 * self.film_height() / focal_length;
        self.fov = (2.0 * v_extent_slope.atan()).to_degrees();
        self.update_projection_matrix();
    }

    /// Focal length in mm implied by the current FOV.
    pub fn focal_length(&self) -> f32 {
        let v_extent_slope = (0.5 * self.fov.to_radians()).tan();
        0.5 * self.film_height() / v_extent_slope
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    /// Recompute the cached projection from fov/aspect/near/far.
    pub fn update_projection_matrix(&mut self) {
        // glam's perspective_rh already targets 0..1 depth
        self.projection = Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn position(&self) -> Vec3 {
        let p = self.rig.final_transform.position;
        Vec3::new(p.x, p.y, p.z)
    }

    /// Get view matrix
    pub fn view_matrix(&self) -> Mat4 {
        let t = &self.rig.final_transform;
        let pos = self.position();
        let fwd: Vec3 = t.forward();
        let up: Vec3 = t.up();
        Mat4::look_at_rh(pos, pos + fwd, up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_proj_matrix(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}

fn build_rig(position: Vec3, target: Vec3) -> CameraRig {
    let mut rig: CameraRig = CameraRig::builder()
        .with(Position::new(mint::Point3 { x: position.x, y: position.y, z: position.z }))
        .with(LookAt::new(mint::Point3 { x: target.x, y: target.y, z: target.z }).tracking_smoothness(0.0))
        .build();
    rig.update(0.0);
    rig
}

/// Orthographic camera for the full-screen compositor quad.
#[derive(Clone, Debug, PartialEq)]
pub struct OrthographicCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    /// Camera z position; it looks down -Z
    pub z: f32,
}

impl OrthographicCamera {
    /// Pixel-unit camera centred on the origin.
    pub fn for_viewport(width: f32, height: f32) -> Self {
        Self {
            left: width / -2.0,
            right: width / 2.0,
            top: height / 2.0,
            bottom: height / -2.0,
            near: -10000.0,
            far: 10000.0,
            z: 100.0,
        }
    }

    /// Re-fit the extents to a new viewport, keeping z and clip planes.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.left = width / -2.0;
        self.right = width / 2.0;
        self.top = height / 2.0;
        self.bottom = height / -2.0;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.z))
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }

    pub fn view_proj_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_focal_length_roundtrip() {
        let mut cam = PerspectiveCamera::new(70.0, 16.0 / 9.0, 1.0, 10.0);
        cam.set_focal_length(35.0);
        assert!(approx(cam.focal_length(), 35.0));
    }

    #[test]
    fn test_focal_length_sets_fov() {
        // Square aspect: film height = gauge = 35mm, focal = 17.5mm => 90 deg
        let mut cam = PerspectiveCamera::new(70.0, 1.0, 1.0, 10.0);
        cam.set_focal_length(17.5);
        assert!(approx(cam.fov, 90.0));

        // Wider aspect shrinks the film height
        let mut wide = PerspectiveCamera::new(70.0, 2.0, 1.0, 10.0);
        wide.set_focal_length(17.5);
        assert!(wide.fov < 90.0);
    }

    #[test]
    fn test_aspect_updates_projection() {
        let mut cam = PerspectiveCamera::new(70.0, 1.0, 1.0, 10.0);
        let before = cam.projection_matrix();
        cam.set_aspect(2.0);
        assert_eq!(cam.aspect, 2.0);
        assert_ne!(before, cam.projection_matrix());
        // x scale halves when aspect doubles
        let ratio = before.x_axis.x / cam.projection_matrix().x_axis.x;
        assert!(approx(ratio, 2.0));
    }

    #[test]
    fn test_look_at_origin() {
        let mut cam = PerspectiveCamera::new(70.0, 1.0, 1.0, 10.0);
        cam.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!(approx(cam.position().z, 5.0));

        // Origin lands in the middle of the screen at view depth 5
        let view = cam.view_matrix();
        let p = view.transform_point3(Vec3::ZERO);
        assert!(approx(p.x, 0.0) && approx(p.y, 0.0) && approx(p.z, -5.0));
    }

    #[test]
    fn test_depth_range_zero_to_one() {
        let cam = PerspectiveCamera::new(70.0, 1.0, 1.0, 10.0);
        let proj = cam.projection_matrix();
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!(approx(near.z, 0.0));
        assert!(approx(far.z, 1.0));
    }

    #[test]
    fn test_ortho_covers_quad() {
        let cam = OrthographicCamera::for_viewport(800.0, 600.0);
        let vp = cam.view_proj_matrix();
        let corner = vp.project_point3(Vec3::new(400.0, 300.0, -500.0));
        assert!(approx(corner.x, 1.0) && approx(corner.y, 1.0));
        assert!(corner.z > 0.0 && corner.z < 1.0);
    }
}
