/// Camera and screen-plane projection
/// The camera supplies position and orientation; `TileProjection` maps world points into tile space
use crate::config::SceneConfig;
use glam::{Mat4, Quat, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,   // Rotation around Y axis (radians)
    pub pitch: f32, // Rotation around X axis (radians)
    /// Horizontal field of view (radians)
    pub fov: f32,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            fov: 90.0f32.to_radians(),
        }
    }

    /// Update camera orientation to look at a specific target point.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let view_matrix = Mat4::look_at_rh(self.position, target, up);
        let rotation_quat = Quat::from_mat4(&view_matrix.inverse());
        let (yaw, pitch, _roll) = rotation_quat.to_euler(glam::EulerRot::YXZ);
        self.yaw = yaw;
        self.pitch = pitch;
    }

    /// Get forward direction vector
    pub fn forward(&self) -> Vec3 {
        self.rotation_quat() * Vec3::NEG_Z
    }

    /// Get right direction vector
    pub fn right(&self) -> Vec3 {
        self.rotation_quat() * Vec3::X
    }

    /// Get up direction vector
    pub fn up(&self) -> Vec3 {
        self.rotation_quat() * Vec3::Y
    }

    /// Distance from the eye to a screen plane one unit wide
    pub fn pov(&self) -> f32 {
        0.5 / (self.fov * 0.5).tan()
    }

    fn rotation_quat(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }
}

/// Per-frame screen-plane setup in tile units.
///
/// The screen plane sits `pov` in front of the eye, is one unit wide and
/// `aspect` units tall, with `org` at its top-left corner. Tile rows grow
/// downward, so `ver` points down the screen.
#[derive(Debug, Clone, Copy)]
pub struct TileProjection {
    pub pos: Vec3,
    pub nrm: Vec3,
    pub pov: f32,
    /// Eye to the screen's top-left corner
    pub dir: Vec3,
    /// Screen's top-left corner in world space
    pub org: Vec3,
    /// Horizontal axis scaled to tiles
    pub htl: Vec3,
    /// Vertical axis scaled to tiles
    pub vtl: Vec3,
}

impl TileProjection {
    pub fn new(camera: &Camera, config: &SceneConfig) -> Self {
        let pos = camera.position;
        let hor = camera.right();
        let ver = -camera.up();
        let nrm = camera.forward();
        let pov = camera.pov();

        let dir = nrm * pov - (hor + ver * config.aspect()) * 0.5;
        let x_res = config.x_res as f32;

        Self {
            pos,
            nrm,
            pov,
            dir,
            org: pos + dir,
            htl: hor * (x_res / config.tile_w as f32),
            vtl: ver * (x_res / config.tile_h as f32),
        }
    }

    /// Signed distance of `v` from the screen plane (positive in front)
    #[inline]
    pub fn depth(&self, v: Vec3) -> f32 {
        (v - self.org).dot(self.nrm)
    }

    /// Perspective projection of a point in front of the eye
    #[inline]
    pub fn project(&self, v: Vec3) -> Vec2 {
        let rel = v - self.pos;
        let d = rel.dot(self.nrm) / self.pov;
        let vec = rel / d - self.dir;
        Vec2::new(vec.dot(self.htl), vec.dot(self.vtl))
    }

    /// Projection of a point already lying on the screen plane
    #[inline]
    pub fn project_on_plane(&self, p: Vec3) -> Vec2 {
        let vec = p - self.org;
        Vec2::new(vec.dot(self.htl), vec.dot(self.vtl))
    }
}
