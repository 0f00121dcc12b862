//! View-frustum construction and bounding-sphere culling.

use std::collections::HashMap;

use nalgebra::Vector3;
use serde::Serialize;

/// Classification of a point against a plane, with a small tolerance band
/// around the surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaneLocation {
    Front,
    Back,
    OnPlane,
}

const PLANE_THICKNESS: f64 = 1e-6;

/// A plane in signed form: `dot(normal, p) + distance`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    /// Unit normal.
    pub normal: Vector3<f64>,
    /// Signed offset from the origin along the normal.
    pub distance: f64,
}

impl Plane {
    /// Signed distance from `point` to the plane; positive on the normal
    /// side.
    pub fn distance_to_point(&self, point: &Vector3<f64>) -> f64 {
        self.normal.dot(point) + self.distance
    }

    pub fn classify_point(&self, point: &Vector3<f64>) -> PlaneLocation {
        let distance = self.distance_to_point(point);
        if distance > PLANE_THICKNESS {
            PlaneLocation::Front
        } else if distance < -PLANE_THICKNESS {
            PlaneLocation::Back
        } else {
            PlaneLocation::OnPlane
        }
    }

    /// Whether a sphere lies at least partly on the normal side.
    pub fn is_sphere_on_front_side(&self, center: &Vector3<f64>, radius: f64) -> bool {
        self.distance_to_point(center) > -radius
    }
}

/// A sphere used for cheap visibility tests.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vector3<f64>,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: Vector3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    /// The sphere translated to `position` and uniformly scaled.
    pub fn transformed(&self, position: Vector3<f64>, scale: f64) -> Self {
        Self {
            center: self.center + position,
            radius: self.radius * scale,
        }
    }
}

/// Camera description a frustum is derived from.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub position: Vector3<f64>,
    /// Look-at target.
    pub center: Vector3<f64>,
    /// Vertical field of view (`deg`).
    pub fov: f64,
    pub aspect_ratio: f64,
    pub near: f64,
    pub far: f64,
    pub up: Vector3<f64>,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            center: Vector3::new(0.0, 1.0, 0.0),
            fov: 60.0,
            aspect_ratio: 1.0,
            near: 0.01,
            far: 100.0,
            up: Vector3::new(0.0, 0.0, 1.0),
        }
    }
}

/// The six-plane view volume, rebuilt wholesale on every camera update.
///
/// Plane order is near, far, top, bottom, left, right; all normals point
/// into the frustum.
#[derive(Clone, Debug, Default)]
pub struct Frustum {
    planes: Vec<Plane>,
}

impl Frustum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Rebuild all six planes from camera parameters.
    pub fn update_from_camera(&mut self, camera: &CameraParams) {
        let position = camera.position;

        let mut forward = camera.center - position;
        forward = if forward.norm() > 0.0 {
            forward.normalize()
        } else {
            Vector3::new(0.0, 0.0, -1.0)
        };

        let mut right = forward.cross(&camera.up);
        right = if right.norm() > 0.0 {
            right.normalize()
        } else {
            Vector3::new(1.0, 0.0, 0.0)
        };

        let up = right.cross(&forward);

        let half_fov = camera.fov.to_radians() / 2.0;
        let near_height = 2.0 * libm::tan(half_fov) * camera.near;
        let near_width = near_height * camera.aspect_ratio;

        let near_center = position + forward * camera.near;
        let far_center = position + forward * camera.far;

        self.planes.clear();

        self.planes.push(Plane {
            normal: forward,
            distance: -forward.dot(&near_center),
        });
        self.planes.push(Plane {
            normal: -forward,
            distance: forward.dot(&far_center),
        });

        let half_near_height = near_height / 2.0;
        let half_near_width = near_width / 2.0;

        let side_edges = [
            (near_center + up * half_near_height - position, right),
            (near_center - up * half_near_height - position, -right),
            (near_center - right * half_near_width - position, up),
            (near_center + right * half_near_width - position, -up),
        ];

        for (edge, axis) in side_edges {
            let normal = edge.cross(&axis);
            if normal.norm() == 0.0 {
                continue;
            }
            let mut normal = normal.normalize();
            // Flip so the normal points into the frustum.
            if normal.dot(&(position - near_center)) > 0.0 {
                normal = -normal;
            }
            self.planes.push(Plane {
                normal,
                distance: -normal.dot(&position),
            });
        }
    }

    /// A point is visible unless some plane puts it strictly behind.
    pub fn is_point_visible(&self, point: &Vector3<f64>) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.classify_point(point) != PlaneLocation::Back)
    }

    /// A sphere is visible iff it reaches the front side of every plane.
    pub fn is_sphere_visible(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.is_sphere_on_front_side(&sphere.center, sphere.radius))
    }

    /// Batch-test labeled spheres; returns the visible labels.
    pub fn cull_spheres(&self, spheres: &[(String, BoundingSphere)]) -> Vec<String> {
        spheres
            .iter()
            .filter(|(_, sphere)| self.is_sphere_visible(sphere))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Lifetime counters of a [`FrustumCuller`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CullingStats {
    pub enabled: bool,
    pub frame_count: u64,
    pub total_checked: u64,
    pub total_culled: u64,
    pub average_cull_ratio: f64,
    pub registered_objects: usize,
}

/// Registry of object bounds plus the active frustum.
///
/// The statistics counters are per-instance mutable state and not safe for
/// concurrent mutation.
#[derive(Debug, Default)]
pub struct FrustumCuller {
    frustum: Frustum,
    object_bounds: HashMap<String, BoundingSphere>,
    enabled: bool,
    frame_count: u64,
    total_checked: u64,
    total_culled: u64,
}

impl FrustumCuller {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Register an object's bounding sphere in local coordinates.
    pub fn register_object(&mut self, name: impl Into<String>, center: Vector3<f64>, radius: f64) {
        self.object_bounds
            .insert(name.into(), BoundingSphere::new(center, radius));
    }

    /// Drop a registered object. Returns whether it existed.
    pub fn unregister_object(&mut self, name: &str) -> bool {
        self.object_bounds.remove(name).is_some()
    }

    pub fn update_frustum(&mut self, camera: &CameraParams) {
        self.frustum.update_from_camera(camera);
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Enable or disable culling; while disabled every queried object is
    /// reported visible.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Transform each registered object's bounds to its world position,
    /// test against the current frustum, and return the visible names.
    /// Positions without a registered bound are skipped.
    pub fn cull_objects(&mut self, positions: &HashMap<String, Vector3<f64>>) -> Vec<String> {
        if !self.enabled {
            return positions.keys().cloned().collect();
        }

        let spheres: Vec<(String, BoundingSphere)> = positions
            .iter()
            .filter_map(|(name, position)| {
                self.object_bounds
                    .get(name)
                    .map(|bounds| (name.clone(), bounds.transformed(*position, 1.0)))
            })
            .collect();

        let visible = self.frustum.cull_spheres(&spheres);

        self.frame_count += 1;
        self.total_checked += spheres.len() as u64;
        self.total_culled += (spheres.len() - visible.len()) as u64;

        visible
    }

    pub fn stats(&self) -> CullingStats {
        let average_cull_ratio = if self.total_checked > 0 {
            self.total_culled as f64 / self.total_checked as f64
        } else {
            0.0
        };
        CullingStats {
            enabled: self.enabled,
            frame_count: self.frame_count,
            total_checked: self.total_checked,
            total_culled: self.total_culled,
            average_cull_ratio,
            registered_objects: self.object_bounds.len(),
        }
    }

    pub fn reset_stats(&mut self) {
        self.frame_count = 0;
        self.total_checked = 0;
        self.total_culled = 0;
    }
}
