use bytemuck::{Pod, Zeroable};
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StarError {
    #[error("Invalid star spec: {0}.")]
    InvalidSpec(&'static str),
}

/// Shape of an N-pointed star: spikes on `outer_radius`, notches on `inner_radius`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StarSpec {
    pub point_count: u32,
    pub outer_radius: f32,
    pub inner_radius: f32,
}

impl StarSpec {
    pub fn validate(&self) -> Result<(), StarError> {
        if self.point_count < 3 {
            return Err(StarError::InvalidSpec("point count must be at least 3"));
        }
        if !(self.outer_radius.is_finite() && self.outer_radius > 0.0) {
            return Err(StarError::InvalidSpec("outer radius must be finite and positive"));
        }
        if !(self.inner_radius.is_finite() && self.inner_radius > 0.0) {
            return Err(StarError::InvalidSpec("inner radius must be finite and positive"));
        }
        Ok(())
    }

    /// Number of vertices in the fan: center, 2N alternating points, closing slot.
    pub fn vertex_count(&self) -> usize {
        self.point_count as usize * 2 + 2
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl From<Vector3<f32>> for Vertex {
    fn from(v: Vector3<f32>) -> Self {
        Self { position: v.into() }
    }
}

/// Host-side vertex data for one star, laid out for a triangle fan.
///
/// Slot 0 is the center, slots `1 + 2n` and `2 + 2n` hold spike `n` and the
/// notch that follows it clockwise, and the last slot repeats spike 0 so the
/// fan closes.
#[derive(Clone, Debug, PartialEq)]
pub struct StarMesh {
    vertices: Vec<Vertex>,
}

impl StarMesh {
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.vertices())
    }
}

fn point_on_circle(radius: f32, degrees: f64) -> Vector3<f32> {
    let radians = degrees.to_radians();
    Vector3::new(
        radius * radians.cos() as f32,
        radius * radians.sin() as f32,
        0.0,
    )
}

pub fn generate_star(spec: &StarSpec) -> Result<StarMesh, StarError> {
    spec.validate()?;

    let points = spec.point_count as usize;
    let step = 360.0 / f64::from(spec.point_count);
    let mut vertices = vec![Vertex::default(); spec.vertex_count()];

    for n in 0..points {
        let outer_angle = 90.0 - step * n as f64;
        let inner_angle = outer_angle - step / 2.0;

        let slot = 1 + 2 * n;
        vertices[slot] = point_on_circle(spec.outer_radius, outer_angle).into();
        vertices[slot + 1] = point_on_circle(spec.inner_radius, inner_angle).into();
    }
    vertices[2 * points + 1] = vertices[1];

    Ok(StarMesh { vertices })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn spec(n: u32, outer: f32, inner: f32) -> StarSpec {
        StarSpec {
            point_count: n,
            outer_radius: outer,
            inner_radius: inner,
        }
    }

    fn norm(v: &Vertex) -> f32 {
        Vector3::from(v.position).norm()
    }

    fn angle_of(v: &Vertex) -> f64 {
        f64::from(v.position[1]).atan2(f64::from(v.position[0])).to_degrees()
    }

    fn angle_diff(a: f64, b: f64) -> f64 {
        (a - b).rem_euclid(360.0)
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn rejects_two_points() {
        assert!(matches!(
            generate_star(&spec(2, 0.5, 0.15)),
            Err(StarError::InvalidSpec(_))
        ));
    }

    #[test]
    fn rejects_zero_points() {
        assert!(spec(0, 0.5, 0.15).validate().is_err());
        assert!(generate_star(&spec(0, 0.5, 0.15)).is_err());
    }

    #[test]
    fn rejects_zero_outer_radius() {
        assert!(generate_star(&spec(5, 0.0, 0.15)).is_err());
    }

    #[test]
    fn rejects_negative_inner_radius() {
        assert!(generate_star(&spec(5, 0.5, -1.0)).is_err());
    }

    #[test]
    fn rejects_non_finite_radii() {
        assert!(generate_star(&spec(5, f32::NAN, 0.15)).is_err());
        assert!(generate_star(&spec(5, 0.5, f32::INFINITY)).is_err());
    }

    #[test]
    fn accepts_minimal_spec() {
        assert!(spec(3, 1.0, 0.1).validate().is_ok());
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn vertex_count_is_two_per_point_plus_two() {
        for n in 3..40 {
            let mesh = generate_star(&spec(n, 0.5, 0.2)).unwrap();
            assert_eq!(mesh.vertex_count(), 2 * n as usize + 2);
        }
    }

    #[test]
    fn center_is_origin() {
        for n in [3, 4, 7, 12] {
            let mesh = generate_star(&spec(n, 0.9, 0.3)).unwrap();
            assert_eq!(mesh.vertices()[0].position, [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn closing_slot_repeats_first_spike() {
        let mesh = generate_star(&spec(6, 0.7, 0.2)).unwrap();
        let v = mesh.vertices();
        assert_eq!(v[v.len() - 1], v[1]);
    }

    #[test]
    fn all_vertices_lie_in_xy_plane() {
        let mesh = generate_star(&spec(9, 0.7, 0.2)).unwrap();
        assert!(mesh.vertices().iter().all(|v| v.position[2] == 0.0));
    }

    #[test]
    fn byte_view_is_tightly_packed() {
        let mesh = generate_star(&spec(4, 0.5, 0.15)).unwrap();
        assert_eq!(std::mem::size_of::<Vertex>(), 12);
        assert_eq!(mesh.as_bytes().len(), 10 * 12);
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn spikes_and_notches_sit_on_their_radii() {
        let (outer, inner) = (0.8, 0.25);
        for n in [3u32, 5, 8, 17] {
            let mesh = generate_star(&spec(n, outer, inner)).unwrap();
            let v = mesh.vertices();
            for k in 0..n as usize {
                assert!((norm(&v[1 + 2 * k]) - outer).abs() < EPS);
                assert!((norm(&v[2 + 2 * k]) - inner).abs() < EPS);
            }
        }
    }

    #[test]
    fn spikes_are_evenly_spaced_clockwise() {
        let n = 7;
        let step = 360.0 / f64::from(n);
        let mesh = generate_star(&spec(n, 0.5, 0.2)).unwrap();
        let v = mesh.vertices();
        for k in 0..(n as usize - 1) {
            let diff = angle_diff(angle_of(&v[1 + 2 * k]), angle_of(&v[3 + 2 * k]));
            assert!((diff - step).abs() < 1e-3, "spike {k}: {diff}");
        }
    }

    #[test]
    fn notches_bisect_neighbouring_spikes() {
        let n = 5;
        let half = 180.0 / f64::from(n);
        let mesh = generate_star(&spec(n, 0.5, 0.2)).unwrap();
        let v = mesh.vertices();
        for k in 0..n as usize {
            let before = angle_diff(angle_of(&v[1 + 2 * k]), angle_of(&v[2 + 2 * k]));
            let after = angle_diff(angle_of(&v[2 + 2 * k]), angle_of(&v[3 + 2 * k]));
            assert!((before - half).abs() < 1e-3);
            assert!((after - half).abs() < 1e-3);
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let s = spec(11, 0.6, 0.21);
        let a = generate_star(&s).unwrap();
        let b = generate_star(&s).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn four_point_star_matches_reference() {
        let mesh = generate_star(&spec(4, 0.5, 0.15)).unwrap();
        let v = mesh.vertices();
        assert_eq!(v.len(), 10);

        let [x, y, z] = v[1].position;
        assert!(x.abs() < EPS);
        assert!((y - 0.5).abs() < EPS);
        assert_eq!(z, 0.0);

        let [x, y, z] = v[2].position;
        assert!((x - 0.106_066).abs() < 1e-4);
        assert!((y - 0.106_066).abs() < 1e-4);
        assert_eq!(z, 0.0);

        // Third spike points straight down.
        let [x, y, _] = v[5].position;
        assert!(x.abs() < EPS);
        assert!((y + 0.5).abs() < EPS);
    }
}
