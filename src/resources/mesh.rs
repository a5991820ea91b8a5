//! Mesh data structures and generation

use std::f32::consts::{PI, TAU};
use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use crate::backend::types::{MeshDescriptor, Vertex};
use crate::error::AssetError;

/// Prefix selecting a procedural mesh instead of a file
pub const BUILTIN_PREFIX: &str = "builtin:";

/// CPU-side geometry, uploaded once and never modified
#[derive(Debug, Clone)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl MeshData {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    /// Calculate triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn descriptor(&self) -> MeshDescriptor<'_> {
        MeshDescriptor {
            label: &self.name,
            vertices: &self.vertices,
            indices: &self.indices,
        }
    }

    /// Procedural mesh by name: `sphere`, `torus`, `disc`, `plane` or `quad`
    pub fn builtin(name: &str) -> Result<Self, AssetError> {
        let mut mesh = match name {
            "sphere" => Self::sphere(50.0, 64, 32),
            "torus" => Self::torus(40.0, 15.0, 48, 24),
            "disc" => Self::disc(150.0, 64),
            "plane" => Self::plane(300.0, 300.0, 1),
            "quad" => Self::fullscreen_quad(),
            _ => return Err(AssetError::UnknownBuiltin(name.to_string())),
        };
        mesh.name = format!("{BUILTIN_PREFIX}{name}");
        Ok(mesh)
    }

    /// Create a UV sphere
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut mesh = MeshData::new("sphere");

        let segment_angle = TAU / segments as f32;
        let ring_angle = PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());

                mesh.vertices.push(Vertex {
                    position: normal * radius,
                    normal,
                    uv: Vec2::new(
                        segment as f32 / segments as f32,
                        ring as f32 / rings as f32,
                    ),
                    tangent: Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0),
                });
            }
        }

        mesh.indices = grid_indices(segments, rings);
        mesh
    }

    /// Create a torus standing in the XY plane, hole along Z
    pub fn torus(major_radius: f32, minor_radius: f32, rings: u32, sides: u32) -> Self {
        let mut mesh = MeshData::new("torus");

        for ring in 0..=rings {
            let theta = ring as f32 / rings as f32 * TAU;
            let (sin_theta, cos_theta) = theta.sin_cos();

            for side in 0..=sides {
                let phi = side as f32 / sides as f32 * TAU;
                let (sin_phi, cos_phi) = phi.sin_cos();

                let normal = Vec3::new(cos_phi * cos_theta, cos_phi * sin_theta, sin_phi);
                let tube_center = Vec3::new(cos_theta, sin_theta, 0.0) * major_radius;

                mesh.vertices.push(Vertex {
                    position: tube_center + normal * minor_radius,
                    normal,
                    uv: Vec2::new(ring as f32 / rings as f32, side as f32 / sides as f32),
                    tangent: Vec4::new(-sin_theta, cos_theta, 0.0, 1.0),
                });
            }
        }

        mesh.indices = grid_indices(sides, rings);
        mesh
    }

    /// Create a flat disc on the XZ plane facing +Y
    pub fn disc(radius: f32, segments: u32) -> Self {
        let mut mesh = MeshData::new("disc");

        mesh.vertices.push(Vertex {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            uv: Vec2::splat(0.5),
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
        });

        for segment in 0..=segments {
            let angle = segment as f32 / segments as f32 * TAU;
            let (sin, cos) = angle.sin_cos();
            mesh.vertices.push(Vertex {
                position: Vec3::new(cos * radius, 0.0, sin * radius),
                normal: Vec3::Y,
                uv: Vec2::new(0.5 + cos * 0.5, 0.5 - sin * 0.5),
                tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            });
        }

        for segment in 1..=segments {
            mesh.indices.extend_from_slice(&[0, segment + 1, segment]);
        }

        mesh
    }

    /// Create a plane on the XZ axis
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = MeshData::new("plane");

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                mesh.vertices.push(Vertex {
                    position: Vec3::new(
                        -half_width + x as f32 * step_x,
                        0.0,
                        -half_depth + z as f32 * step_z,
                    ),
                    normal: Vec3::Y,
                    uv: Vec2::new(x as f32 / subdivisions as f32, z as f32 / subdivisions as f32),
                    tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
                });
            }
        }

        mesh.indices = grid_indices(subdivisions, subdivisions);
        mesh
    }

    /// Two-triangle quad covering clip space, UV origin top-left
    pub fn fullscreen_quad() -> Self {
        let mut mesh = MeshData::new("fullscreen_quad");

        let corners = [
            (Vec2::new(-1.0, 1.0), Vec2::new(0.0, 0.0)),
            (Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0)),
            (Vec2::new(1.0, -1.0), Vec2::new(1.0, 1.0)),
            (Vec2::new(-1.0, -1.0), Vec2::new(0.0, 1.0)),
        ];
        for (position, uv) in corners {
            mesh.vertices.push(Vertex {
                position: position.extend(0.0),
                normal: Vec3::NEG_Z,
                uv,
                tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            });
        }
        mesh.indices = vec![0, 1, 3, 3, 1, 2];

        mesh
    }

    /// Load every model in a Wavefront OBJ file into one mesh
    pub fn from_obj(path: &Path) -> Result<Self, AssetError> {
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )
        .map_err(|source| AssetError::Obj {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("mesh");
        let mut mesh = MeshData::new(name);
        let mut has_normals = true;

        for model in &models {
            let source = &model.mesh;
            let base = mesh.vertices.len() as u32;
            let vertex_count = source.positions.len() / 3;
            has_normals &= source.normals.len() == source.positions.len();

            for i in 0..vertex_count {
                let position = Vec3::from_slice(&source.positions[i * 3..i * 3 + 3]);
                let normal = source
                    .normals
                    .get(i * 3..i * 3 + 3)
                    .map(Vec3::from_slice)
                    .unwrap_or(Vec3::ZERO);
                // OBJ puts the texture origin bottom-left
                let uv = source
                    .texcoords
                    .get(i * 2..i * 2 + 2)
                    .map(|t| Vec2::new(t[0], 1.0 - t[1]))
                    .unwrap_or(Vec2::ZERO);

                mesh.vertices.push(Vertex {
                    position,
                    normal,
                    uv,
                    tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
                });
            }

            mesh.indices
                .extend(source.indices.iter().map(|index| base + index));
        }

        if mesh.indices.is_empty() {
            return Err(AssetError::EmptyMesh {
                path: path.to_path_buf(),
            });
        }
        if !has_normals {
            mesh.recompute_normals();
        }

        Ok(mesh)
    }

    /// Replace normals with area-weighted face normals
    pub fn recompute_normals(&mut self) {
        for vertex in &mut self.vertices {
            vertex.normal = Vec3::ZERO;
        }
        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            let (pa, pb, pc) = (
                self.vertices[a].position,
                self.vertices[b].position,
                self.vertices[c].position,
            );
            let face = (pb - pa).cross(pc - pa);
            for index in [a, b, c] {
                self.vertices[index].normal += face;
            }
        }
        for vertex in &mut self.vertices {
            vertex.normal = vertex.normal.normalize_or_zero();
        }
    }
}

/// Indices for a `(columns + 1) x (rows + 1)` vertex grid
fn grid_indices(columns: u32, rows: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity((columns * rows * 6) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let current = row * (columns + 1) + column;
            let next = current + columns + 1;

            indices.extend_from_slice(&[
                current,
                next,
                current + 1,
                current + 1,
                next,
                next + 1,
            ]);
        }
    }
    indices
}
