//! Mesh containers
//!
//! No mesh file format is decoded here. Hosts register their own loader for
//! [`MESH`](crate::MESH) and produce a [`MeshAsset`]; the containers give them a
//! GPU-ready vertex layout to target.

use serde::{Deserialize, Serialize};

/// Standard vertex format
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Surface normal (normalized)
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Create a vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Calculate bounds from vertices
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        let Some(first) = vertices.first() else {
            return Self::default();
        };

        let mut bounds = Self {
            min: first.position,
            max: first.position,
        };
        for v in &vertices[1..] {
            for i in 0..3 {
                bounds.min[i] = bounds.min[i].min(v.position[i]);
                bounds.max[i] = bounds.max[i].max(v.position[i]);
            }
        }
        bounds
    }

    /// Get the center of the bounding box
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Get the size of the bounding box
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Indexed triangle mesh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshAsset {
    pub vertices: Vec<Vertex>,
    /// Triangle list indices
    pub indices: Vec<u32>,
    pub bounds: Bounds,
}

impl MeshAsset {
    /// Create a mesh, computing its bounds
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let bounds = Bounds::from_vertices(&vertices);
        Self {
            vertices,
            indices,
            bounds,
        }
    }

    /// Unit quad in the XY plane facing +Z
    pub fn quad(size: f32) -> Self {
        let h = size * 0.5;
        let n = [0.0, 0.0, 1.0];
        Self::new(
            vec![
                Vertex::new([-h, -h, 0.0], n, [0.0, 1.0]),
                Vertex::new([h, -h, 0.0], n, [1.0, 1.0]),
                Vertex::new([h, h, 0.0], n, [1.0, 0.0]),
                Vertex::new([-h, h, 0.0], n, [0.0, 0.0]),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check every index points at a vertex and the list is made of triangles
    pub fn is_valid(&self) -> bool {
        self.indices.len() % 3 == 0
            && self
                .indices
                .iter()
                .all(|&i| (i as usize) < self.vertices.len())
    }

    /// Vertex buffer bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index buffer bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
