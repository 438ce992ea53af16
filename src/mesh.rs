use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;

use anyhow::{Context, ensure};
use ash::vk;
use log::*;

use crate::renderer::{GPUWrite, VertexDescription};

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(16))]
pub struct Vertex {
    pub position: glam::Vec3,
    pub color: glam::Vec3,
    pub tex_coord: glam::Vec2,
}

impl GPUWrite for Vertex {}

impl Vertex {
    /// Bitwise identity of every component, so equal keys mean interchangeable vertices
    pub fn dedup_key(&self) -> [u32; 8] {
        let p = self.position;
        let c = self.color;
        let t = self.tex_coord;
        [p.x, p.y, p.z, c.x, c.y, c.z, t.x, t.y].map(f32::to_bits)
    }
}

impl VertexDescription for Vertex {
    fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![
            vk::VertexInputBindingDescription::default()
                .binding(0)
                .stride(std::mem::size_of::<Self>() as u32)
                .input_rate(vk::VertexInputRate::VERTEX),
        ]
    }

    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        // color formats are also used to define non-color vec sizes 1-4
        let vec_3_format = vk::Format::R32G32B32_SFLOAT;
        let vec_2_format = vk::Format::R32G32_SFLOAT;

        vec![
            // position
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vec_3_format)
                .offset(std::mem::offset_of!(Vertex, position) as u32),
            // color
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vec_3_format)
                .offset(std::mem::offset_of!(Vertex, color) as u32),
            // texture coordinate
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(2)
                .format(vec_2_format)
                .offset(std::mem::offset_of!(Vertex, tex_coord) as u32),
        ]
    }
}

/// Collapses items with equal keys, keeping first-seen order
///
/// Returns the unique items and, for every input item, the index of its unique copy.
pub fn deduplicate<T, K>(items: &[T], key: impl Fn(&T) -> K) -> (Vec<T>, Vec<u32>)
where
    T: Clone,
    K: Eq + Hash,
{
    let mut unique = Vec::new();
    let mut indices = Vec::with_capacity(items.len());
    let mut seen: HashMap<K, u32> = HashMap::new();

    for item in items {
        let index = *seen.entry(key(item)).or_insert_with(|| {
            unique.push(item.clone());
            (unique.len() - 1) as u32
        });
        indices.push(index);
    }

    (unique, indices)
}

/// Per-corner mesh attributes as a model file describes them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub positions: Vec<[f32; 3]>,
    /// one per position; white when the file has none
    pub colors: Vec<[f32; 3]>,
    /// one per position; zero when the file has none
    pub tex_coords: Vec<[f32; 2]>,
    /// three per triangle, into the attribute arrays
    pub indices: Vec<u32>,
}

impl RawMesh {
    /// Expands every triangle corner into a vertex
    pub fn corners(&self) -> Vec<Vertex> {
        self.indices
            .iter()
            .map(|&i| {
                let i = i as usize;
                Vertex {
                    position: self.positions[i].into(),
                    color: self.colors.get(i).copied().unwrap_or([1.0; 3]).into(),
                    tex_coord: self.tex_coords.get(i).copied().unwrap_or([0.0; 2]).into(),
                }
            })
            .collect()
    }

    /// Unique vertices plus an index list referencing them
    pub fn into_indexed(self) -> (Vec<Vertex>, Vec<u32>) {
        let corners = self.corners();
        let (vertices, indices) = deduplicate(&corners, Vertex::dedup_key);

        debug!(
            "deduplicated {} corners into {} vertices",
            corners.len(),
            vertices.len()
        );

        (vertices, indices)
    }
}

pub trait MeshLoader {
    fn load(&self, path: &Path) -> anyhow::Result<RawMesh>;
}

/// Wavefront OBJ via tobj; every model in the file is merged into one mesh
pub struct ObjLoader;

impl MeshLoader for ObjLoader {
    fn load(&self, path: &Path) -> anyhow::Result<RawMesh> {
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(path, &options)
            .with_context(|| format!("failed to load model: {path:?}"))?;

        let mut raw = RawMesh::default();
        for model in models {
            let mesh = model.mesh;
            let base = raw.positions.len() as u32;
            let vertex_count = mesh.positions.len() / 3;

            for i in 0..vertex_count {
                let p = &mesh.positions[i * 3..i * 3 + 3];
                raw.positions.push([p[0], p[1], p[2]]);

                let color = mesh
                    .vertex_color
                    .get(i * 3..i * 3 + 3)
                    .map_or([1.0; 3], |c| [c[0], c[1], c[2]]);
                raw.colors.push(color);

                // in obj, 0 is the bottom, in vulkan, 0 is the top
                let tex_coord = mesh
                    .texcoords
                    .get(i * 2..i * 2 + 2)
                    .map_or([0.0; 2], |t| [t[0], 1.0 - t[1]]);
                raw.tex_coords.push(tex_coord);
            }

            raw.indices.extend(mesh.indices.iter().map(|i| base + i));
        }

        let vertex_count = raw.positions.len();
        ensure!(
            raw.indices.iter().all(|&i| (i as usize) < vertex_count),
            "model {path:?} has an index out of range"
        );

        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> RawMesh {
        // two triangles sharing an edge, written out corner by corner
        RawMesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            colors: vec![[1.0; 3]; 4],
            tex_coords: vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    #[test]
    fn shared_corners_collapse() {
        let (vertices, indices) = quad().into_indexed();

        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 1, 2, 2, 3, 0]);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn deduplication_is_idempotent() {
        let corners = quad().corners();
        let (once, once_indices) = deduplicate(&corners, Vertex::dedup_key);
        let (twice, twice_indices) = deduplicate(&once, Vertex::dedup_key);

        assert_eq!(once, twice);
        assert_eq!(twice_indices, (0..once.len() as u32).collect::<Vec<_>>());

        let (again, again_indices) = deduplicate(&corners, Vertex::dedup_key);
        assert_eq!(again, once);
        assert_eq!(again_indices, once_indices);
    }

    #[test]
    fn differing_tex_coords_stay_distinct() {
        let mut mesh = quad();
        // same position as corner 0, different texture coordinate
        mesh.positions.push([0.0, 0.0, 0.0]);
        mesh.colors.push([1.0; 3]);
        mesh.tex_coords.push([0.5, 0.5]);
        mesh.indices.extend([4, 1, 2]);

        let (vertices, indices) = mesh.into_indexed();
        assert_eq!(vertices.len(), 5);
        assert_eq!(&indices[6..], &[4, 1, 2]);
    }

    #[test]
    fn generic_over_the_key() {
        let words = ["a", "bb", "cc", "d"];
        let (unique, indices) = deduplicate(&words, |w| w.len());

        assert_eq!(unique, vec!["a", "bb"]);
        assert_eq!(indices, vec![0, 1, 1, 0]);
    }

    #[test]
    fn empty_mesh_is_fine() {
        let (vertices, indices) = RawMesh::default().into_indexed();
        assert!(vertices.is_empty());
        assert!(indices.is_empty());
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let mesh = RawMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            colors: vec![],
            tex_coords: vec![],
            indices: vec![0, 1, 2],
        };

        let corners = mesh.corners();
        assert_eq!(corners[1].color, glam::Vec3::ONE);
        assert_eq!(corners[1].tex_coord, glam::Vec2::ZERO);
    }

    #[test]
    fn vertex_layout_matches_the_attributes() {
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 24);

        let bindings = Vertex::binding_descriptions();
        assert_eq!(bindings[0].stride as usize, std::mem::size_of::<Vertex>());
    }

    #[test]
    fn obj_files_load_through_tobj() {
        let path = std::env::temp_dir().join(format!("mesh-test-{}.obj", std::process::id()));
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             f 1/1 2/2 3/3 4/4\n",
        )
        .unwrap();

        let raw = ObjLoader.load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        // the quad face is triangulated
        assert_eq!(raw.indices.len(), 6);
        assert_eq!(raw.positions.len(), 4);
        // v is flipped for vulkan
        let origin = raw
            .positions
            .iter()
            .position(|p| *p == [0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(raw.tex_coords[origin], [0.0, 1.0]);
        assert_eq!(raw.colors[origin], [1.0; 3]);
    }

    #[test]
    fn missing_obj_file_is_an_error() {
        let result = ObjLoader.load(Path::new("/definitely/not/here.obj"));
        assert!(result.is_err());
    }
}
