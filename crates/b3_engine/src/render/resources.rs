//! GPU resource registry
//!
//! Meshes and textures are shared between nodes through `Arc`. The registry
//! gives each distinct allocation one GPU upload: meshes get a [`MeshId`],
//! textures get a slot in the texture array. Identity is the `Arc` pointer,
//! not the contents, so two equal but separately allocated meshes upload twice.
//!
//! The registry holds a clone of every registered `Arc`, which keeps the
//! pointer from being reused by a different allocation while it is a key.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::assets::{Mesh, Texture};
use crate::scene::SceneGraph;

use super::backend::{BackendError, RenderBackend};

/// Handle of an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Resource registration errors
#[derive(Error, Debug)]
pub enum ResourceError {
    /// More distinct textures than the texture array can hold
    #[error("Texture array is full ({capacity} slots)")]
    TextureCapacityExceeded {
        /// Size of the texture array
        capacity: u32,
    },

    /// The backend failed to upload
    #[error("Upload failed: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug)]
struct MeshEntry {
    id: MeshId,
    index_count: u32,
    _mesh: Arc<Mesh>,
}

/// Counts of resources uploaded by one [`GpuResources::upload_new`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Meshes uploaded
    pub meshes: usize,
    /// Textures uploaded
    pub textures: usize,
}

/// Identity-keyed registry of uploaded meshes and textures
#[derive(Debug)]
pub struct GpuResources {
    meshes: HashMap<usize, MeshEntry>,
    textures: HashMap<usize, u32>,
    texture_refs: Vec<Arc<Texture>>,
    texture_capacity: u32,
}

fn identity<T>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as usize
}

impl GpuResources {
    /// Create an empty registry with room for `texture_capacity` textures
    pub fn new(texture_capacity: u32) -> Self {
        Self {
            meshes: HashMap::new(),
            textures: HashMap::new(),
            texture_refs: Vec::new(),
            texture_capacity,
        }
    }

    /// Upload every mesh and texture in the scene that has not been seen before
    pub fn upload_new<B>(&mut self, scene: &SceneGraph, backend: &mut B) -> Result<UploadStats, ResourceError>
    where
        B: RenderBackend + ?Sized,
    {
        let mut stats = UploadStats::default();

        for (_, node) in scene.iter() {
            let mesh = node.mesh();
            if !self.meshes.contains_key(&identity(mesh)) {
                let id = MeshId(self.meshes.len() as u32);
                backend.upload_mesh(id, mesh)?;
                self.meshes.insert(
                    identity(mesh),
                    MeshEntry {
                        id,
                        index_count: mesh.index_count(),
                        _mesh: Arc::clone(mesh),
                    },
                );
                stats.meshes += 1;
            }

            let texture = node.texture();
            if !self.textures.contains_key(&identity(texture)) {
                let slot = self.texture_refs.len() as u32;
                if slot >= self.texture_capacity {
                    return Err(ResourceError::TextureCapacityExceeded {
                        capacity: self.texture_capacity,
                    });
                }
                backend.upload_texture(slot, texture)?;
                self.textures.insert(identity(texture), slot);
                self.texture_refs.push(Arc::clone(texture));
                stats.textures += 1;
            }
        }

        if stats.meshes > 0 || stats.textures > 0 {
            log::debug!("Uploaded {} meshes and {} textures", stats.meshes, stats.textures);
        }
        Ok(stats)
    }

    /// Id of an uploaded mesh
    pub fn mesh_id(&self, mesh: &Arc<Mesh>) -> Option<MeshId> {
        self.meshes.get(&identity(mesh)).map(|entry| entry.id)
    }

    /// Index count of an uploaded mesh
    pub fn index_count(&self, mesh: &Arc<Mesh>) -> Option<u32> {
        self.meshes.get(&identity(mesh)).map(|entry| entry.index_count)
    }

    /// Texture array slot of an uploaded texture
    pub fn texture_slot(&self, texture: &Arc<Texture>) -> Option<u32> {
        self.textures.get(&identity(texture)).copied()
    }

    /// Number of distinct meshes uploaded
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of distinct textures uploaded
    pub fn texture_count(&self) -> usize {
        self.texture_refs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::primitives::{cube_mesh, sphere_mesh};
    use crate::assets::texture::RgbaColor;
    use crate::render::backends::recording::{BackendEvent, RecordingBackend};
    use crate::scene::Node;

    fn solid(r: f32) -> Arc<Texture> {
        Arc::new(Texture::solid_color(RgbaColor::new(r, 0.0, 0.0, 1.0)))
    }

    #[test]
    fn test_shared_resources_upload_once() {
        let mesh = Arc::new(cube_mesh(1.0, 1.0, 1.0, 1, 1));
        let texture = solid(1.0);
        let mut scene = SceneGraph::new();
        for _ in 0..3 {
            scene.add_node(Node::new(mesh.clone(), texture.clone()).unwrap());
        }

        let mut backend = RecordingBackend::new(2);
        let mut resources = GpuResources::new(16);
        let stats = resources.upload_new(&scene, &mut backend).unwrap();

        assert_eq!(stats, UploadStats { meshes: 1, textures: 1 });
        assert_eq!(resources.mesh_id(&mesh), Some(MeshId(0)));
        assert_eq!(resources.texture_slot(&texture), Some(0));
        assert_eq!(resources.index_count(&mesh), Some(36));
    }

    #[test]
    fn test_equal_but_distinct_textures_get_own_slots() {
        let mesh = Arc::new(sphere_mesh(0.5, 8, 8));
        let first = solid(0.5);
        let second = solid(0.5);
        let mut scene = SceneGraph::new();
        scene.add_node(Node::new(mesh.clone(), first.clone()).unwrap());
        scene.add_node(Node::new(mesh, second.clone()).unwrap());

        let mut backend = RecordingBackend::new(2);
        let mut resources = GpuResources::new(16);
        resources.upload_new(&scene, &mut backend).unwrap();

        assert_eq!(resources.texture_slot(&first), Some(0));
        assert_eq!(resources.texture_slot(&second), Some(1));
        assert_eq!(resources.texture_count(), 2);
    }

    #[test]
    fn test_second_pass_uploads_nothing() {
        let mut scene = SceneGraph::new();
        scene.add_node(Node::new(Arc::new(sphere_mesh(0.5, 8, 8)), solid(1.0)).unwrap());

        let mut backend = RecordingBackend::new(2);
        let mut resources = GpuResources::new(16);
        resources.upload_new(&scene, &mut backend).unwrap();
        let stats = resources.upload_new(&scene, &mut backend).unwrap();

        assert_eq!(stats, UploadStats::default());
        let uploads = backend
            .events()
            .iter()
            .filter(|e| matches!(e, BackendEvent::UploadMesh(_) | BackendEvent::UploadTexture(_)))
            .count();
        assert_eq!(uploads, 2);
    }

    #[test]
    fn test_texture_capacity_is_enforced() {
        let mesh = Arc::new(sphere_mesh(0.5, 8, 8));
        let mut scene = SceneGraph::new();
        scene.add_node(Node::new(mesh.clone(), solid(0.1)).unwrap());
        scene.add_node(Node::new(mesh, solid(0.2)).unwrap());

        let mut backend = RecordingBackend::new(2);
        let mut resources = GpuResources::new(1);
        let result = resources.upload_new(&scene, &mut backend);

        assert!(matches!(result, Err(ResourceError::TextureCapacityExceeded { capacity: 1 })));
    }
}
