use std::path::Path;

use crate::error::{Error, Result};

use super::{
    Bundled, BundledMesh, EncodeOptions, MeshKind, Skinned, SkinnedMesh, Static, StaticMesh,
    VertexAttribute,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VisibleMeshKind {
    Static,
    Bundled,
    Skinned,
}

impl VisibleMeshKind {
    /// Accepts the extension with or without its leading dot, in any case.
    pub fn from_extension(ext: &str) -> Result<Self> {
        let normalized = ext.trim_start_matches('.').to_ascii_lowercase();
        [Self::Static, Self::Bundled, Self::Skinned]
            .into_iter()
            .find(|kind| kind.extension()[1..] == normalized)
            .ok_or_else(|| Error::UnknownExtension(ext.to_owned()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(ext)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Static => Static::EXTENSION,
            Self::Bundled => Bundled::EXTENSION,
            Self::Skinned => Skinned::EXTENSION,
        }
    }
}

/// A visible mesh of a kind only known at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyVisibleMesh {
    Static(StaticMesh),
    Bundled(BundledMesh),
    Skinned(SkinnedMesh),
}

/// Runs `$body` with `$mesh` bound to the inner mesh, whatever its kind.
macro_rules! with_mesh {
    ($any:expr, $mesh:ident => $body:expr) => {
        match $any {
            AnyVisibleMesh::Static($mesh) => $body,
            AnyVisibleMesh::Bundled($mesh) => $body,
            AnyVisibleMesh::Skinned($mesh) => $body,
        }
    };
}

impl AnyVisibleMesh {
    pub fn decode(kind: VisibleMeshKind, bytes: &[u8]) -> Result<Self> {
        Ok(match kind {
            VisibleMeshKind::Static => Self::Static(StaticMesh::decode(bytes)?),
            VisibleMeshKind::Bundled => Self::Bundled(BundledMesh::decode(bytes)?),
            VisibleMeshKind::Skinned => Self::Skinned(SkinnedMesh::decode(bytes)?),
        })
    }

    /// Decodes a file, picking the kind from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let kind = VisibleMeshKind::from_path(path)?;
        Self::decode(kind, &std::fs::read(path)?)
    }

    pub fn encode_with(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        with_mesh!(self, mesh => mesh.encode_with(options))
    }

    pub fn save(&self, path: impl AsRef<Path>, options: &EncodeOptions) -> Result<()> {
        with_mesh!(self, mesh => mesh.save(path, options))
    }

    pub fn kind(&self) -> VisibleMeshKind {
        match self {
            Self::Static(_) => VisibleMeshKind::Static,
            Self::Bundled(_) => VisibleMeshKind::Bundled,
            Self::Skinned(_) => VisibleMeshKind::Skinned,
        }
    }

    pub fn version(&self) -> u32 {
        with_mesh!(self, mesh => mesh.version())
    }

    pub fn geom_count(&self) -> usize {
        with_mesh!(self, mesh => mesh.geoms.len())
    }

    /// Lod count of every geom.
    pub fn lod_counts(&self) -> Vec<usize> {
        with_mesh!(self, mesh => mesh.geoms.iter().map(|g| g.lods.len()).collect())
    }

    pub fn material_count(&self) -> usize {
        with_mesh!(self, mesh => mesh.materials().count())
    }

    pub fn vertex_count(&self) -> usize {
        with_mesh!(self, mesh => mesh.vertex_count())
    }

    pub fn face_count(&self) -> usize {
        with_mesh!(self, mesh => mesh.face_count())
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        with_mesh!(self, mesh => &mesh.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{DeclType, VertexUsage};

    #[test]
    fn extensions() {
        assert_eq!(
            VisibleMeshKind::from_extension(".staticmesh").unwrap(),
            VisibleMeshKind::Static
        );
        assert_eq!(
            VisibleMeshKind::from_extension("BundledMesh").unwrap(),
            VisibleMeshKind::Bundled
        );
        assert_eq!(
            VisibleMeshKind::from_path(Path::new("objects/soldier.skinnedmesh")).unwrap(),
            VisibleMeshKind::Skinned
        );
        assert!(matches!(
            VisibleMeshKind::from_extension(".collisionmesh"),
            Err(Error::UnknownExtension(_))
        ));
    }

    #[test]
    fn decode_by_kind() {
        let mut mesh = StaticMesh::new();
        mesh.attributes = vec![VertexAttribute::new(VertexUsage::Position, DeclType::Float3)];
        let bytes = mesh.encode().unwrap();

        let any = AnyVisibleMesh::decode(VisibleMeshKind::Static, &bytes).unwrap();
        assert_eq!(any.kind(), VisibleMeshKind::Static);
        assert_eq!(any.version(), 11);
        assert_eq!(any.geom_count(), 0);
        assert_eq!(any, AnyVisibleMesh::Static(StaticMesh::decode(&bytes).unwrap()));

        // skinned meshes have no alpha blend index count
        assert!(matches!(
            AnyVisibleMesh::decode(VisibleMeshKind::Skinned, &bytes),
            Err(Error::TrailingBytes { .. })
        ));
    }
}
