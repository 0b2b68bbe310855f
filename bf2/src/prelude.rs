pub use crate::bsp::{
    Axis, BspBuilder, BspBuilderConfig, BspChild, BspNode, BspTree, SplitPlane,
};
pub use crate::collision::{
    CollisionFace, CollisionGeom, CollisionLod, CollisionMesh, CollisionSubGeom, CollisionType,
    CollisionVersion,
};
pub use crate::error::{Error, Result};
pub use crate::geo::Bounds;
pub use crate::mesh::{
    AnyVisibleMesh, AttributeValue, BundledMesh, Geom, Lod, Material, SkinnedMesh, StaticMesh,
    Vertex, VertexAttribute, VertexUsage, VisibleMesh, VisibleMeshKind,
};
