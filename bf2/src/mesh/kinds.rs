//! What differs between `.staticmesh`, `.bundledmesh` and `.skinnedmesh`.

use std::fmt::Debug;

use glam::Mat4;

use crate::binaries::{BinaryReader, BinaryWriter};
use crate::error::Result;
use crate::geo::Bounds;

use super::consts::{AlphaMode, VertexUsage};
use super::Material;

/// Per-kind hooks plugged into the shared mesh hierarchy codec.
pub trait MeshKind: Clone + Debug + Default + PartialEq {
    const NAME: &'static str;
    const EXTENSION: &'static str;
    /// Version written by fresh meshes of this kind.
    const DEFAULT_VERSION: u32;
    /// Non-skinned meshes store an alpha mode per material and the alpha blend index count.
    const HAS_ALPHA_BLEND_INDICES: bool;
    /// Usages the declaration must contain before a mesh can be written.
    const REQUIRED_USAGES: &'static [VertexUsage];

    type LodExtra: Clone + Debug + Default + PartialEq;
    type MaterialExtra: Clone + Debug + Default + PartialEq;

    /// Block following the lod bounds (and pivot) in the lod table.
    fn read_lod_extra(reader: &mut BinaryReader<'_>, version: u32) -> Result<Self::LodExtra>;
    fn write_lod_extra(extra: &Self::LodExtra, writer: &mut BinaryWriter, version: u32)
        -> Result<()>;

    /// Fields before the shader name.
    fn read_material_head(
        _reader: &mut BinaryReader<'_>,
        _version: u32,
    ) -> Result<Self::MaterialExtra> {
        Ok(Default::default())
    }
    fn write_material_head(_extra: &Self::MaterialExtra, _writer: &mut BinaryWriter, _version: u32) {}

    /// Fields after the reserved words.
    fn read_material_tail(
        _reader: &mut BinaryReader<'_>,
        _version: u32,
        _extra: &mut Self::MaterialExtra,
    ) -> Result<()> {
        Ok(())
    }
    fn write_material_tail(_material: &Material<Self>, _writer: &mut BinaryWriter, _version: u32) {}

    fn set_material_bounds(_extra: &mut Self::MaterialExtra, _version: u32, _bounds: Bounds) {}
}

const STATIC_MATERIAL_BOUNDS_VERSION: u32 = 11;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Static;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticLod {
    /// Geometry part transforms.
    pub parts: Vec<Mat4>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StaticMaterial {
    pub alpha_mode: AlphaMode,
    /// Only stored by version 11 files.
    pub bounds: Option<Bounds>,
}

impl MeshKind for Static {
    const NAME: &'static str = "staticmesh";
    const EXTENSION: &'static str = ".staticmesh";
    const DEFAULT_VERSION: u32 = 11;
    const HAS_ALPHA_BLEND_INDICES: bool = true;
    const REQUIRED_USAGES: &'static [VertexUsage] = &[VertexUsage::Position];

    type LodExtra = StaticLod;
    type MaterialExtra = StaticMaterial;

    fn read_lod_extra(reader: &mut BinaryReader<'_>, _version: u32) -> Result<StaticLod> {
        let count = reader.read_count()?;
        Ok(StaticLod {
            parts: reader.read_n(count)?,
        })
    }

    fn write_lod_extra(extra: &StaticLod, writer: &mut BinaryWriter, _version: u32) -> Result<()> {
        writer.write_count(extra.parts.len())?;
        writer.write_n(&extra.parts);
        Ok(())
    }

    fn read_material_head(reader: &mut BinaryReader<'_>, _version: u32) -> Result<StaticMaterial> {
        Ok(StaticMaterial {
            alpha_mode: AlphaMode::from_raw(reader.read_u32()?)?,
            bounds: None,
        })
    }

    fn write_material_head(extra: &StaticMaterial, writer: &mut BinaryWriter, _version: u32) {
        writer.write_u32(extra.alpha_mode as u32);
    }

    fn read_material_tail(
        reader: &mut BinaryReader<'_>,
        version: u32,
        extra: &mut StaticMaterial,
    ) -> Result<()> {
        if version == STATIC_MATERIAL_BOUNDS_VERSION {
            extra.bounds = Some(reader.read()?);
        }
        Ok(())
    }

    fn write_material_tail(material: &Material<Self>, writer: &mut BinaryWriter, version: u32) {
        if version == STATIC_MATERIAL_BOUNDS_VERSION {
            let bounds = material
                .extra
                .bounds
                .unwrap_or_else(|| Bounds::from_points(material.positions()));
            writer.write(&bounds);
        }
    }

    fn set_material_bounds(extra: &mut StaticMaterial, version: u32, bounds: Bounds) {
        if version == STATIC_MATERIAL_BOUNDS_VERSION {
            extra.bounds = Some(bounds);
        }
    }
}

/// Bundled meshes: vehicles and weapons built from animated parts.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bundled;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BundledLod {
    pub part_count: u32,
}

impl MeshKind for Bundled {
    const NAME: &'static str = "bundledmesh";
    const EXTENSION: &'static str = ".bundledmesh";
    const DEFAULT_VERSION: u32 = 10;
    const HAS_ALPHA_BLEND_INDICES: bool = true;
    const REQUIRED_USAGES: &'static [VertexUsage] = &[VertexUsage::Position];

    type LodExtra = BundledLod;
    type MaterialExtra = AlphaMode;

    fn read_lod_extra(reader: &mut BinaryReader<'_>, _version: u32) -> Result<BundledLod> {
        Ok(BundledLod {
            part_count: reader.read_u32()?,
        })
    }

    fn write_lod_extra(extra: &BundledLod, writer: &mut BinaryWriter, _version: u32) -> Result<()> {
        writer.write_u32(extra.part_count);
        Ok(())
    }

    fn read_material_head(reader: &mut BinaryReader<'_>, _version: u32) -> Result<AlphaMode> {
        AlphaMode::from_raw(reader.read_u32()?)
    }

    fn write_material_head(extra: &AlphaMode, writer: &mut BinaryWriter, _version: u32) {
        writer.write_u32(*extra as u32);
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bone {
    /// Skeleton bone id.
    pub id: u32,
    /// Rest transform.
    pub matrix: Mat4,
}

/// Bones influencing one material of a skinned lod.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rig {
    pub bones: Vec<Bone>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Skinned;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinnedLod {
    pub rigs: Vec<Rig>,
}

impl MeshKind for Skinned {
    const NAME: &'static str = "skinnedmesh";
    const EXTENSION: &'static str = ".skinnedmesh";
    const DEFAULT_VERSION: u32 = 11;
    const HAS_ALPHA_BLEND_INDICES: bool = false;
    const REQUIRED_USAGES: &'static [VertexUsage] = &[
        VertexUsage::Position,
        VertexUsage::BlendWeight,
        VertexUsage::BlendIndices,
    ];

    type LodExtra = SkinnedLod;
    type MaterialExtra = ();

    fn read_lod_extra(reader: &mut BinaryReader<'_>, _version: u32) -> Result<SkinnedLod> {
        let rig_count = reader.read_count()?;
        let mut rigs = Vec::with_capacity(reader.capacity_hint(rig_count, 4));
        for _ in 0..rig_count {
            let bone_count = reader.read_count()?;
            let mut bones = Vec::with_capacity(reader.capacity_hint(bone_count, 68));
            for _ in 0..bone_count {
                bones.push(Bone {
                    id: reader.read_u32()?,
                    matrix: reader.read_mat4()?,
                });
            }
            rigs.push(Rig { bones });
        }
        Ok(SkinnedLod { rigs })
    }

    fn write_lod_extra(extra: &SkinnedLod, writer: &mut BinaryWriter, _version: u32) -> Result<()> {
        writer.write_count(extra.rigs.len())?;
        for rig in &extra.rigs {
            writer.write_count(rig.bones.len())?;
            for bone in &rig.bones {
                writer.write_u32(bone.id);
                writer.write_mat4(&bone.matrix);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;
    use crate::mesh::{AttributeValue, Vertex};

    #[test]
    fn skinned_rigs_round_trip() {
        let lod = SkinnedLod {
            rigs: vec![
                Rig {
                    bones: vec![
                        Bone {
                            id: 7,
                            matrix: Mat4::from_translation(vec3(1.0, 2.0, 3.0)),
                        },
                        Bone {
                            id: 12,
                            matrix: Mat4::IDENTITY,
                        },
                    ],
                },
                Rig::default(),
            ],
        };
        let mut w = BinaryWriter::new();
        Skinned::write_lod_extra(&lod, &mut w, 11).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 4 + 4 + 2 * (4 + 64) + 4);

        let mut r = BinaryReader::new(&bytes);
        assert_eq!(Skinned::read_lod_extra(&mut r, 11).unwrap(), lod);
        r.finish().unwrap();
    }

    #[test]
    fn static_material_bounds_only_in_version_11() {
        let extra = StaticMaterial {
            alpha_mode: AlphaMode::AlphaTest,
            bounds: Some(Bounds::new(vec3(-1.0, -1.0, -1.0), vec3(1.0, 1.0, 1.0))),
        };
        let material = Material::<Static> {
            extra,
            ..Default::default()
        };
        for (version, tail_len) in [(11, 24), (10, 0)] {
            let mut w = BinaryWriter::new();
            Static::write_material_tail(&material, &mut w, version);
            assert_eq!(w.position(), tail_len);
        }
    }

    #[test]
    fn missing_static_material_bounds_come_from_positions() {
        let at = |x: f32, z: f32| {
            Vertex::new().with(VertexUsage::Position, AttributeValue::Float3([x, 0.5, z]))
        };
        let material = Material::<Static> {
            vertices: vec![at(-2.0, 1.0), at(3.0, -1.0)],
            ..Default::default()
        };
        let mut w = BinaryWriter::new();
        Static::write_material_tail(&material, &mut w, 11);
        let bytes = w.into_inner();

        let mut r = BinaryReader::new(&bytes);
        let bounds: Bounds = r.read().unwrap();
        assert_eq!(bounds, Bounds::new(vec3(-2.0, 0.5, -1.0), vec3(3.0, 0.5, 1.0)));
    }

    #[test]
    fn unknown_alpha_mode_is_rejected() {
        let bytes = 9u32.to_le_bytes();
        assert!(Bundled::read_material_head(&mut BinaryReader::new(&bytes), 10).is_err());
    }
}
