//! `.collisionmesh`: geoms of sub-geoms of lods, each lod a triangle soup with an optional BSP.

mod consts;

use std::borrow::Cow;
use std::path::Path;

use glam::Vec3;

use crate::binaries::{BinaryReader, BinaryWriter};
use crate::bsp::{BspBuilder, BspBuilderConfig, BspTree};
use crate::error::{Error, Result};
use crate::geo::Bounds;
use crate::mesh::MAX_MESH_VERTICES;

use consts::*;
pub use consts::CollisionType;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CollisionFace {
    pub verts: [u16; 3],
    pub material: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CollisionVersion {
    pub major: u32,
    pub minor: u32,
}

impl Default for CollisionVersion {
    fn default() -> Self {
        Self { major: 0, minor: 9 }
    }
}

impl CollisionVersion {
    pub fn check(self) -> Result<Self> {
        if (MIN_MINOR_VERSION..=MAX_MINOR_VERSION).contains(&self.minor) {
            Ok(self)
        } else {
            Err(Error::UnsupportedVersion {
                major: self.major,
                minor: self.minor,
            })
        }
    }

    pub fn has_debug_mesh(self) -> bool {
        self.major == 0 && self.minor >= DEBUG_MESH_MINOR_VERSION
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncodeOptions {
    pub recompute_bounds: bool,
    /// Sort faces by material and build a fresh BSP for lod 0 of every sub-geom.
    /// Other lods are written without one.
    pub rebuild_bsp: bool,
    pub builder: BspBuilderConfig,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            recompute_bounds: true,
            rebuild_bsp: true,
            builder: BspBuilderConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionLod {
    pub col_type: CollisionType,
    pub faces: Vec<CollisionFace>,
    pub vertices: Vec<Vec3>,
    /// One material id per vertex.
    pub vertex_materials: Vec<u16>,
    pub bounds: Bounds,
    pub bsp: Option<BspTree>,
    /// Face indices, -1 when unset. Only stored by newer files.
    pub debug_mesh: Option<Vec<i32>>,
}

impl CollisionLod {
    pub fn build_bsp(&self, builder: &BspBuilder) -> Result<BspTree> {
        let faces: Vec<[u16; 3]> = self.faces.iter().map(|f| f.verts).collect();
        builder.build(&self.vertices, &faces)
    }

    fn decode(reader: &mut BinaryReader<'_>, version: CollisionVersion) -> Result<Self> {
        let col_type = CollisionType::from_raw(reader.read_u32()?)?;

        let face_count = reader.read_count()?;
        let faces: Vec<CollisionFace> = reader.read_n(face_count)?;

        let vertex_count = reader.read_count()?;
        let vertices: Vec<Vec3> = reader.read_n(vertex_count)?;
        let vertex_materials: Vec<u16> = reader.read_n(vertex_count)?;
        let bounds = reader.read()?;

        let bsp = match reader.read_u8()? {
            BSP_ABSENT => None,
            BSP_PRESENT => Some(BspTree::decode(reader, faces.len())?),
            flag => return Err(Error::InvalidBspFlag(flag)),
        };

        let debug_mesh = if version.has_debug_mesh() {
            let count = reader.read_count()?;
            Some(reader.read_n(count)?)
        } else {
            None
        };

        log::trace!(
            "{col_type:?} lod: {face_count} faces, {vertex_count} vertices, bsp {}",
            bsp.is_some()
        );

        Ok(Self {
            col_type,
            faces,
            vertices,
            vertex_materials,
            bounds,
            bsp,
            debug_mesh,
        })
    }

    fn validate(&self, options: &EncodeOptions) -> Result<()> {
        if self.vertex_materials.len() != self.vertices.len() {
            return Err(Error::VertexMaterialMismatch {
                vertices: self.vertices.len(),
                materials: self.vertex_materials.len(),
            });
        }
        if self.vertices.len() > MAX_MESH_VERTICES {
            return Err(Error::VertexLimitExceeded(self.vertices.len()));
        }
        for &index in self.faces.iter().flat_map(|f| f.verts.iter()) {
            if index as usize >= self.vertices.len() {
                return Err(Error::FaceIndexOutOfRange {
                    index: index as usize,
                    count: self.vertices.len(),
                });
            }
        }
        if let (false, Some(bsp)) = (options.rebuild_bsp, &self.bsp) {
            for &face in bsp.leaves().flatten() {
                if face as usize >= self.faces.len() {
                    return Err(Error::FaceIndexOutOfRange {
                        index: face as usize,
                        count: self.faces.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn encode(
        &self,
        writer: &mut BinaryWriter,
        version: CollisionVersion,
        options: &EncodeOptions,
        builder: &BspBuilder,
        first_lod: bool,
    ) -> Result<()> {
        writer.write_u32(self.col_type as u32);

        let mut debug: Cow<'_, [i32]> = Cow::Borrowed(self.debug_mesh.as_deref().unwrap_or_default());
        let faces: Cow<'_, [CollisionFace]> = if options.rebuild_bsp {
            let mut order: Vec<usize> = (0..self.faces.len()).collect();
            order.sort_by_key(|&i| self.faces[i].material);
            let mut new_position = vec![0; order.len()];
            for (new, &old) in order.iter().enumerate() {
                new_position[old] = new;
            }
            // debug entries name faces, follow them to their sorted slot
            debug = debug
                .iter()
                .map(|&face| {
                    usize::try_from(face)
                        .ok()
                        .and_then(|f| new_position.get(f))
                        .and_then(|&n| i32::try_from(n).ok())
                        .unwrap_or(face)
                })
                .collect();
            Cow::Owned(order.iter().map(|&i| self.faces[i]).collect())
        } else {
            Cow::Borrowed(&self.faces)
        };
        writer.write_count(faces.len())?;
        writer.write_n(&faces);

        writer.write_count(self.vertices.len())?;
        writer.write_n(&self.vertices);
        writer.write_n(&self.vertex_materials);

        if options.recompute_bounds {
            writer.write(&Bounds::from_points(self.vertices.iter().copied()));
        } else {
            writer.write(&self.bounds);
        }

        let bsp = match (options.rebuild_bsp, first_lod) {
            (true, true) => {
                let verts: Vec<[u16; 3]> = faces.iter().map(|f| f.verts).collect();
                Some(Cow::Owned(builder.build(&self.vertices, &verts)?))
            }
            (true, false) => None,
            (false, _) => self.bsp.as_ref().map(Cow::Borrowed),
        };
        match bsp {
            Some(bsp) => {
                writer.write_u8(BSP_PRESENT);
                bsp.encode(writer)?;
            }
            None => writer.write_u8(BSP_ABSENT),
        }

        if version.has_debug_mesh() {
            writer.write_count(debug.len())?;
            writer.write_n(&debug);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionSubGeom {
    pub lods: Vec<CollisionLod>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionGeom {
    pub sub_geoms: Vec<CollisionSubGeom>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionMesh {
    pub version: CollisionVersion,
    pub geoms: Vec<CollisionGeom>,
}

impl CollisionMesh {
    pub const EXTENSION: &'static str = ".collisionmesh";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn sub_geoms(&self) -> impl Iterator<Item = &CollisionSubGeom> {
        self.geoms.iter().flat_map(|g| g.sub_geoms.iter())
    }

    pub fn lods(&self) -> impl Iterator<Item = &CollisionLod> {
        self.sub_geoms().flat_map(|s| s.lods.iter())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::decode(&std::fs::read(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>, options: &EncodeOptions) -> Result<()> {
        std::fs::write(path, self.encode_with(options)?)?;
        Ok(())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let version = CollisionVersion {
            major: reader.read_u32()?,
            minor: reader.read_u32()?,
        }
        .check()?;
        log::debug!(
            "collisionmesh version {}.{}, {} bytes",
            version.major,
            version.minor,
            reader.len()
        );

        let geom_count = reader.read_count()?;
        let mut geoms = Vec::with_capacity(reader.capacity_hint(geom_count, 4));
        for _ in 0..geom_count {
            let sub_count = reader.read_count()?;
            let mut sub_geoms = Vec::with_capacity(reader.capacity_hint(sub_count, 4));
            for _ in 0..sub_count {
                let lod_count = reader.read_count()?;
                log::debug!("{lod_count} lods at {}", reader.position());
                let mut lods = Vec::with_capacity(reader.capacity_hint(lod_count, 37));
                for _ in 0..lod_count {
                    lods.push(CollisionLod::decode(&mut reader, version)?);
                }
                sub_geoms.push(CollisionSubGeom { lods });
            }
            geoms.push(CollisionGeom { sub_geoms });
        }

        reader.finish()?;
        Ok(Self { version, geoms })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&EncodeOptions::default())
    }

    pub fn encode_with(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let version = self.version.check()?;
        for lod in self.lods() {
            lod.validate(options)?;
        }

        let builder = BspBuilder::new(options.builder);
        let mut writer = BinaryWriter::new();
        writer.write_u32(version.major);
        writer.write_u32(version.minor);
        writer.write_count(self.geoms.len())?;
        for geom in &self.geoms {
            writer.write_count(geom.sub_geoms.len())?;
            for sub_geom in &geom.sub_geoms {
                writer.write_count(sub_geom.lods.len())?;
                log::debug!("{} lods at {}", sub_geom.lods.len(), writer.position());
                for (i, lod) in sub_geom.lods.iter().enumerate() {
                    lod.encode(&mut writer, version, options, &builder, i == 0)?;
                }
            }
        }
        Ok(writer.into_inner())
    }
}
