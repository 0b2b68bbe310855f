//! Visible meshes: `.staticmesh`, `.bundledmesh` and `.skinnedmesh`.
//!
//! All three kinds share one layout: a header, the geom/lod table, a vertex declaration,
//! one vertex buffer and one 16 bit index buffer for the whole file, then per-lod and
//! per-material blocks addressing ranges of those buffers. The differences are isolated
//! in [`MeshKind`].

mod any;
mod consts;
pub mod declaration;
mod header;
pub mod kinds;
mod vertex;

use std::path::Path;

use glam::Vec3;
use num_traits::FromPrimitive;

use crate::binaries::{BinaryReader, BinaryWriter};
use crate::error::{Error, Result};
use crate::geo::Bounds;

pub use any::{AnyVisibleMesh, VisibleMeshKind};
pub use consts::{AlphaMode, DeclType, PrimitiveType, VertexUsage, MAX_MESH_VERTICES, MAX_UV_CHANNELS};
pub use declaration::VertexAttribute;
pub use header::MeshHeader;
pub use kinds::{
    Bone, Bundled, BundledLod, MeshKind, Rig, Skinned, SkinnedLod, Static, StaticLod,
    StaticMaterial,
};
pub use vertex::{AttributeValue, Vertex};

pub type StaticMesh = VisibleMesh<Static>;
pub type BundledMesh = VisibleMesh<Bundled>;
pub type SkinnedMesh = VisibleMesh<Skinned>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodeOptions {
    /// Recompute lod (and per-material, where stored) bounds from vertex positions.
    pub recompute_bounds: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material<K: MeshKind> {
    pub fx_file: String,
    pub technique: String,
    pub maps: Vec<String>,
    pub vertices: Vec<Vertex>,
    /// Triangles indexing `vertices`.
    pub faces: Vec<[u16; 3]>,
    pub reserved: [u32; 2],
    pub extra: K::MaterialExtra,
}

impl<K: MeshKind> Material<K> {
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().filter_map(Vertex::position)
    }

    fn decode(
        reader: &mut BinaryReader<'_>,
        version: u32,
        buffers: &Buffers<'_>,
    ) -> Result<Self> {
        let mut extra = K::read_material_head(reader, version)?;
        let fx_file = reader.read_string()?;
        let technique = reader.read_string()?;

        let map_count = reader.read_count()?;
        let mut maps = Vec::with_capacity(reader.capacity_hint(map_count, 4));
        for _ in 0..map_count {
            maps.push(reader.read_string()?);
        }

        let vstart = reader.read_count()?;
        let istart = reader.read_count()?;
        let inum = reader.read_count()?;
        let vnum = reader.read_count()?;
        let reserved = [reader.read_u32()?, reader.read_u32()?];
        K::read_material_tail(reader, version, &mut extra)?;

        log::trace!("material {fx_file} ({technique}): {vnum} vertices at {vstart}, {inum} indices at {istart}");

        Ok(Self {
            vertices: buffers.vertices(vstart, vnum)?,
            faces: buffers.faces(istart, inum, vstart, vnum)?,
            fx_file,
            technique,
            maps,
            reserved,
            extra,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lod<K: MeshKind> {
    pub bounds: Bounds,
    /// Only stored up to version 6.
    pub pivot: Option<Vec3>,
    pub extra: K::LodExtra,
    pub materials: Vec<Material<K>>,
}

impl<K: MeshKind> Lod<K> {
    /// Everything but the materials, which follow the whole lod table.
    fn decode_head(reader: &mut BinaryReader<'_>, header: &MeshHeader) -> Result<Self> {
        let bounds = reader.read()?;
        let pivot = if header.has_pivot() {
            Some(reader.read_vec3()?)
        } else {
            None
        };
        Ok(Self {
            bounds,
            pivot,
            extra: K::read_lod_extra(reader, header.version)?,
            materials: Vec::new(),
        })
    }

    fn encode_head(&self, writer: &mut BinaryWriter, header: &MeshHeader) -> Result<()> {
        writer.write(&self.bounds);
        if header.has_pivot() {
            writer.write_vec3(self.pivot.unwrap_or_default());
        }
        K::write_lod_extra(&self.extra, writer, header.version)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geom<K: MeshKind> {
    /// Lod 0 is the most detailed.
    pub lods: Vec<Lod<K>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibleMesh<K: MeshKind> {
    pub header: MeshHeader,
    pub attributes: Vec<VertexAttribute>,
    /// Preserved verbatim, not stored by skinned meshes.
    pub alpha_blend_index_count: u32,
    pub geoms: Vec<Geom<K>>,
}

impl<K: MeshKind> Default for VisibleMesh<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared buffers materials slice their vertices and faces from.
struct Buffers<'a> {
    attributes: &'a [VertexAttribute],
    stride: usize,
    vertex_count: usize,
    blob: &'a [u8],
    indices: &'a [u16],
}

fn check_range(what: &'static str, start: usize, count: usize, len: usize) -> Result<()> {
    match start.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::RangeOutOfBounds {
            what,
            start,
            count,
            len,
        }),
    }
}

impl Buffers<'_> {
    fn vertices(&self, start: usize, count: usize) -> Result<Vec<Vertex>> {
        check_range("vertex", start, count, self.vertex_count)?;
        Ok((start..start + count)
            .map(|i| {
                let at = i * self.stride;
                Vertex::unpack(self.attributes, &self.blob[at..at + self.stride])
            })
            .collect())
    }

    /// Rebases to material-local indices and flips the winding.
    fn faces(&self, start: usize, count: usize, vstart: usize, vnum: usize) -> Result<Vec<[u16; 3]>> {
        if count % 3 != 0 {
            return Err(Error::InvalidIndexCount(count));
        }
        check_range("index", start, count, self.indices.len())?;

        let local = |index: u16| {
            let index = index as usize;
            if index < vstart || index >= vstart + vnum {
                return Err(Error::FaceIndexOutOfRange { index, count: vnum });
            }
            Ok((index - vstart) as u16)
        };
        self.indices[start..start + count]
            .chunks_exact(3)
            .map(|tri| Ok([local(tri[2])?, local(tri[1])?, local(tri[0])?]))
            .collect()
    }
}

impl<K: MeshKind> VisibleMesh<K> {
    /// An empty mesh at the kind's current version.
    pub fn new() -> Self {
        Self {
            header: MeshHeader::new(K::DEFAULT_VERSION),
            attributes: Vec::new(),
            alpha_blend_index_count: 0,
            geoms: Vec::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn lods(&self) -> impl Iterator<Item = &Lod<K>> {
        self.geoms.iter().flat_map(|g| g.lods.iter())
    }

    /// Materials in file order: geom, then lod, then material.
    pub fn materials(&self) -> impl Iterator<Item = &Material<K>> {
        self.lods().flat_map(|l| l.materials.iter())
    }

    pub fn vertex_count(&self) -> usize {
        self.materials().map(|m| m.vertices.len()).sum()
    }

    pub fn face_count(&self) -> usize {
        self.materials().map(|m| m.faces.len()).sum()
    }

    pub fn has_usage(&self, usage: VertexUsage) -> bool {
        declaration::resolve_usage(&self.attributes, usage).is_some()
    }

    pub fn has_normal(&self) -> bool {
        self.has_usage(VertexUsage::Normal)
    }

    pub fn has_tangent(&self) -> bool {
        self.has_usage(VertexUsage::Tangent)
    }

    pub fn has_blend_weight(&self) -> bool {
        self.has_usage(VertexUsage::BlendWeight)
    }

    pub fn has_blend_indices(&self) -> bool {
        self.has_usage(VertexUsage::BlendIndices)
    }

    pub fn has_uv(&self, channel: usize) -> bool {
        VertexUsage::uv(channel).is_some_and(|uv| self.has_usage(uv))
    }

    pub fn recompute_bounds(&mut self) {
        let version = self.header.version;
        for lod in self.geoms.iter_mut().flat_map(|g| g.lods.iter_mut()) {
            for material in &mut lod.materials {
                let bounds = Bounds::from_points(material.positions());
                K::set_material_bounds(&mut material.extra, version, bounds);
            }
            lod.bounds = Bounds::from_points(lod.materials.iter().flat_map(|m| m.positions()));
        }
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
        let header: MeshHeader = reader.read()?;
        let version = header.version;
        log::debug!("{} version {version}, {} bytes", K::NAME, reader.len());

        let geom_count = reader.read_count()?;
        let mut lod_counts = Vec::with_capacity(reader.capacity_hint(geom_count, 4));
        for _ in 0..geom_count {
            lod_counts.push(reader.read_count()?);
        }

        log::debug!("vertex declaration at {}", reader.position());
        let attributes = declaration::decode(&mut reader)?;

        let primitive = reader.read_u32()?;
        if PrimitiveType::from_u32(primitive) != Some(PrimitiveType::TriangleList) {
            return Err(Error::UnsupportedPrimitiveType(primitive));
        }

        let stride = reader.read_count()?;
        for attr in attributes.iter().filter(|a| a.used) {
            if attr.offset as usize + attr.decl_type.size() > stride {
                return Err(Error::AttributeOutOfStride {
                    usage: attr.usage,
                    offset: attr.offset as usize,
                    stride,
                });
            }
        }
        let vertex_count = reader.read_count()?;
        log::debug!(
            "{vertex_count} vertices, stride {stride}, at {}",
            reader.position()
        );
        let blob = reader.read_blocks(vertex_count, stride)?;

        let index_count = reader.read_count()?;
        log::debug!("{index_count} indices at {}", reader.position());
        let indices: Vec<u16> = reader.read_n(index_count)?;

        let alpha_blend_index_count = if K::HAS_ALPHA_BLEND_INDICES {
            reader.read_u32()?
        } else {
            0
        };

        log::debug!("lod table at {}", reader.position());
        let mut geoms = Vec::with_capacity(lod_counts.len());
        for &lod_count in &lod_counts {
            let mut lods = Vec::with_capacity(reader.capacity_hint(lod_count, 24));
            for _ in 0..lod_count {
                lods.push(Lod::decode_head(&mut reader, &header)?);
            }
            geoms.push(Geom { lods });
        }

        log::debug!("materials at {}", reader.position());
        let buffers = Buffers {
            attributes: &attributes,
            stride,
            vertex_count,
            blob,
            indices: &indices,
        };
        for lod in geoms.iter_mut().flat_map(|g: &mut Geom<K>| g.lods.iter_mut()) {
            let count = reader.read_count()?;
            lod.materials.reserve(reader.capacity_hint(count, 32));
            for _ in 0..count {
                lod.materials
                    .push(Material::decode(&mut reader, version, &buffers)?);
            }
        }

        reader.finish()?;

        Ok(Self {
            header,
            attributes,
            alpha_blend_index_count,
            geoms,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&EncodeOptions::default())
    }

    pub fn encode_with(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        if options.recompute_bounds {
            let mut mesh = self.clone();
            mesh.recompute_bounds();
            return mesh.write();
        }
        self.write()
    }

    /// Everything `write` could fail on, checked up front.
    fn validate(&self) -> Result<()> {
        for &usage in K::REQUIRED_USAGES {
            if !self.has_usage(usage) {
                return Err(Error::MissingRequiredUsage(usage));
            }
        }

        let total = self.vertex_count();
        if total > MAX_MESH_VERTICES {
            return Err(Error::VertexLimitExceeded(total));
        }

        let mut vertex_index = 0;
        for material in self.materials() {
            let strings = [&material.fx_file, &material.technique];
            if !strings.into_iter().chain(&material.maps).all(|s| s.is_ascii()) {
                return Err(Error::InvalidString);
            }
            for vertex in &material.vertices {
                vertex.validate(vertex_index, &self.attributes)?;
                vertex_index += 1;
            }
            let count = material.vertices.len();
            for &index in material.faces.iter().flatten() {
                if index as usize >= count {
                    return Err(Error::FaceIndexOutOfRange {
                        index: index as usize,
                        count,
                    });
                }
            }
        }
        Ok(())
    }

    fn write(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let version = self.header.version;
        let mut writer = BinaryWriter::new();

        writer.write(&self.header);
        writer.write_count(self.geoms.len())?;
        for geom in &self.geoms {
            writer.write_count(geom.lods.len())?;
        }

        log::debug!("vertex declaration at {}", writer.position());
        let (attributes, stride) = declaration::encode(&self.attributes, &mut writer)?;
        writer.write_u32(PrimitiveType::TriangleList as u32);
        writer.write_count(stride)?;

        let vertex_count = self.vertex_count();
        writer.write_count(vertex_count)?;
        log::debug!(
            "{vertex_count} vertices, stride {stride}, at {}",
            writer.position()
        );
        let mut blob = Vec::with_capacity(vertex_count * stride);
        for (i, vertex) in self.materials().flat_map(|m| m.vertices.iter()).enumerate() {
            vertex.pack(i, &attributes, &mut blob)?;
        }
        writer.write_raw(&blob);

        writer.write_count(self.face_count() * 3)?;
        log::debug!("indices at {}", writer.position());
        let mut vstart = 0;
        for material in self.materials() {
            for &[a, b, c] in &material.faces {
                for index in [c, b, a] {
                    let global = vstart + index as usize;
                    let global =
                        u16::try_from(global).map_err(|_| Error::VertexLimitExceeded(global))?;
                    writer.write_u16(global);
                }
            }
            vstart += material.vertices.len();
        }

        if K::HAS_ALPHA_BLEND_INDICES {
            writer.write_u32(self.alpha_blend_index_count);
        }

        log::debug!("lod table at {}", writer.position());
        for lod in self.lods() {
            lod.encode_head(&mut writer, &self.header)?;
        }

        log::debug!("materials at {}", writer.position());
        let (mut vstart, mut istart) = (0, 0);
        for lod in self.lods() {
            writer.write_count(lod.materials.len())?;
            for material in &lod.materials {
                let vnum = material.vertices.len();
                let inum = material.faces.len() * 3;

                K::write_material_head(&material.extra, &mut writer, version);
                writer.write_string(&material.fx_file)?;
                writer.write_string(&material.technique)?;
                writer.write_count(material.maps.len())?;
                for map in &material.maps {
                    writer.write_string(map)?;
                }
                writer.write_count(vstart)?;
                writer.write_count(istart)?;
                writer.write_count(inum)?;
                writer.write_count(vnum)?;
                writer.write_u32(material.reserved[0]);
                writer.write_u32(material.reserved[1]);
                K::write_material_tail(material, &mut writer, version);

                vstart += vnum;
                istart += inum;
            }
        }

        Ok(writer.into_inner())
    }
}
