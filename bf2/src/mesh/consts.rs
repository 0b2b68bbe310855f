use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{Error, Result};

// Vertex declaration flags.
pub const USED: u16 = 0;
pub const UNUSED: u16 = 255;

// 16 bit index buffer
pub const MAX_MESH_VERTICES: usize = 65536;

pub const MAX_UV_CHANNELS: usize = 5;

/// D3D9 `_D3DDECLTYPE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum DeclType {
    Float1 = 0,    // 1D float expanded to (value, 0., 0., 1.)
    Float2 = 1,    // 2D float expanded to (value, value, 0., 1.)
    Float3 = 2,    // 3D float expanded to (value, value, value, 1.)
    Float4 = 3,    // 4D float
    D3DColor = 4,  // 4D packed unsigned bytes mapped to 0. to 1. range
    UByte4 = 5,
    Short2 = 6,
    Short4 = 7,
    UByte4N = 8,
    Short2N = 9,
    Short4N = 10,
    UShort2N = 11,
    UShort4N = 12,
    UDec3 = 13,
    Dec3N = 14,
    Float16_2 = 15,
    Float16_4 = 16,
    Unused = 17, // When the type field in a decl is unused.
}

impl DeclType {
    pub fn from_raw(value: u16) -> Result<Self> {
        Self::from_u16(value).ok_or(Error::InvalidEnum {
            kind: "vertex declaration type",
            value: value.into(),
        })
    }

    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Byte width of one value of this type inside a vertex.
    pub fn size(self) -> usize {
        match self {
            DeclType::Float1 => 4,
            DeclType::Float2 => 8,
            DeclType::Float3 => 12,
            DeclType::Float4 => 16,
            DeclType::D3DColor
            | DeclType::UByte4
            | DeclType::Short2
            | DeclType::UByte4N
            | DeclType::Short2N
            | DeclType::UShort2N
            | DeclType::UDec3
            | DeclType::Dec3N
            | DeclType::Float16_2 => 4,
            DeclType::Short4 | DeclType::Short4N | DeclType::UShort4N | DeclType::Float16_4 => 8,
            DeclType::Unused => 0,
        }
    }
}

/// D3D9 `_D3DDECLUSAGE`, restricted to what BF2 meshes carry.
///
/// Extra UV channels are not separate D3D usages: BF2 stores them as `channel << 8 | TEXCOORD`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexUsage {
    Position,
    BlendWeight,
    BlendIndices,
    Normal,
    Tangent,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    TexCoord3,
    TexCoord4,
}

const D3DDECLUSAGE_POSITION: u16 = 0;
const D3DDECLUSAGE_BLENDWEIGHT: u16 = 1;
const D3DDECLUSAGE_BLENDINDICES: u16 = 2;
const D3DDECLUSAGE_NORMAL: u16 = 3;
const D3DDECLUSAGE_TEXCOORD: u16 = 5;
const D3DDECLUSAGE_TANGENT: u16 = 6;

impl VertexUsage {
    pub const COUNT: usize = 10;

    pub const ALL: [VertexUsage; Self::COUNT] = [
        VertexUsage::Position,
        VertexUsage::BlendWeight,
        VertexUsage::BlendIndices,
        VertexUsage::Normal,
        VertexUsage::Tangent,
        VertexUsage::TexCoord0,
        VertexUsage::TexCoord1,
        VertexUsage::TexCoord2,
        VertexUsage::TexCoord3,
        VertexUsage::TexCoord4,
    ];

    pub fn from_raw(value: u16) -> Result<Self> {
        let usage = match value {
            D3DDECLUSAGE_POSITION => VertexUsage::Position,
            D3DDECLUSAGE_BLENDWEIGHT => VertexUsage::BlendWeight,
            D3DDECLUSAGE_BLENDINDICES => VertexUsage::BlendIndices,
            D3DDECLUSAGE_NORMAL => VertexUsage::Normal,
            D3DDECLUSAGE_TANGENT => VertexUsage::Tangent,
            v if v & 0xff == D3DDECLUSAGE_TEXCOORD => match Self::uv((v >> 8) as usize) {
                Some(uv) => uv,
                None => {
                    return Err(Error::InvalidEnum {
                        kind: "vertex usage",
                        value: value.into(),
                    })
                }
            },
            _ => {
                return Err(Error::InvalidEnum {
                    kind: "vertex usage",
                    value: value.into(),
                })
            }
        };
        Ok(usage)
    }

    pub fn raw(self) -> u16 {
        match self {
            VertexUsage::Position => D3DDECLUSAGE_POSITION,
            VertexUsage::BlendWeight => D3DDECLUSAGE_BLENDWEIGHT,
            VertexUsage::BlendIndices => D3DDECLUSAGE_BLENDINDICES,
            VertexUsage::Normal => D3DDECLUSAGE_NORMAL,
            VertexUsage::Tangent => D3DDECLUSAGE_TANGENT,
            uv => (uv.uv_channel().unwrap_or(0) as u16) << 8 | D3DDECLUSAGE_TEXCOORD,
        }
    }

    /// Texture coordinate usage for a channel, 0 to 4.
    pub fn uv(channel: usize) -> Option<Self> {
        match channel {
            0 => Some(VertexUsage::TexCoord0),
            1 => Some(VertexUsage::TexCoord1),
            2 => Some(VertexUsage::TexCoord2),
            3 => Some(VertexUsage::TexCoord3),
            4 => Some(VertexUsage::TexCoord4),
            _ => None,
        }
    }

    pub fn uv_channel(self) -> Option<usize> {
        match self {
            VertexUsage::TexCoord0 => Some(0),
            VertexUsage::TexCoord1 => Some(1),
            VertexUsage::TexCoord2 => Some(2),
            VertexUsage::TexCoord3 => Some(3),
            VertexUsage::TexCoord4 => Some(4),
            _ => None,
        }
    }

    /// Slot in a vertex's fixed attribute array.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// D3D9 `_D3DPRIMITIVETYPE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PrimitiveType {
    PointList = 1,
    LineList = 2,
    LineStrip = 3,
    TriangleList = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive)]
pub enum AlphaMode {
    #[default]
    None = 0,
    AlphaBlend = 1,
    AlphaTest = 2,
}

impl AlphaMode {
    pub fn from_raw(value: u32) -> Result<Self> {
        Self::from_u32(value).ok_or(Error::InvalidEnum {
            kind: "alpha mode",
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_uv_channels_are_bit_packed() {
        assert_eq!(VertexUsage::TexCoord0.raw(), 5);
        assert_eq!(VertexUsage::TexCoord1.raw(), 1 << 8 | 5);
        assert_eq!(VertexUsage::TexCoord4.raw(), 4 << 8 | 5);
        assert_eq!(VertexUsage::from_raw(3 << 8 | 5).unwrap(), VertexUsage::TexCoord3);
    }

    #[test]
    fn every_usage_round_trips_its_raw_value() {
        for usage in VertexUsage::ALL {
            assert_eq!(VertexUsage::from_raw(usage.raw()).unwrap(), usage);
            assert_eq!(VertexUsage::ALL[usage.index()], usage);
        }
    }

    #[test]
    fn unknown_usages_are_rejected() {
        assert!(VertexUsage::from_raw(7).is_err()); // BINORMAL
        assert!(VertexUsage::from_raw(5 << 8 | 5).is_err());
    }

    #[test]
    fn decl_type_widths() {
        assert_eq!(DeclType::Float1.size(), 4);
        assert_eq!(DeclType::Float2.size(), 8);
        assert_eq!(DeclType::Float3.size(), 12);
        assert_eq!(DeclType::Float4.size(), 16);
        assert_eq!(DeclType::D3DColor.size(), 4);
        assert_eq!(DeclType::from_raw(17).unwrap(), DeclType::Unused);
        assert!(DeclType::from_raw(18).is_err());
    }
}
