use crate::error::{Error, Result};

use super::consts::{DeclType, VertexUsage};
use super::declaration::VertexAttribute;

#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Float1(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    /// D3DCOLOR bytes, used by BF2 for blend indices.
    Color([u8; 4]),
    /// Any other declaration type, kept as the raw bytes.
    Packed(Vec<u8>),
}

impl AttributeValue {
    /// Unpacks one value of `decl_type` from exactly `decl_type.size()` bytes.
    pub fn unpack(decl_type: DeclType, bytes: &[u8]) -> Self {
        let f = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        match decl_type {
            DeclType::Float1 => AttributeValue::Float1(f(0)),
            DeclType::Float2 => AttributeValue::Float2([f(0), f(4)]),
            DeclType::Float3 => AttributeValue::Float3([f(0), f(4), f(8)]),
            DeclType::Float4 => AttributeValue::Float4([f(0), f(4), f(8), f(12)]),
            DeclType::D3DColor => AttributeValue::Color([bytes[0], bytes[1], bytes[2], bytes[3]]),
            _ => AttributeValue::Packed(bytes.to_vec()),
        }
    }

    pub fn matches(&self, decl_type: DeclType) -> bool {
        match (self, decl_type) {
            (AttributeValue::Float1(_), DeclType::Float1)
            | (AttributeValue::Float2(_), DeclType::Float2)
            | (AttributeValue::Float3(_), DeclType::Float3)
            | (AttributeValue::Float4(_), DeclType::Float4)
            | (AttributeValue::Color(_), DeclType::D3DColor) => true,
            (AttributeValue::Packed(b), t) => b.len() == t.size(),
            _ => false,
        }
    }

    pub fn pack(&self, out: &mut Vec<u8>) {
        match self {
            AttributeValue::Color(c) => out.extend_from_slice(c),
            AttributeValue::Packed(b) => out.extend_from_slice(b),
            floats => {
                for v in floats.as_floats() {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
    }

    /// Float components, empty for packed values.
    pub fn as_floats(&self) -> &[f32] {
        match self {
            AttributeValue::Float1(v) => std::slice::from_ref(v),
            AttributeValue::Float2(v) => v,
            AttributeValue::Float3(v) => v,
            AttributeValue::Float4(v) => v,
            AttributeValue::Color(_) | AttributeValue::Packed(_) => &[],
        }
    }
}

/// One vertex, attributes addressed by usage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    values: [Option<AttributeValue>; VertexUsage::COUNT],
}

impl Vertex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, usage: VertexUsage) -> Option<&AttributeValue> {
        self.values[usage.index()].as_ref()
    }

    pub fn set(&mut self, usage: VertexUsage, value: AttributeValue) {
        self.values[usage.index()] = Some(value);
    }

    pub fn with(mut self, usage: VertexUsage, value: AttributeValue) -> Self {
        self.set(usage, value);
        self
    }

    pub fn position(&self) -> Option<glam::Vec3> {
        match self.get(VertexUsage::Position)? {
            AttributeValue::Float3(p) => Some(glam::Vec3::from_array(*p)),
            _ => None,
        }
    }

    /// Reads one vertex from its packed bytes, `stride` bytes long.
    pub(crate) fn unpack(attributes: &[VertexAttribute], packed: &[u8]) -> Self {
        let mut vertex = Self::new();
        for attr in attributes.iter().filter(|a| a.used) {
            let start = attr.offset as usize;
            let bytes = &packed[start..start + attr.decl_type.size()];
            vertex.set(attr.usage, AttributeValue::unpack(attr.decl_type, bytes));
        }
        vertex
    }

    /// Appends the packed form. `attributes` must carry encode-time offsets, in order.
    pub(crate) fn pack(
        &self,
        index: usize,
        attributes: &[VertexAttribute],
        out: &mut Vec<u8>,
    ) -> Result<()> {
        self.validate(index, attributes)?;
        for attr in attributes.iter().filter(|a| a.used) {
            if let Some(value) = self.get(attr.usage) {
                value.pack(out);
            }
        }
        Ok(())
    }

    /// Checks that `pack` would succeed.
    pub(crate) fn validate(&self, index: usize, attributes: &[VertexAttribute]) -> Result<()> {
        for attr in attributes.iter().filter(|a| a.used) {
            match self.get(attr.usage) {
                None => {
                    return Err(Error::MissingVertexAttribute {
                        vertex: index,
                        usage: attr.usage,
                    })
                }
                Some(v) if !v.matches(attr.decl_type) => {
                    return Err(Error::AttributeTypeMismatch {
                        vertex: index,
                        usage: attr.usage,
                        decl_type: attr.decl_type,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::declaration::assign_offsets;

    fn layout() -> Vec<VertexAttribute> {
        let mut attrs = vec![
            VertexAttribute::new(VertexUsage::Position, DeclType::Float3),
            VertexAttribute::new(VertexUsage::BlendIndices, DeclType::D3DColor),
            VertexAttribute::new(VertexUsage::TexCoord0, DeclType::Float2),
            VertexAttribute::new(VertexUsage::Tangent, DeclType::Short4N),
        ];
        assign_offsets(&mut attrs).unwrap();
        attrs
    }

    #[test]
    fn pack_then_unpack() {
        let attrs = layout();
        let v = Vertex::new()
            .with(VertexUsage::Position, AttributeValue::Float3([1.0, -2.0, 3.5]))
            .with(VertexUsage::BlendIndices, AttributeValue::Color([1, 2, 0, 0]))
            .with(VertexUsage::TexCoord0, AttributeValue::Float2([0.25, 0.75]))
            .with(VertexUsage::Tangent, AttributeValue::Packed(vec![1, 2, 3, 4, 5, 6, 7, 8]));

        let mut bytes = Vec::new();
        v.pack(0, &attrs, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 12 + 4 + 8 + 8);
        assert_eq!(Vertex::unpack(&attrs, &bytes), v);
        assert_eq!(v.position(), Some(glam::vec3(1.0, -2.0, 3.5)));
    }

    #[test]
    fn missing_and_mismatched_values() {
        let attrs = layout();
        let v = Vertex::new().with(VertexUsage::Position, AttributeValue::Float3([0.0; 3]));
        assert!(matches!(
            v.validate(3, &attrs),
            Err(Error::MissingVertexAttribute {
                vertex: 3,
                usage: VertexUsage::BlendIndices
            })
        ));

        let v = Vertex::new()
            .with(VertexUsage::Position, AttributeValue::Float2([0.0; 2]))
            .with(VertexUsage::BlendIndices, AttributeValue::Color([0; 4]))
            .with(VertexUsage::TexCoord0, AttributeValue::Float2([0.0; 2]))
            .with(VertexUsage::Tangent, AttributeValue::Packed(vec![0; 8]));
        assert!(matches!(
            v.validate(0, &attrs),
            Err(Error::AttributeTypeMismatch {
                usage: VertexUsage::Position,
                ..
            })
        ));
    }
}
