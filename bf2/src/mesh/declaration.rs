//! Vertex declaration table: how a flat vertex buffer is packed.

use crate::binaries::{BinaryReader, BinaryWriter};
use crate::error::{Error, Result};

use super::consts::{DeclType, VertexUsage, UNUSED, USED};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct VertexAttributeRecord {
    flag: u16,      // USED/UNUSED
    offset: u16,    // byte offset inside one vertex
    decl_type: u16, // D3DDECLTYPE
    usage: u16,     // D3DDECLUSAGE, extra UV channels packed as channel << 8 | 5
}

// D3DDECL_END() as written by the exporter.
const TERMINATOR: VertexAttributeRecord = VertexAttributeRecord {
    flag: UNUSED,
    offset: 0,
    decl_type: DeclType::Unused as u16,
    usage: 0,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub usage: VertexUsage,
    pub decl_type: DeclType,
    pub offset: u16,
    pub used: bool,
}

impl VertexAttribute {
    /// A used attribute. The offset is assigned when the table is encoded.
    pub fn new(usage: VertexUsage, decl_type: DeclType) -> Self {
        Self {
            usage,
            decl_type,
            offset: 0,
            used: true,
        }
    }
}

/// Reads the count-prefixed table, dropping the mandatory trailing terminator.
pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Vec<VertexAttribute>> {
    let count = reader.read_count()?;
    let records: Vec<VertexAttributeRecord> = reader.read_n(count)?;

    let Some((last, records)) = records.split_last() else {
        return Err(Error::MissingDeclarationTerminator);
    };
    if last.flag == USED {
        return Err(Error::MissingDeclarationTerminator);
    }

    records
        .iter()
        .map(|r| {
            Ok(VertexAttribute {
                usage: VertexUsage::from_raw(r.usage)?,
                decl_type: DeclType::from_raw(r.decl_type)?,
                offset: r.offset,
                used: r.flag == USED,
            })
        })
        .collect()
}

/// Assigns contiguous offsets to the used attributes in list order.
/// Returns the vertex stride.
pub fn assign_offsets(attributes: &mut [VertexAttribute]) -> Result<usize> {
    let mut offset = 0usize;
    for attr in attributes.iter_mut() {
        if attr.used {
            attr.offset = u16::try_from(offset).map_err(|_| Error::CountOverflow(offset))?;
            offset += attr.decl_type.size();
        } else {
            attr.offset = 0;
        }
    }
    Ok(offset)
}

/// Writes the table with freshly assigned offsets and the terminator appended.
/// Returns the written attributes and the vertex stride.
pub fn encode(
    attributes: &[VertexAttribute],
    writer: &mut BinaryWriter,
) -> Result<(Vec<VertexAttribute>, usize)> {
    let mut attributes = attributes.to_vec();
    let stride = assign_offsets(&mut attributes)?;

    let records: Vec<VertexAttributeRecord> = attributes
        .iter()
        .map(|a| VertexAttributeRecord {
            flag: if a.used { USED } else { UNUSED },
            offset: a.offset,
            decl_type: a.decl_type.raw(),
            usage: a.usage.raw(),
        })
        .chain(std::iter::once(TERMINATOR))
        .collect();

    writer.write_count(records.len())?;
    writer.write_n(&records);
    Ok((attributes, stride))
}

pub fn resolve_usage(attributes: &[VertexAttribute], usage: VertexUsage) -> Option<u16> {
    attributes
        .iter()
        .find(|a| a.used && a.usage == usage)
        .map(|a| a.offset)
}

pub fn stride(attributes: &[VertexAttribute]) -> usize {
    attributes
        .iter()
        .filter(|a| a.used)
        .map(|a| a.decl_type.size())
        .sum()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn standard() -> Vec<VertexAttribute> {
        vec![
            VertexAttribute::new(VertexUsage::Position, DeclType::Float3),
            VertexAttribute::new(VertexUsage::Normal, DeclType::Float3),
            VertexAttribute::new(VertexUsage::TexCoord0, DeclType::Float2),
            VertexAttribute::new(VertexUsage::TexCoord1, DeclType::Float2),
        ]
    }

    #[test]
    fn encode_assigns_offsets_and_terminates() {
        let mut w = BinaryWriter::new();
        let (attrs, stride) = encode(&standard(), &mut w).unwrap();
        assert_eq!(stride, 40);
        assert_eq!(
            attrs.iter().map(|a| a.offset).collect::<Vec<_>>(),
            vec![0, 12, 24, 32]
        );

        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 4 + 5 * 8);
        assert_eq!(&bytes[..4], &5u32.to_le_bytes());
        // terminator
        assert_eq!(&bytes[36..44], &[0xff, 0, 0, 0, 17, 0, 0, 0]);
        // TEXCOORD1 usage
        assert_eq!(&bytes[34..36], &(1u16 << 8 | 5).to_le_bytes());
    }

    #[test]
    fn decode_drops_terminator() {
        let mut w = BinaryWriter::new();
        encode(&standard(), &mut w).unwrap();
        let bytes = w.into_inner();

        let mut r = BinaryReader::new(&bytes);
        let attrs = decode(&mut r).unwrap();
        r.finish().unwrap();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[3].usage, VertexUsage::TexCoord1);
        assert_eq!(resolve_usage(&attrs, VertexUsage::Normal), Some(12));
        assert_eq!(resolve_usage(&attrs, VertexUsage::Tangent), None);
        assert_eq!(stride(&attrs), 40);
    }

    #[test]
    fn missing_terminator_is_rejected() {
        let mut w = BinaryWriter::new();
        w.write_u32(1);
        w.write_n(&[VertexAttributeRecord {
            flag: USED,
            offset: 0,
            decl_type: 2,
            usage: 0,
        }]);
        let bytes = w.into_inner();
        assert!(matches!(
            decode(&mut BinaryReader::new(&bytes)),
            Err(Error::MissingDeclarationTerminator)
        ));

        let empty = 0u32.to_le_bytes();
        assert!(matches!(
            decode(&mut BinaryReader::new(&empty)),
            Err(Error::MissingDeclarationTerminator)
        ));
    }

    #[test]
    fn unused_entries_are_skipped_when_packing() {
        let mut attrs = standard();
        attrs[1].used = false;
        let stride = assign_offsets(&mut attrs).unwrap();
        assert_eq!(stride, 28);
        assert_eq!(attrs[1].offset, 0);
        assert_eq!(attrs[2].offset, 12);
        assert_eq!(resolve_usage(&attrs, VertexUsage::Normal), None);
    }

    fn decl_type() -> impl Strategy<Value = DeclType> {
        prop::sample::select(vec![
            DeclType::Float1,
            DeclType::Float2,
            DeclType::Float3,
            DeclType::Float4,
            DeclType::D3DColor,
            DeclType::Short4,
        ])
    }

    proptest! {
        #[test]
        fn offsets_are_prefix_sums(
            types in prop::collection::vec((decl_type(), any::<bool>()), 0..10)
        ) {
            let input: Vec<_> = types
                .iter()
                .enumerate()
                .map(|(i, &(t, used))| VertexAttribute {
                    usage: VertexUsage::ALL[i % VertexUsage::COUNT],
                    decl_type: t,
                    offset: 0xffff,
                    used,
                })
                .collect();

            let mut w = BinaryWriter::new();
            let (attrs, stride) = encode(&input, &mut w).unwrap();

            let mut expected = 0;
            for a in attrs.iter().filter(|a| a.used) {
                prop_assert_eq!(a.offset as usize, expected);
                expected += a.decl_type.size();
            }
            prop_assert_eq!(stride, expected);

            // sentinel is always last and unused
            let bytes = w.into_inner();
            let n = bytes.len();
            prop_assert_eq!(&bytes[n - 8..n - 6], &UNUSED.to_le_bytes());
        }
    }
}
