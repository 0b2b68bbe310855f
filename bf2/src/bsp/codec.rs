use flagset::FlagSet;
use num_traits::FromPrimitive;

use crate::binaries::{BinaryReader, BinaryWriter};
use crate::error::{Error, Result};
use crate::geo::Bounds;

use super::consts::{leaf_count_shift, NodeFlags, AXIS_MASK, MAX_LEAF_FACES};
use super::{pre_order, Axis, BspChild, BspNode, BspTree, SplitPlane};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct NodeRecord {
    value: f32,
    descriptor: u32, // axis, leaf flags and leaf face-ref counts
    slots: [u32; 2], // child node index, or face-ref start for leaves
}

impl NodeRecord {
    fn flags(&self) -> FlagSet<NodeFlags> {
        FlagSet::new_truncated(self.descriptor)
    }

    fn is_leaf(&self, side: usize) -> bool {
        self.flags().contains(NodeFlags::leaf(side))
    }

    fn leaf_count(&self, side: usize) -> usize {
        (self.descriptor >> leaf_count_shift(side) & 0xff) as usize
    }

    fn child(&self, side: usize) -> Option<usize> {
        (!self.is_leaf(side)).then_some(self.slots[side] as usize)
    }
}

impl BspTree {
    /// Reads a tree whose leaves reference `face_count` faces.
    pub fn decode(reader: &mut BinaryReader<'_>, face_count: usize) -> Result<Self> {
        let start = reader.position();
        let bounds: Bounds = reader.read()?;
        let node_count = reader.read_count()?;
        let records: Vec<NodeRecord> = reader.read_n(node_count)?;
        let ref_count = reader.read_count()?;
        let face_refs: Vec<u16> = reader.read_n(ref_count)?;
        log::trace!("BSP at {start}: {node_count} nodes, {ref_count} face refs");

        let mut has_parent = vec![false; records.len()];
        for (i, record) in records.iter().enumerate() {
            for side in 0..2 {
                let Some(child) = record.child(side) else {
                    continue;
                };
                match has_parent.get_mut(child) {
                    None => {
                        return Err(Error::BspMalformed(format!(
                            "node {i} references node {child} of {node_count}"
                        )))
                    }
                    Some(true) => {
                        return Err(Error::BspMalformed(format!(
                            "node {child} has more than one parent"
                        )))
                    }
                    Some(flag) => *flag = true,
                }
            }
        }

        let mut roots = has_parent.iter().enumerate().filter(|&(_, &p)| !p).map(|(i, _)| i);
        let root = match (roots.next(), roots.next()) {
            (Some(root), None) => root,
            (None, _) => return Err(Error::BspMalformed("no root node".into())),
            (Some(_), Some(_)) => {
                return Err(Error::BspMalformed("more than one root node".into()))
            }
        };

        let order = pre_order(records.len(), root, |i| {
            [records[i].child(0), records[i].child(1)]
        })?;
        if order.len() != records.len() {
            return Err(Error::BspMalformed(format!(
                "{} nodes are unreachable from the root",
                records.len() - order.len()
            )));
        }

        let mut new_index = vec![0; records.len()];
        for (position, &old) in order.iter().enumerate() {
            new_index[old] = position;
        }

        let nodes = order
            .iter()
            .map(|&old| {
                let record = &records[old];
                let axis = Axis::from_u32(record.descriptor & AXIS_MASK).ok_or_else(|| {
                    Error::BspMalformed(format!("node {old} has split axis 3"))
                })?;
                let child = |side: usize| -> Result<BspChild> {
                    if !record.is_leaf(side) {
                        return Ok(BspChild::Node(new_index[record.slots[side] as usize]));
                    }
                    let start = record.slots[side] as usize;
                    let count = record.leaf_count(side);
                    let refs = face_refs.get(start..start + count).ok_or_else(|| {
                        Error::BspMalformed(format!(
                            "node {old} leaf refs {start}..{} exceed {ref_count}",
                            start + count
                        ))
                    })?;
                    refs.iter()
                        .map(|&face| {
                            if face as usize >= face_count {
                                return Err(Error::BspMalformed(format!(
                                    "face ref {face} out of range ({face_count} faces)"
                                )));
                            }
                            Ok(face as u32)
                        })
                        .collect::<Result<Vec<_>>>()
                        .map(BspChild::Leaf)
                };
                Ok(BspNode {
                    plane: SplitPlane::new(axis, record.value),
                    children: [child(0)?, child(1)?],
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { bounds, nodes })
    }

    pub fn encode(&self, writer: &mut BinaryWriter) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::BspMalformed("tree has no nodes".into()));
        }
        let child_index = |child: &BspChild| match child {
            BspChild::Node(i) => Some(*i),
            BspChild::Leaf(_) => None,
        };
        let order = pre_order(self.nodes.len(), 0, |i| {
            let [front, back] = &self.nodes[i].children;
            [child_index(front), child_index(back)]
        })?;

        let mut new_index = vec![0; self.nodes.len()];
        for (position, &old) in order.iter().enumerate() {
            new_index[old] = position;
        }

        let mut face_refs: Vec<u16> = Vec::new();
        let mut records = Vec::with_capacity(order.len());
        for &old in &order {
            let node = &self.nodes[old];
            let mut descriptor = node.plane.axis as u32;
            let mut flags = FlagSet::<NodeFlags>::default();
            let mut slots = [0u32; 2];
            for (side, child) in node.children.iter().enumerate() {
                match child {
                    BspChild::Node(i) => slots[side] = new_index[*i] as u32,
                    BspChild::Leaf(faces) => {
                        if faces.len() > MAX_LEAF_FACES {
                            return Err(Error::BspLeafTooLarge(faces.len()));
                        }
                        slots[side] = crate::binaries::to_u32(face_refs.len())?;
                        for &face in faces {
                            let face = u16::try_from(face).map_err(|_| Error::FaceIndexOutOfRange {
                                index: face as usize,
                                count: u16::MAX as usize + 1,
                            })?;
                            face_refs.push(face);
                        }
                        flags |= NodeFlags::leaf(side);
                        descriptor |= (faces.len() as u32) << leaf_count_shift(side);
                    }
                }
            }
            records.push(NodeRecord {
                value: node.plane.value,
                descriptor: descriptor | flags.bits(),
                slots,
            });
        }

        writer.write(&self.bounds);
        writer.write_count(records.len())?;
        writer.write_n(&records);
        writer.write_count(face_refs.len())?;
        writer.write_n(&face_refs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    fn tree() -> BspTree {
        BspTree {
            bounds: Bounds::new(vec3(-1.0, -1.0, -1.0), vec3(1.0, 1.0, 1.0)),
            nodes: vec![
                BspNode {
                    plane: SplitPlane::new(Axis::Y, 0.0),
                    children: [BspChild::Node(1), BspChild::Leaf(vec![1, 3])],
                },
                BspNode {
                    plane: SplitPlane::new(Axis::Z, -0.5),
                    children: [BspChild::Leaf(vec![0]), BspChild::Leaf(vec![2, 3])],
                },
            ],
        }
    }

    fn encode(tree: &BspTree) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        tree.encode(&mut w).unwrap();
        w.into_inner()
    }

    fn decode(bytes: &[u8], face_count: usize) -> Result<BspTree> {
        let mut r = BinaryReader::new(bytes);
        let tree = BspTree::decode(&mut r, face_count)?;
        r.finish()?;
        Ok(tree)
    }

    fn records(nodes: &[NodeRecord], refs: &[u16]) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write(&Bounds::default());
        w.write_count(nodes.len()).unwrap();
        w.write_n(nodes);
        w.write_count(refs.len()).unwrap();
        w.write_n(refs);
        w.into_inner()
    }

    fn leaf_node(start: u32, count: u32) -> NodeRecord {
        NodeRecord {
            value: 0.0,
            descriptor: 0xc | count << 16,
            slots: [start, start],
        }
    }

    #[test]
    fn layout() {
        let bytes = encode(&tree());
        assert_eq!(bytes.len(), 24 + 4 + 2 * 16 + 4 + 5 * 2);

        let root = &bytes[28..44];
        assert_eq!(&root[4..8], &(1u32 | 0x8 | 2 << 24).to_le_bytes());
        assert_eq!(&root[8..12], &1u32.to_le_bytes());
        // face refs are appended node by node, in node order
        assert_eq!(&root[12..16], &0u32.to_le_bytes());

        let child = &bytes[44..60];
        assert_eq!(&child[4..8], &(2u32 | 0x4 | 0x8 | 1 << 16 | 2 << 24).to_le_bytes());
        assert_eq!(&child[8..16], &[2, 0, 0, 0, 3, 0, 0, 0]);

        assert_eq!(&bytes[60..64], &5u32.to_le_bytes());
        let refs: Vec<u16> = bytes[64..]
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(refs, vec![1, 3, 0, 2, 3]);
    }

    #[test]
    fn round_trip() {
        let tree = tree();
        assert_eq!(decode(&encode(&tree), 4).unwrap(), tree);
    }

    #[test]
    fn nodes_are_renumbered_in_pre_order() {
        // root stored last
        let bytes = records(
            &[
                leaf_node(0, 1),
                NodeRecord {
                    value: 2.0,
                    descriptor: 0,
                    slots: [0, 0],
                },
            ],
            &[0],
        );
        assert!(matches!(decode(&bytes, 1), Err(Error::BspMalformed(_))));

        let bytes = records(
            &[
                leaf_node(0, 1),
                NodeRecord {
                    value: 2.0,
                    descriptor: 0x8 | 1 << 24,
                    slots: [0, 0],
                },
            ],
            &[0],
        );
        let tree = decode(&bytes, 1).unwrap();
        assert_eq!(tree.nodes[0].plane.value, 2.0);
        assert_eq!(tree.nodes[0].children, [BspChild::Node(1), BspChild::Leaf(vec![0])]);
        assert_eq!(tree.nodes[1].children, [BspChild::Leaf(vec![0]), BspChild::Leaf(vec![])]);
    }

    #[test]
    fn exactly_one_root() {
        let bytes = records(&[], &[]);
        assert!(matches!(decode(&bytes, 0), Err(Error::BspMalformed(_))));

        let bytes = records(&[leaf_node(0, 0), leaf_node(0, 0)], &[]);
        assert!(matches!(decode(&bytes, 0), Err(Error::BspMalformed(_))));
    }

    #[test]
    fn dangling_and_cyclic_children() {
        let dangling = NodeRecord {
            value: 0.0,
            descriptor: 0x8,
            slots: [7, 0],
        };
        assert!(matches!(
            decode(&records(&[dangling], &[]), 0),
            Err(Error::BspMalformed(_))
        ));

        // 0 is the root, 1 and 2 point at each other
        let pointing = |to: u32| NodeRecord {
            value: 0.0,
            descriptor: 0x8,
            slots: [to, 0],
        };
        let bytes = records(&[leaf_node(0, 0), pointing(2), pointing(1)], &[]);
        assert!(matches!(decode(&bytes, 0), Err(Error::BspMalformed(_))));
    }

    #[test]
    fn face_refs_are_checked() {
        let bytes = records(&[leaf_node(1, 2)], &[0, 1]);
        assert!(matches!(decode(&bytes, 4), Err(Error::BspMalformed(_))));

        let bytes = records(&[leaf_node(0, 2)], &[0, 9]);
        assert!(matches!(decode(&bytes, 4), Err(Error::BspMalformed(_))));
        assert!(decode(&bytes, 10).is_ok());
    }

    #[test]
    fn oversized_leaves_cannot_be_written() {
        let tree = BspTree {
            bounds: Bounds::default(),
            nodes: vec![BspNode {
                plane: SplitPlane::new(Axis::X, 0.0),
                children: [BspChild::Leaf((0..256).collect()), BspChild::Leaf(vec![])],
            }],
        };
        let mut w = BinaryWriter::new();
        assert!(matches!(tree.encode(&mut w), Err(Error::BspLeafTooLarge(256))));
    }
}
