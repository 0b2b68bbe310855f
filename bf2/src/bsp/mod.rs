//! Axis aligned BSP trees over a collision lod's faces.
//!
//! Trees are arenas: node 0 is the root and nodes are stored in pre-order
//! (root, front subtree, back subtree), which is also the order they are written in.

pub mod builder;
mod codec;
mod consts;

use glam::Vec3;
use num_derive::FromPrimitive;

use crate::error::{Error, Result};
use crate::geo::Bounds;

pub use builder::{classify_face, partition, BspBuilder, BspBuilderConfig, FaceSide};
pub use consts::{NodeFlags, MAX_LEAF_FACES};

pub const FRONT: usize = 0;
pub const BACK: usize = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SplitPlane {
    pub value: f32,
    pub axis: Axis,
}

impl SplitPlane {
    pub fn new(axis: Axis, value: f32) -> Self {
        Self { value, axis }
    }

    /// Negative on the front side.
    pub fn distance(&self, p: Vec3) -> f32 {
        p[self.axis.index()] - self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BspChild {
    Node(usize),
    /// Indices into the lod's face list.
    Leaf(Vec<u32>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BspNode {
    pub plane: SplitPlane,
    /// Front, then back.
    pub children: [BspChild; 2],
}

impl BspNode {
    pub fn front(&self) -> &BspChild {
        &self.children[FRONT]
    }

    pub fn back(&self) -> &BspChild {
        &self.children[BACK]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BspTree {
    pub bounds: Bounds,
    pub nodes: Vec<BspNode>,
}

impl BspTree {
    pub fn root(&self) -> Option<&BspNode> {
        self.nodes.first()
    }

    /// Leaf face lists, in pre-order.
    pub fn leaves(&self) -> impl Iterator<Item = &[u32]> {
        self.nodes.iter().flat_map(|n| {
            n.children.iter().filter_map(|c| match c {
                BspChild::Leaf(faces) => Some(faces.as_slice()),
                BspChild::Node(_) => None,
            })
        })
    }

    /// Face references over all leaves, duplicates included.
    pub fn face_ref_count(&self) -> usize {
        self.leaves().map(<[u32]>::len).sum()
    }

    /// Faces reachable through one side of a node.
    pub fn faces_under(&self, child: &BspChild) -> Vec<u32> {
        let mut faces = Vec::new();
        let mut stack = vec![child];
        while let Some(child) = stack.pop() {
            match child {
                BspChild::Leaf(leaf) => faces.extend_from_slice(leaf),
                BspChild::Node(i) => {
                    if let Some(node) = self.nodes.get(*i) {
                        stack.extend(node.children.iter().rev());
                    }
                }
            }
        }
        faces
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut stack = match self.root() {
            Some(_) => vec![(0, 1)],
            None => return 0,
        };
        while let Some((index, level)) = stack.pop() {
            depth = depth.max(level);
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            for child in &node.children {
                if let BspChild::Node(c) = child {
                    stack.push((*c, level + 1));
                }
            }
        }
        depth
    }
}

/// Pre-order walk of an index tree rooted at `root`, front before back.
///
/// Fails on out of range children and on nodes reached twice, so the result
/// always lists each reachable node exactly once.
pub(crate) fn pre_order(
    len: usize,
    root: usize,
    children: impl Fn(usize) -> [Option<usize>; 2],
) -> Result<Vec<usize>> {
    let mut seen = vec![false; len];
    let mut order = Vec::with_capacity(len);
    let mut stack = vec![root];
    while let Some(index) = stack.pop() {
        match seen.get_mut(index) {
            None => {
                return Err(Error::BspMalformed(format!(
                    "child node {index} is out of range ({len} nodes)"
                )))
            }
            Some(true) => {
                return Err(Error::BspMalformed(format!(
                    "node {index} is referenced more than once"
                )))
            }
            Some(seen) => *seen = true,
        }
        order.push(index);
        let [front, back] = children(index);
        stack.extend(back);
        stack.extend(front);
    }
    Ok(order)
}
