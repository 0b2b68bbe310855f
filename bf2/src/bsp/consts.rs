use flagset::flags;

// Leaf face-ref counts are stored in one descriptor byte per side.
pub const MAX_LEAF_FACES: usize = 255;

pub const AXIS_MASK: u32 = 0b11;
pub const LEAF_COUNT_SHIFT: u32 = 16;

flags! {
    /// Node descriptor bits marking a side as a leaf rather than a child node.
    #[repr(u32)]
    pub enum NodeFlags: u32 {
        FrontLeaf = 0x4,
        BackLeaf = 0x8,
    }
}

impl NodeFlags {
    pub fn leaf(side: usize) -> Self {
        if side == 0 {
            NodeFlags::FrontLeaf
        } else {
            NodeFlags::BackLeaf
        }
    }
}

/// Bit offset of a side's face-ref count inside the descriptor.
pub const fn leaf_count_shift(side: usize) -> u32 {
    LEAF_COUNT_SHIFT + 8 * side as u32
}
