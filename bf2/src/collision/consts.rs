use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{Error, Result};

pub const MIN_MINOR_VERSION: u32 = 9;
pub const MAX_MINOR_VERSION: u32 = 10;
// debug face indices are stored from here on
pub const DEBUG_MESH_MINOR_VERSION: u32 = 10;

// BSP presence is an ASCII digit
pub const BSP_ABSENT: u8 = b'0';
pub const BSP_PRESENT: u8 = b'1';

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive)]
pub enum CollisionType {
    #[default]
    Projectile = 0,
    Vehicle = 1,
    Soldier = 2,
    Ai = 3,
}

impl CollisionType {
    pub fn from_raw(value: u32) -> Result<Self> {
        Self::from_u32(value).ok_or(Error::InvalidEnum {
            kind: "collision type",
            value,
        })
    }
}
