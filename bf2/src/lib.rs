//! Readers and writers for Battlefield 2 mesh assets: visible meshes
//! (`.staticmesh`, `.bundledmesh`, `.skinnedmesh`), `.collisionmesh` files and
//! the BSP trees embedded in them.

pub mod binaries;
pub mod bsp;
pub mod collision;
pub mod error;
pub mod geo;
pub mod mesh;
pub mod prelude;

pub use error::{Error, Result};
