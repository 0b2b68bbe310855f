use std::fmt;

#[repr(C, packed)]
#[derive(Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshHeader {
    pub format: u32,        // always 0 in shipped files
    pub version: u32,       // 4, 6, 10 or 11
    pub reserved: [u32; 3], // written as zero, preserved
    pub flag: u8,           // BFP4F marker, preserved
}

impl MeshHeader {
    pub fn new(version: u32) -> Self {
        Self {
            format: 0,
            version,
            reserved: [0; 3],
            flag: 0,
        }
    }

    /// Lods carry a pivot up to and including version 6.
    pub fn has_pivot(&self) -> bool {
        self.version <= 6
    }
}

impl fmt::Debug for MeshHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = self.format;
        let version = self.version;
        let reserved = self.reserved;
        f.debug_struct("MeshHeader")
            .field("format", &format)
            .field("version", &version)
            .field("reserved", &reserved)
            .field("flag", &self.flag)
            .finish()
    }
}
