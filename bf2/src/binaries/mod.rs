//! Little-endian primitive reader/writer. The only place raw bytes become numbers.

use std::mem;

use glam::{Mat4, Vec3};

use crate::error::{Error, Result};

// Pod records are copied straight from the byte stream.
#[cfg(target_endian = "big")]
compile_error!("BF2 files are little-endian and records are read in host order");

/// Fixed-size records read and written as raw bytes.
pub trait BinaryData: bytemuck::Pod {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let bytes = reader.read_raw(mem::size_of::<Self>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn write(&self, writer: &mut BinaryWriter) {
        writer.write_raw(bytemuck::bytes_of(self));
    }
}

impl<T: bytemuck::Pod> BinaryData for T {}

pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::TruncatedInput {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// u32 element count. Only used to size loops, never trusted for allocation.
    pub fn read_count(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// u32 length followed by that many ASCII bytes.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_count()?;
        let bytes = self.read_raw(len)?;
        if !bytes.is_ascii() {
            return Err(Error::InvalidString);
        }
        // ascii is always valid utf8
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    pub fn read<T: BinaryData>(&mut self) -> Result<T> {
        T::read(self)
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        self.read()
    }

    /// Sixteen floats in D3D row-vector order, which is glam's column order.
    pub fn read_mat4(&mut self) -> Result<Mat4> {
        self.read()
    }

    /// Reads `count` consecutive records.
    pub fn read_n<T: BinaryData>(&mut self, count: usize) -> Result<Vec<T>> {
        let size = mem::size_of::<T>();
        let bytes = self.read_blocks(count, size)?;
        Ok(bytes
            .chunks_exact(size.max(1))
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// `count` blocks of `size` bytes each, as one slice.
    pub fn read_blocks(&mut self, count: usize, size: usize) -> Result<&'a [u8]> {
        let total = count.checked_mul(size).ok_or(Error::TruncatedInput {
            offset: self.pos,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.read_raw(total)
    }

    /// Capacity hint for a count-prefixed list, bounded by what the stream could still hold.
    pub fn capacity_hint(&self, count: usize, min_element_size: usize) -> usize {
        count.min(self.remaining() / min_element_size.max(1))
    }

    /// End-of-stream check, performed exactly once after the last section.
    pub fn finish(self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(Error::TrailingBytes {
                consumed: self.pos,
                len: self.data.len(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_count(&mut self, count: usize) -> Result<()> {
        self.write_u32(to_u32(count)?);
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        if !s.is_ascii() {
            return Err(Error::InvalidString);
        }
        self.write_count(s.len())?;
        self.write_raw(s.as_bytes());
        Ok(())
    }

    pub fn write<T: BinaryData>(&mut self, v: &T) {
        v.write(self);
    }

    pub fn write_vec3(&mut self, v: Vec3) {
        self.write(&v);
    }

    pub fn write_mat4(&mut self, m: &Mat4) {
        self.write(m);
    }

    pub fn write_n<T: BinaryData>(&mut self, values: &[T]) {
        self.write_raw(bytemuck::cast_slice(values));
    }
}

pub fn to_u32(count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| Error::CountOverflow(count))
}
