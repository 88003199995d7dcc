use std::fmt::Display;

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Addr(usize);

impl Addr {
    pub fn new(v: usize) -> Self {
        Self(v)
    }
    pub fn inner(self) -> usize {
        self.0
    }
    /// start of the `block_size`-aligned block containing this address.
    pub fn block_base(self, block_size: usize) -> Self {
        Self(self.0 - self.0 % block_size)
    }
}

impl Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MemoryAccessError {
    #[error("address {accessed_address} out of range for memory of {size} bytes")]
    OutOfBounds { accessed_address: Addr, size: usize },
}

pub type Result<T> = std::result::Result<T, MemoryAccessError>;

macro_rules! bounds_check {
    ($addr:ident < $self:ident) => {
        if $addr.inner() >= $self.inner.len() {
            return Err(MemoryAccessError::OutOfBounds {
                accessed_address: $addr,
                size: $self.inner.len(),
            });
        }
    };
}

/// Byte-addressable backing store. Transfers to and from the cache are whole
/// aligned blocks; only write-through and no-write-allocate touch single bytes.
pub struct PhysicalMemory {
    inner: Vec<u8>,
    block_size: usize,
}

impl PhysicalMemory {
    pub fn new(size: usize, block_size: usize) -> Self {
        Self {
            inner: vec![0; size],
            block_size,
        }
    }
    /// copies `image` into the lowest addresses, returning how many bytes did not fit.
    pub fn init_from_slice(&mut self, image: &[u8]) -> usize {
        let len = image.len().min(self.inner.len());
        self.inner[..len].copy_from_slice(&image[..len]);
        image.len() - len
    }
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
    pub fn get(&self, addr: Addr) -> Result<u8> {
        bounds_check!(addr < self);
        Ok(self.inner[addr.inner()])
    }
    pub fn read_block(&self, addr: Addr) -> Result<&[u8]> {
        bounds_check!(addr < self);
        let base = addr.block_base(self.block_size).inner();
        Ok(&self.inner[base..base + self.block_size])
    }
    pub fn write_byte(&mut self, addr: Addr, byte: u8) -> Result<()> {
        bounds_check!(addr < self);
        self.inner[addr.inner()] = byte;
        Ok(())
    }
    pub fn write_block(&mut self, addr: Addr, block: &[u8]) -> Result<()> {
        bounds_check!(addr < self);
        debug_assert_eq!(block.len(), self.block_size);
        let base = addr.block_base(self.block_size).inner();
        self.inner[base..base + self.block_size].copy_from_slice(block);
        Ok(())
    }
}
