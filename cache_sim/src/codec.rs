use serde::Serialize;

use crate::{
    bin::extract,
    config::Geometry,
    memory::{Addr, MemoryAccessError},
};

/// An address split at the geometry's bit boundaries: `tag | index | offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedAddr {
    pub tag: usize,
    pub index: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct AddressCodec {
    ram_size: usize,
    tag_bits: u32,
    index_bits: u32,
    offset_bits: u32,
}

impl AddressCodec {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            ram_size: geometry.ram_size,
            tag_bits: geometry.tag_bits,
            index_bits: geometry.index_bits,
            offset_bits: geometry.offset_bits,
        }
    }

    /// A single-set cache has zero index bits and always decodes to index 0.
    pub fn decode(&self, addr: Addr) -> Result<DecodedAddr, MemoryAccessError> {
        let a = addr.inner();
        if a >= self.ram_size {
            return Err(MemoryAccessError::OutOfBounds {
                accessed_address: addr,
                size: self.ram_size,
            });
        }
        Ok(DecodedAddr {
            tag: extract(a, self.offset_bits + self.index_bits, self.tag_bits),
            index: extract(a, self.offset_bits, self.index_bits),
            offset: extract(a, 0, self.offset_bits),
        })
    }

    /// base address of the block tagged `tag` in set `index` (offset bits zero).
    pub fn encode(&self, tag: usize, index: usize) -> Addr {
        Addr::new((tag << (self.index_bits + self.offset_bits)) | (index << self.offset_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::config;

    fn codec(ram: usize, cache: usize, block: usize, assoc: usize) -> AddressCodec {
        AddressCodec::new(&Geometry::new(&config(ram, cache, block, assoc)).unwrap())
    }

    #[test]
    fn test_decode_fields() {
        // t = 3, s = 2, b = 3
        let c = codec(256, 32, 8, 1);
        let d = c.decode(Addr::new(0b101_10_110)).unwrap();
        assert_eq!(
            DecodedAddr {
                tag: 0b101,
                index: 0b10,
                offset: 0b110
            },
            d
        );
        assert_eq!(
            DecodedAddr {
                tag: 0,
                index: 0,
                offset: 5
            },
            c.decode(Addr::new(0x05)).unwrap()
        );
    }
    #[test]
    fn test_single_set_index_is_zero() {
        let c = codec(256, 32, 8, 4);
        for a in 0..256 {
            assert_eq!(0, c.decode(Addr::new(a)).unwrap().index);
        }
        assert_eq!(0xff >> 3, c.decode(Addr::new(0xff)).unwrap().tag);
    }
    #[test]
    fn test_encode_reconstructs_block_base() {
        for (ram, cache, block, assoc) in [(256, 32, 8, 1), (256, 64, 4, 2), (1024, 256, 16, 4)] {
            let c = codec(ram, cache, block, assoc);
            for a in 0..ram {
                let d = c.decode(Addr::new(a)).unwrap();
                assert_eq!(Addr::new(a - a % block), c.encode(d.tag, d.index));
            }
        }
    }
    #[test]
    fn test_decode_out_of_range() {
        let c = codec(256, 32, 8, 1);
        assert_eq!(
            Err(MemoryAccessError::OutOfBounds {
                accessed_address: Addr::new(0x100),
                size: 256
            }),
            c.decode(Addr::new(0x100))
        );
    }
}
