//! Bit-wise hashing and equality of GPU descriptor structs used as pool keys (C1).
//!
//! Descriptor structs (texture descriptors, pipeline keys, ...) are treated as plain-old-data:
//! two descriptors that are byte-identical must hash identically and compare equal, and the
//! converse must never produce a false positive. In C++ this is usually done with a raw
//! `memcmp`/murmur hash over the struct's bytes; doing the same thing safely in Rust means
//! requiring `bytemuck::Pod` (which statically rules out padding-related UB — every byte of
//! a `Pod` type is significant and initialized) and hashing/comparing through `bytes_of`.
//!
//! All descriptor types in [`crate::gpu::descriptor`] are `#[repr(C)]` with every field
//! given an explicit, zeroed default, so `Default::default()` never leaves padding
//! uninitialized (`Pod` itself already forbids padding bytes from being observable, but
//! using `Default` everywhere keeps construction sites uniform and avoids accidental
//! half-built values making it into a key).

use std::hash::{Hash, Hasher};

use bytemuck::Pod;

/// A descriptor usable as a pool key: plain-old-data, comparable and hashable byte-wise.
pub trait DescriptorKey: Pod + Eq {
    /// Canonical byte view of this descriptor, used for hashing and pool-key comparison.
    #[inline]
    fn canonical_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl<T: Pod + Eq> DescriptorKey for T {}

/// Newtype wrapping a [`DescriptorKey`] so it can be used directly as a `HashMap` key with
/// byte-wise (not field-wise) hash semantics, matching the "MurmurHash(A) == MurmurHash(B)
/// whenever memcmp(A, B) == 0" contract from the spec.
#[derive(Clone, Copy)]
pub struct ByteKey<K: DescriptorKey>(pub K);

impl<K: DescriptorKey> PartialEq for ByteKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.0.canonical_bytes() == other.0.canonical_bytes()
    }
}

impl<K: DescriptorKey> Eq for ByteKey<K> {}

impl<K: DescriptorKey> Hash for ByteKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let h = murmur_hash3_32(self.0.canonical_bytes(), 0);
        state.write_u32(h);
    }
}

/// MurmurHash3 (x86_32 variant). Not cryptographic; chosen for speed and good avalanche
/// behavior over small, fixed-size POD keys, matching the original engine's pool hashing.
pub fn murmur_hash3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut hash = seed;
    let nblocks = data.len() / 4;

    for i in 0..nblocks {
        let offset = i * 4;
        let mut k = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);

        hash ^= k;
        hash = hash.rotate_left(13);
        hash = hash.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = &data[nblocks * 4..];
    let mut k1: u32 = 0;
    if tail.len() >= 3 {
        k1 ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k1 ^= tail[0] as u32;
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        hash ^= k1;
    }

    hash ^= data.len() as u32;
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;
    hash
}
