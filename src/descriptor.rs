//! The fixed-width byte descriptor all indexes operate on.

/// Number of components in a descriptor.
pub const DESCRIPTOR_DIM: usize = 128;

/// A 128-component unsigned byte feature vector.
///
/// Produced by an external feature extractor (one descriptor per detected
/// keypoint, components quantised to `u8`). The 32-byte alignment keeps
/// each of the four 32-byte lanes of a descriptor load-aligned, so SIMD
/// codegen over whole descriptors never straddles lanes.
///
/// Descriptors are plain data: cheap to copy, compared component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct Descriptor(pub [u8; DESCRIPTOR_DIM]);

impl Descriptor {
    /// Descriptor with every component set to `value`.
    #[inline]
    #[must_use]
    pub const fn splat(value: u8) -> Self {
        Self([value; DESCRIPTOR_DIM])
    }

    /// Component accessor.
    #[inline]
    #[must_use]
    pub fn get(&self, dim: usize) -> u8 {
        self.0[dim]
    }

    /// The raw component bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DESCRIPTOR_DIM] {
        &self.0
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::splat(0)
    }
}

impl From<[u8; DESCRIPTOR_DIM]> for Descriptor {
    fn from(bytes: [u8; DESCRIPTOR_DIM]) -> Self {
        Self(bytes)
    }
}
