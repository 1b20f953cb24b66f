//! bitpress-core: packed bit-vector representation and shared error types
//!
//! The toolkit's primitives all communicate through [`BitArray`], a packed
//! big-endian sequence of 32-bit words whose total length need not be a
//! multiple of 32. This crate holds that representation, its little-endian
//! twin [`BitArrayLE`], the bridge to mutable byte buffers, and the error
//! taxonomy every other bitpress crate reports through.
//!
//! ```text
//! BitArray  (packed words + explicit bit length, last word may be partial)
//!     ├── BitArrayLE   (little-endian twin; byte-swap / bit-reverse crossings)
//!     └── bytes        (BitArray ↔ Vec<u8>, block padding helpers)
//! ```

pub mod bits;
pub mod bits_le;
pub mod bytes;
pub mod error;

pub use bits::{xor_block, BitArray};
pub use bits_le::BitArrayLE;
pub use error::{CryptoError, CryptoResult};
