/*!
 * ML-DSA (CRYSTALS-Dilithium) signature adapter
 *
 * Signs and verifies SHA3-256 digests of messages with the liboqs ML-DSA
 * implementation, so signing cost does not grow with message size.
 */

mod dilithium;

pub use dilithium::*;

#[cfg(test)]
mod tests;
