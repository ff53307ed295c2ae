/*!
 * AES-256-GCM authenticated encryption
 *
 * The AEAD layer of the envelope: payloads are sealed under a per-message
 * DEK and the DEK is sealed under a KEM-derived wrapping key.
 */

mod aes;

pub use aes::*;
