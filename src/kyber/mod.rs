/*!
 * ML-KEM (CRYSTALS-Kyber) key encapsulation adapter
 *
 * Thin adapter over the liboqs ML-KEM implementation at the three NIST
 * security tiers. The lattice arithmetic itself lives in liboqs.
 */

mod kyber;

pub use kyber::*;
