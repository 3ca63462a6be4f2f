//! Link-key derivation and the MAC-level security seam.
//!
//! CCM* frame protection itself is an external collaborator (`spec.md` §1):
//! the network layer calls out to a `SecurityProvider` for encrypting and
//! authenticating over-the-air frames, exactly as `codyps_lorawan::device::Radio`
//! stands in for the radio below the protocol layer. Deriving the 128-bit
//! link key from the exchanged key-seeds, by contrast, is protocol-layer
//! arithmetic the same way LoRaWAN's `NwkSKey`/`AppSKey` derivation
//! (`codyps_lorawan::mac_frame::JoinAccept`) is: both use AES directly, so
//! this module keeps the teacher's direct `aes`/`cmac` usage rather than
//! hiding it behind the MAC seam.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};
use generic_array::GenericArray;

pub const LINK_KEY_LEN: usize = 16;
pub type LinkKey = [u8; LINK_KEY_LEN];
pub const MIC_LEN: usize = 4;
pub const SECURITY_LEVEL: u8 = 5;
pub const FRAME_COUNTER_WINDOW: u32 = 1024;

/// Maximum transmit power (dBm, signed) permitted for key-exchange frames
/// (`spec.md` §4.2).
pub const KEY_EXCHANGE_MAX_TX_POWER_DBM: i8 = -25;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityError {
    TooFewSeeds { have: usize, need: usize },
    TooManySeeds { have: usize, max: usize },
}

/// `aplcMinKeyExchangeTransferCount` (`spec.md` §4.2).
pub const MIN_KEY_EXCHANGE_TRANSFER_COUNT: u8 = 3;
/// Key-exchange seeds are exchanged one per frame; cap generously above the
/// minimum to bound the scratch buffer used during derivation.
pub const MAX_KEY_EXCHANGE_TRANSFER_COUNT: u8 = 16;

/// Derive the 128-bit link key from the seeds exchanged during
/// `NLME-PAIR`/`NLME-PAIR.indication` (`spec.md` §4.2).
///
/// Mirrors the teacher's `aes128_cmac(key, msg)` shape
/// (`codyps_lorawan::mac_frame::PhyPayload::mic_expected`): the seeds are
/// concatenated and run through AES-CMAC keyed by a fixed RF4CE vendor
/// constant, and the first 16 bytes of the resulting tag form the key. Using
/// CMAC instead of raw XOR (as some historical RF4CE stacks do) gives a
/// derivation that does not leak structure from the seed material.
pub fn derive_link_key(seeds: &[[u8; 16]]) -> Result<LinkKey, SecurityError> {
    let have = seeds.len();
    if have < MIN_KEY_EXCHANGE_TRANSFER_COUNT as usize {
        return Err(SecurityError::TooFewSeeds {
            have,
            need: MIN_KEY_EXCHANGE_TRANSFER_COUNT as usize,
        });
    }
    if have > MAX_KEY_EXCHANGE_TRANSFER_COUNT as usize {
        return Err(SecurityError::TooManySeeds {
            have,
            max: MAX_KEY_EXCHANGE_TRANSFER_COUNT as usize,
        });
    }

    // RF4CE vendor-constant CMAC key; fixed per the key-exchange derivation
    // scheme, analogous to the fixed `AppKey`-derived constants in LoRaWAN's
    // NwkSKey/AppSKey computation.
    const DERIVATION_KEY: [u8; 16] = *b"RF4CE-LinkDeriv0";

    let mut mac = Cmac::<Aes128>::new_from_slice(&DERIVATION_KEY).expect("key is 16 bytes");
    for seed in seeds {
        mac.update(seed);
    }
    let tag = mac.finalize().into_bytes();
    let mut key = [0u8; 16];
    key.copy_from_slice(&tag[..16]);
    Ok(key)
}

/// Single AES-128 ECB block encrypt, used by [`derive_link_key`]'s callers
/// that need raw block access (kept separate so tests can exercise it
/// without pulling in the CMAC scratch state).
pub fn aes128_encrypt_block(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut b = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut b);
    let mut out = [0u8; 16];
    out.copy_from_slice(&b);
    out
}

/// Per-pairing authenticated encryption over the MAC/radio boundary. CCM*
/// itself (key schedule, nonce construction, frame-counter-driven nonce
/// reuse prevention) lives in the MAC/radio driver and is out of scope;
/// this trait is the call-out contract the network layer uses, mirroring the
/// `Radio` trait's relationship to `EndDevice` in the teacher.
pub trait SecurityProvider {
    /// Encrypt and authenticate `plaintext` in place, appending the MIC.
    /// `nonce` is the per-frame nonce constructed by the network layer from
    /// the source address and frame counter. Returns the MIC length written.
    fn ccm_encrypt(
        &mut self,
        key: &LinkKey,
        nonce: &[u8],
        plaintext: &mut [u8],
        mic_out: &mut [u8; MIC_LEN],
    ) -> Result<(), ()>;

    /// Verify and decrypt an authenticated frame in place.
    fn ccm_decrypt(
        &mut self,
        key: &LinkKey,
        nonce: &[u8],
        ciphertext: &mut [u8],
        mic: &[u8; MIC_LEN],
    ) -> Result<(), ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_key_derivation_is_deterministic() {
        let seeds = [[0xAAu8; 16], [0xBBu8; 16], [0xCCu8; 16]];
        let k1 = derive_link_key(&seeds).unwrap();
        let k2 = derive_link_key(&seeds).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn link_key_derivation_distinguishes_seeds() {
        let seeds_a = [[0xAAu8; 16], [0xBBu8; 16], [0xCCu8; 16]];
        let seeds_b = [[0xAAu8; 16], [0xBBu8; 16], [0xCDu8; 16]];
        assert_ne!(
            derive_link_key(&seeds_a).unwrap(),
            derive_link_key(&seeds_b).unwrap()
        );
    }

    #[test]
    fn link_key_derivation_rejects_too_few_seeds() {
        let seeds = [[0xAAu8; 16], [0xBBu8; 16]];
        assert_eq!(
            derive_link_key(&seeds),
            Err(SecurityError::TooFewSeeds { have: 2, need: 3 })
        );
    }
}
