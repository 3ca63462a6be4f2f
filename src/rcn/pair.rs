//! The pairing protocol (`spec.md` §4.2, §4.4): provisional pairing
//! reference, CCM*-protected key-seed exchange, and final `PairingEntry`
//! installation.

use crate::nv::NvStore;
use crate::pairing::{
    PairingEntry, PairingTable, PairingTableError, DEFAULT_PAIRING_TABLE_SIZE,
    INVALID_PAIRING_REF,
};
use crate::security::{self, LinkKey, SecurityError, MAX_KEY_EXCHANGE_TRANSFER_COUNT};
use crate::status::Status;
use heapless::Vec;

const MAX_KEY_EXCHANGE_TRANSFER_COUNT_USIZE: usize = MAX_KEY_EXCHANGE_TRANSFER_COUNT as usize;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairProtocolError {
    /// A key-seed arrived referencing a provisional pairing that does not
    /// exist (stale, or never allocated).
    NoProvisionalPairing,
    /// Seeds were received out of the `0..transfer_count` range, or duplicate
    /// seed indices arrived.
    InvalidSeedIndex,
    Security(SecurityError),
    Table(PairingTableError),
}

impl From<SecurityError> for PairProtocolError {
    fn from(e: SecurityError) -> Self {
        PairProtocolError::Security(e)
    }
}

impl From<PairingTableError> for PairProtocolError {
    fn from(e: PairingTableError) -> Self {
        PairProtocolError::Table(e)
    }
}

impl From<PairProtocolError> for Status {
    fn from(e: PairProtocolError) -> Self {
        match e {
            PairProtocolError::NoProvisionalPairing => Status::NoPairing,
            PairProtocolError::InvalidSeedIndex => Status::InvalidParameter,
            PairProtocolError::Security(SecurityError::TooFewSeeds { .. }) => {
                Status::SecurityTimeout
            }
            PairProtocolError::Security(SecurityError::TooManySeeds { .. }) => {
                Status::InvalidParameter
            }
            PairProtocolError::Table(e) => e.into(),
        }
    }
}

/// A provisional pairing reference, created on `NLME-PAIR.indication` accept
/// or on `NLME-PAIR.request`, and released if the key-seed exchange does not
/// complete within `aplcMinKeyExchangeTransferCount` seeds
/// (`spec.md` §4.2, §4.4).
pub struct ProvisionalPairing {
    pub pairing_ref: u8,
    entry: PairingEntry,
    transfer_count: u8,
    seeds: Vec<[u8; 16], MAX_KEY_EXCHANGE_TRANSFER_COUNT_USIZE>,
}

impl ProvisionalPairing {
    /// Start a provisional pairing over `pairing_ref`, with the peer's
    /// identity already known from discovery/pairing indication, expecting
    /// `transfer_count` key-exchange seeds (`>= aplcMinKeyExchangeTransferCount`,
    /// enforced at [`security::derive_link_key`] time).
    pub fn new(pairing_ref: u8, mut entry: PairingEntry, transfer_count: u8) -> Self {
        entry.pairing_ref = pairing_ref;
        Self {
            pairing_ref,
            entry,
            transfer_count,
            seeds: Vec::new(),
        }
    }

    /// Record one incoming key-exchange seed frame. Returns `true` once all
    /// `transfer_count` seeds have arrived and the link key can be derived.
    pub fn offer_seed(
        &mut self,
        index: u8,
        seed: [u8; 16],
    ) -> Result<bool, PairProtocolError> {
        if index >= self.transfer_count || index as usize != self.seeds.len() {
            return Err(PairProtocolError::InvalidSeedIndex);
        }
        self.seeds
            .push(seed)
            .map_err(|_| PairProtocolError::InvalidSeedIndex)?;
        Ok(self.seeds.len() == self.transfer_count as usize)
    }

    /// Derive the link key from the seeds collected so far and finish the
    /// pairing, installing the entry into `table`. Consumes `self`: a
    /// provisional pairing is either finalized or dropped, never reused.
    pub fn finish(
        self,
        nv: &mut impl NvStore,
        table: &mut PairingTable<DEFAULT_PAIRING_TABLE_SIZE>,
    ) -> Result<LinkKey, PairProtocolError> {
        let key = security::derive_link_key(&self.seeds)?;
        let mut entry = self.entry;
        entry.link_key = key;
        table.install(nv, entry)?;
        Ok(key)
    }
}

/// Allocate a provisional pairing reference ahead of the key-exchange
/// handshake (`spec.md` §4.2): taken from the pairing table's free-slot
/// search, or [`INVALID_PAIRING_REF`] if the table is full
/// (`Status::NoOrgCapacity`).
pub fn allocate_provisional_ref<const N: usize>(table: &PairingTable<N>) -> u8 {
    table.allocate().unwrap_or(INVALID_PAIRING_REF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nv::MemoryNvStore;
    use crate::pairing::DEFAULT_PAIRING_TABLE_SIZE;

    fn peer_entry() -> PairingEntry {
        let mut e = PairingEntry::empty(0);
        e.peer_ieee_address = [7; 8];
        e.vendor_id = 0x1014;
        e
    }

    #[test]
    fn completes_after_min_transfer_count_seeds() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut table: PairingTable<DEFAULT_PAIRING_TABLE_SIZE> = PairingTable::new();
        let pairing_ref = allocate_provisional_ref(&table);
        let mut prov = ProvisionalPairing::new(pairing_ref, peer_entry(), 3);

        assert!(!prov.offer_seed(0, [0xAA; 16]).unwrap());
        assert!(!prov.offer_seed(1, [0xBB; 16]).unwrap());
        assert!(prov.offer_seed(2, [0xCC; 16]).unwrap());

        let key = prov.finish(&mut nv, &mut table).unwrap();
        let installed = table.lookup(pairing_ref).unwrap();
        assert_eq!(installed.link_key, key);
        assert_eq!(installed.peer_ieee_address, [7; 8]);
    }

    #[test]
    fn out_of_order_seed_index_rejected() {
        let mut prov = ProvisionalPairing::new(0, peer_entry(), 3);
        assert!(prov.offer_seed(0, [0xAA; 16]).is_ok());
        assert_eq!(
            prov.offer_seed(2, [0xCC; 16]),
            Err(PairProtocolError::InvalidSeedIndex)
        );
    }

    #[test]
    fn finishing_with_too_few_seeds_fails_key_derivation() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut table: PairingTable<DEFAULT_PAIRING_TABLE_SIZE> = PairingTable::new();
        let prov = ProvisionalPairing::new(0, peer_entry(), 3);
        // No seeds offered; finish() should surface the security layer's
        // too-few-seeds rejection rather than silently installing a
        // zero-derived key.
        assert_eq!(
            prov.finish(&mut nv, &mut table),
            Err(PairProtocolError::Security(SecurityError::TooFewSeeds {
                have: 0,
                need: 3
            }))
        );
    }
}
