//! The pairing table (`spec.md` §3, §4.1): a fixed-size slotted array of
//! [`PairingEntry`] records, the central persistent record of the stack.

use crate::nv::{id, NvError, NvStore};
use crate::status::Status;
use modular_bitfield::prelude::*;

/// Sentinel pairing-reference value for an unused slot (`spec.md` §3).
pub const INVALID_PAIRING_REF: u8 = 0xFF;

/// Default pairing-table capacity (`spec.md` §6).
pub const DEFAULT_PAIRING_TABLE_SIZE: usize = 10;

/// `RecipientCapabilities` bitfield carried in a pairing entry and exchanged
/// during `NLME-PAIR`.
#[bitfield]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientCapabilities {
    pub target: bool,
    pub power_source: bool,
    pub security_capable: bool,
    pub channel_normalization_capable: bool,
    #[skip]
    __: B4,
}

/// Which profiles this pairing supports, one bit per profile id
/// (`spec.md` §3 "profile-discovery bitfield"). Bit 0 is GDP; profile bits
/// above it are walked in ascending order during configuration
/// (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileDiscs(pub u32);

pub const PROFILE_BIT_GDP: u8 = 0;
pub const PROFILE_BIT_ZID: u8 = 1;
pub const PROFILE_BIT_Z3D: u8 = 2;
pub const PROFILE_BIT_ZRC: u8 = 3;
/// Highest profile bit this core walks during configuration chaining.
pub const PROFILE_BIT_MAX: u8 = 31;

impl ProfileDiscs {
    pub fn is_set(&self, bit: u8) -> bool {
        self.0 & (1 << bit) != 0
    }

    pub fn set(&mut self, bit: u8) {
        self.0 |= 1 << bit;
    }

    /// Next profile bit at or after `from` that is set, scanning upward.
    pub fn next_set_from(&self, from: u8) -> Option<u8> {
        (from..=PROFILE_BIT_MAX).find(|&bit| self.is_set(bit))
    }
}

/// The central persistent record of a paired peer (`spec.md` §3).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingEntry {
    pub pairing_ref: u8,
    pub peer_ieee_address: [u8; 8],
    pub peer_short_address: u16,
    pub peer_pan_id: u16,
    pub logical_channel: u8,
    pub frame_counter: u32,
    pub link_key: [u8; 16],
    pub recipient_capabilities: RecipientCapabilities,
    pub profile_discs: ProfileDiscs,
    /// Device-type list as reported during discovery/pairing; up to 3 types
    /// per RF4CE (`spec.md` §6 minimum node-descriptor count).
    pub device_types: heapless::Vec<u8, 3>,
    pub vendor_id: u16,
}

impl PairingEntry {
    pub fn empty(pairing_ref: u8) -> Self {
        Self {
            pairing_ref,
            peer_ieee_address: [0; 8],
            peer_short_address: 0,
            peer_pan_id: 0,
            logical_channel: 0,
            frame_counter: 0,
            link_key: [0; 16],
            recipient_capabilities: RecipientCapabilities::new(),
            profile_discs: ProfileDiscs::default(),
            device_types: heapless::Vec::new(),
            vendor_id: 0,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingTableError {
    NoPairing,
    NoOrgCapacity,
    InvalidIndex,
    /// A frame counter advance or `install` would move the counter backward.
    FrameCounterRegression,
    Nv,
}

impl From<NvError> for PairingTableError {
    fn from(_: NvError) -> Self {
        PairingTableError::Nv
    }
}

impl From<PairingTableError> for Status {
    fn from(e: PairingTableError) -> Self {
        match e {
            PairingTableError::NoPairing => Status::NoPairing,
            PairingTableError::NoOrgCapacity => Status::NoOrgCapacity,
            PairingTableError::InvalidIndex => Status::InvalidIndex,
            PairingTableError::FrameCounterRegression => Status::InvalidParameter,
            PairingTableError::Nv => Status::Communication,
        }
    }
}

/// Fixed-capacity slotted pairing table, write-through to NV
/// (`spec.md` §4.1).
pub struct PairingTable<const N: usize> {
    slots: [Option<PairingEntry>; N],
}

impl<const N: usize> Default for PairingTable<N> {
    fn default() -> Self {
        Self { slots: [None; N] }
    }
}

impl<const N: usize> PairingTable<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn lookup(&self, pairing_ref: u8) -> Result<&PairingEntry, PairingTableError> {
        self.slots
            .get(pairing_ref as usize)
            .and_then(|s| s.as_ref())
            .ok_or(PairingTableError::NoPairing)
    }

    pub fn lookup_by_ieee(&self, ieee: &[u8; 8]) -> Option<&PairingEntry> {
        self.iter_active().find(|e| &e.peer_ieee_address == ieee)
    }

    /// Install (overwrite) the entry at `entry.pairing_ref`. Frame-counter
    /// reset rule (`spec.md` §4.2): installing over an *empty* slot accepts
    /// any starting counter; installing over an occupied slot for the same
    /// peer must not move the counter backward (`spec.md` §3 invariant).
    pub fn install(
        &mut self,
        nv: &mut impl NvStore,
        entry: PairingEntry,
    ) -> Result<(), PairingTableError> {
        let idx = entry.pairing_ref as usize;
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or(PairingTableError::InvalidIndex)?;

        if let Some(existing) = slot {
            if existing.peer_ieee_address == entry.peer_ieee_address
                && entry.frame_counter < existing.frame_counter
            {
                return Err(PairingTableError::FrameCounterRegression);
            }
        }

        Self::persist(nv, &entry)?;
        *slot = Some(entry);
        Ok(())
    }

    /// Allocate the lowest-numbered free slot for a new pairing.
    pub fn allocate(&self) -> Result<u8, PairingTableError> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(|i| i as u8)
            .ok_or(PairingTableError::NoOrgCapacity)
    }

    pub fn clear(
        &mut self,
        nv: &mut impl NvStore,
        pairing_ref: u8,
    ) -> Result<(), PairingTableError> {
        let idx = pairing_ref as usize;
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or(PairingTableError::InvalidIndex)?;
        *slot = None;
        nv.delete(id::pairing_slot(pairing_ref))?;
        Ok(())
    }

    pub fn advance_frame_counter(
        &mut self,
        nv: &mut impl NvStore,
        pairing_ref: u8,
        new_counter: u32,
    ) -> Result<(), PairingTableError> {
        let idx = pairing_ref as usize;
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or(PairingTableError::InvalidIndex)?;
        let entry = slot.as_mut().ok_or(PairingTableError::NoPairing)?;
        if new_counter < entry.frame_counter {
            return Err(PairingTableError::FrameCounterRegression);
        }
        entry.frame_counter = new_counter;
        let snapshot = *entry;
        Self::persist(nv, &snapshot)?;
        Ok(())
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &PairingEntry> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    fn persist(nv: &mut impl NvStore, entry: &PairingEntry) -> Result<(), PairingTableError> {
        let mut buf = [0u8; 40];
        let n = encode_entry(entry, &mut buf);
        nv.write(id::pairing_slot(entry.pairing_ref), &buf[..n])?;
        Ok(())
    }
}

/// Pointer-free wire encoding of a pairing entry, used both for NV
/// persistence and for the marshalling layer.
pub fn encode_entry(entry: &PairingEntry, buf: &mut [u8]) -> usize {
    let mut i = 0;
    buf[i] = entry.pairing_ref;
    i += 1;
    buf[i..i + 8].copy_from_slice(&entry.peer_ieee_address);
    i += 8;
    buf[i..i + 2].copy_from_slice(&entry.peer_short_address.to_le_bytes());
    i += 2;
    buf[i..i + 2].copy_from_slice(&entry.peer_pan_id.to_le_bytes());
    i += 2;
    buf[i] = entry.logical_channel;
    i += 1;
    buf[i..i + 4].copy_from_slice(&entry.frame_counter.to_le_bytes());
    i += 4;
    buf[i..i + 16].copy_from_slice(&entry.link_key);
    i += 16;
    buf[i] = entry.recipient_capabilities.bytes[0];
    i += 1;
    buf[i..i + 4].copy_from_slice(&entry.profile_discs.0.to_le_bytes());
    i += 4;
    buf[i] = entry.device_types.len() as u8;
    i += 1;
    for dt in entry.device_types.iter() {
        buf[i] = *dt;
        i += 1;
    }
    buf[i..i + 2].copy_from_slice(&entry.vendor_id.to_le_bytes());
    i += 2;
    i
}

pub fn decode_entry(buf: &[u8]) -> Option<PairingEntry> {
    if buf.len() < 39 {
        return None;
    }
    let mut i = 0;
    let pairing_ref = buf[i];
    i += 1;
    let mut peer_ieee_address = [0u8; 8];
    peer_ieee_address.copy_from_slice(&buf[i..i + 8]);
    i += 8;
    let peer_short_address = u16::from_le_bytes(buf[i..i + 2].try_into().ok()?);
    i += 2;
    let peer_pan_id = u16::from_le_bytes(buf[i..i + 2].try_into().ok()?);
    i += 2;
    let logical_channel = buf[i];
    i += 1;
    let frame_counter = u32::from_le_bytes(buf[i..i + 4].try_into().ok()?);
    i += 4;
    let mut link_key = [0u8; 16];
    link_key.copy_from_slice(&buf[i..i + 16]);
    i += 16;
    let recipient_capabilities = RecipientCapabilities::from_bytes([buf[i]]);
    i += 1;
    let profile_discs = ProfileDiscs(u32::from_le_bytes(buf[i..i + 4].try_into().ok()?));
    i += 4;
    let n_dt = buf[i] as usize;
    i += 1;
    let mut device_types = heapless::Vec::new();
    for _ in 0..n_dt {
        let _ = device_types.push(*buf.get(i)?);
        i += 1;
    }
    let vendor_id = u16::from_le_bytes(buf.get(i..i + 2)?.try_into().ok()?);

    Some(PairingEntry {
        pairing_ref,
        peer_ieee_address,
        peer_short_address,
        peer_pan_id,
        logical_channel,
        frame_counter,
        link_key,
        recipient_capabilities,
        profile_discs,
        device_types,
        vendor_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nv::MemoryNvStore;

    fn sample_entry(pairing_ref: u8) -> PairingEntry {
        let mut e = PairingEntry::empty(pairing_ref);
        e.peer_ieee_address = [1, 2, 3, 4, 5, 6, 7, 8];
        e.frame_counter = 10;
        e.vendor_id = 0x1234;
        let _ = e.device_types.push(5);
        e
    }

    #[test]
    fn install_then_lookup() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut table: PairingTable<DEFAULT_PAIRING_TABLE_SIZE> = PairingTable::new();
        table.install(&mut nv, sample_entry(0)).unwrap();
        let got = table.lookup(0).unwrap();
        assert_eq!(got.vendor_id, 0x1234);
        assert_eq!(got.frame_counter, 10);
    }

    #[test]
    fn lookup_missing_is_no_pairing() {
        let table: PairingTable<DEFAULT_PAIRING_TABLE_SIZE> = PairingTable::new();
        assert_eq!(table.lookup(0), Err(PairingTableError::NoPairing));
    }

    #[test]
    fn frame_counter_cannot_regress_on_install() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut table: PairingTable<DEFAULT_PAIRING_TABLE_SIZE> = PairingTable::new();
        table.install(&mut nv, sample_entry(0)).unwrap();
        let mut regressed = sample_entry(0);
        regressed.frame_counter = 3;
        assert_eq!(
            table.install(&mut nv, regressed),
            Err(PairingTableError::FrameCounterRegression)
        );
    }

    #[test]
    fn frame_counter_monotonic_after_clear_and_reinstall() {
        // invariant 1 (spec.md §8): after any sequence of pair/unpair, the
        // visible entry at slot r either is empty or has pairing_ref == r
        // with a non-decreasing counter across runs (a fresh peer resets).
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut table: PairingTable<DEFAULT_PAIRING_TABLE_SIZE> = PairingTable::new();
        table.install(&mut nv, sample_entry(0)).unwrap();
        table.advance_frame_counter(&mut nv, 0, 20).unwrap();
        assert_eq!(table.lookup(0).unwrap().frame_counter, 20);
        table.clear(&mut nv, 0).unwrap();
        assert_eq!(table.lookup(0), Err(PairingTableError::NoPairing));

        let mut fresh = sample_entry(0);
        fresh.peer_ieee_address = [9; 8];
        fresh.frame_counter = 0;
        table.install(&mut nv, fresh).unwrap();
        assert_eq!(table.lookup(0).unwrap().pairing_ref, 0);
    }

    #[test]
    fn frame_counter_cannot_regress_on_advance() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut table: PairingTable<DEFAULT_PAIRING_TABLE_SIZE> = PairingTable::new();
        table.install(&mut nv, sample_entry(0)).unwrap();
        assert_eq!(
            table.advance_frame_counter(&mut nv, 0, 1),
            Err(PairingTableError::FrameCounterRegression)
        );
    }

    #[test]
    fn allocate_picks_lowest_free_slot() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut table: PairingTable<4> = PairingTable::new();
        assert_eq!(table.allocate().unwrap(), 0);
        table.install(&mut nv, sample_entry(0)).unwrap();
        assert_eq!(table.allocate().unwrap(), 1);
    }

    #[test]
    fn entry_roundtrips_through_wire_encoding() {
        let e = sample_entry(2);
        let mut buf = [0u8; 40];
        let n = encode_entry(&e, &mut buf);
        let decoded = decode_entry(&buf[..n]).unwrap();
        assert_eq!(decoded, e);
    }
}
