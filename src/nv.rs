//! Non-volatile storage: external collaborator interface and the stable
//! item-id layout this crate writes through it.
//!
//! The store itself (coalescing, compaction, wear-levelling) is out of scope
//! (`spec.md` §1) — `NvStore` is the seam, mirroring how
//! `codyps_lorawan::device::Radio` is the seam for the MAC/radio below the
//! LoRaWAN protocol layer. Every NV item occupies a single stable id
//! (`spec.md` §6); ids are allocated here from non-overlapping ranges per
//! component, matching the original `GDP_NVID_BEG`-style per-component
//! allocation scheme.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvError {
    /// The underlying store reported a write failure. Callers may retry
    /// (`spec.md` §4.9); the cold-boot idempotent-rewrite scheme tolerates a
    /// crash mid-write without losing defaults.
    OperFailed,
    ItemNotFound,
    BufferTooSmall { have: usize, need: usize },
}

/// A stable NV item identifier. Values are namespaced by component so that
/// two components never collide; see the `id` submodule constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NvItemId(pub u16);

/// Numeric item-id space, one constant or base per persisted structure in
/// `spec.md` §6. Pairing-table slots and per-component descriptor/null-report
/// items are addressed as `base + index`.
pub mod id {
    use super::NvItemId;

    pub const BOOT_FLAG: NvItemId = NvItemId(0x0001);
    pub const STARTUP_CONTROL: NvItemId = NvItemId(0x0002);
    pub const NIB: NvItemId = NvItemId(0x0003);
    pub const IEEE_ADDRESS: NvItemId = NvItemId(0x0004);

    pub const PAIRING_TABLE_BASE: u16 = 0x0100;
    pub const PAIRING_SLOT_MAX: u16 = 0x00FF;

    pub const ZID_PAIR_INFO: NvItemId = NvItemId(0x0200);

    pub const ZID_PROXY_ENTRY_BASE: u16 = 0x0300;
    pub const ZID_NON_STD_DESC_BASE: u16 = 0x0400;
    pub const ZID_NULL_REPORT_BASE: u16 = 0x0500;
    pub const ZID_CLD_CFG_BASE: u16 = 0x0600;

    pub const fn pairing_slot(index: u8) -> NvItemId {
        NvItemId(PAIRING_TABLE_BASE + index as u16)
    }

    pub const fn zid_proxy_entry(index: u8) -> NvItemId {
        NvItemId(ZID_PROXY_ENTRY_BASE + index as u16)
    }

    pub const fn zid_non_std_desc(pair_index: u8, component: u8) -> NvItemId {
        NvItemId(ZID_NON_STD_DESC_BASE + (pair_index as u16) * 8 + component as u16)
    }

    pub const fn zid_null_report(pair_index: u8, component: u8) -> NvItemId {
        NvItemId(ZID_NULL_REPORT_BASE + (pair_index as u16) * 8 + component as u16)
    }

    pub const fn zid_cld_cfg(pair_index: u8) -> NvItemId {
        NvItemId(ZID_CLD_CFG_BASE + pair_index as u16)
    }
}

/// Cold-boot vs. warm-boot marker (`spec.md` §4.4, §4.9).
///
/// Cold boot is detected by the *absence* of the warm-boot marker; re-running
/// cold-boot init is idempotent, so a crash mid-write during initial
/// programming never loses defaults.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootFlag {
    Cold,
    Warm,
}

impl BootFlag {
    const WARM_MARKER: u8 = 0xA5;

    pub fn from_byte(b: Option<u8>) -> Self {
        match b {
            Some(Self::WARM_MARKER) => BootFlag::Warm,
            _ => BootFlag::Cold,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            BootFlag::Warm => Self::WARM_MARKER,
            BootFlag::Cold => 0xFF,
        }
    }
}

/// `startup_control` NV item (`spec.md` §4.4).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StartupControl {
    RestoreState = 0,
    ClearState = 1,
    ClearConfigClearState = 2,
}

impl StartupControl {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => StartupControl::ClearState,
            2 => StartupControl::ClearConfigClearState,
            _ => StartupControl::RestoreState,
        }
    }
}

/// External NV collaborator. Reads/writes within a handler are treated as
/// atomic but potentially slow (`spec.md` §5); no event is serviced while one
/// is in flight.
pub trait NvStore {
    fn read(&mut self, id: NvItemId, buf: &mut [u8]) -> Result<usize, NvError>;
    fn write(&mut self, id: NvItemId, buf: &[u8]) -> Result<(), NvError>;
    fn delete(&mut self, id: NvItemId) -> Result<(), NvError>;
    fn exists(&self, id: NvItemId) -> bool;
}

/// A fixed-capacity in-memory `NvStore`, used by tests and by hosts without a
/// durable flash page (the teacher's `Radio`/`Clock` external traits are
/// likewise given plain in-memory stand-ins in its own test suite).
#[derive(Debug, Default)]
pub struct MemoryNvStore<const N: usize> {
    items: heapless::FnvIndexMap<u16, heapless::Vec<u8, 64>, N>,
}

impl<const N: usize> MemoryNvStore<N> {
    pub fn new() -> Self {
        Self {
            items: heapless::FnvIndexMap::new(),
        }
    }
}

impl<const N: usize> NvStore for MemoryNvStore<N> {
    fn read(&mut self, id: NvItemId, buf: &mut [u8]) -> Result<usize, NvError> {
        let item = self.items.get(&id.0).ok_or(NvError::ItemNotFound)?;
        if buf.len() < item.len() {
            return Err(NvError::BufferTooSmall {
                have: buf.len(),
                need: item.len(),
            });
        }
        buf[..item.len()].copy_from_slice(item);
        Ok(item.len())
    }

    fn write(&mut self, id: NvItemId, buf: &[u8]) -> Result<(), NvError> {
        let mut v = heapless::Vec::new();
        v.extend_from_slice(buf).map_err(|_| NvError::OperFailed)?;
        self.items.remove(&id.0);
        self.items
            .insert(id.0, v)
            .map_err(|_| NvError::OperFailed)?;
        Ok(())
    }

    fn delete(&mut self, id: NvItemId) -> Result<(), NvError> {
        self.items.remove(&id.0);
        Ok(())
    }

    fn exists(&self, id: NvItemId) -> bool {
        self.items.contains_key(&id.0)
    }
}
