//! ZID Adapter role (`spec.md` §4.8): consumes (and optionally proxies to
//! USB HID) a paired Class Device's reports.

use super::common::{
    consts, NonStdDescError, NonStdDescReassembly, PairInfo, ResponseWaitTimer,
    WriteValidationError,
};
use super::report::{ReportId, ReportRecord};
use crate::nv::{id, NvError, NvStore};
use crate::profile::gdp::GenericResponse;
use core::time::Duration;
use heapless::Vec;

/// Sub-states (`spec.md` §4.8).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaState {
    Dor,
    Cfg,
    Unpair,
    Rdy,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaError {
    ConfigurationFailed,
    NotReady,
    Nv,
}

impl From<ProxyTableError> for AdaError {
    fn from(_: ProxyTableError) -> Self {
        AdaError::Nv
    }
}

pub const MAX_STD_DESC_COMPONENTS: usize = 12;
pub const MAX_NON_STD_DESC_COMPONENTS: usize = 4;

/// The Adapter's cached view of a paired Class Device's HID capabilities
/// (`spec.md` glossary "Proxy entry").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    pub hid_parser_version: u16,
    pub device_release: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub hid_subclass: u8,
    pub protocol_code: u8,
    pub country_code: u8,
    pub num_endpoints: u8,
    pub poll_interval: u8,
    pub std_desc_components: Vec<u8, MAX_STD_DESC_COMPONENTS>,
    pub num_non_std_desc_components: u8,
    pub num_null_reports: u8,
    pub current_idle_rate: u8,
    pub current_protocol: u8,
}

impl ProxyEntry {
    pub fn empty() -> Self {
        Self {
            hid_parser_version: 0x0100,
            device_release: 0,
            vendor_id: 0,
            product_id: 0,
            hid_subclass: 0,
            protocol_code: 0,
            country_code: 0,
            num_endpoints: 0,
            poll_interval: 1,
            std_desc_components: Vec::new(),
            num_non_std_desc_components: 0,
            num_null_reports: 0,
            current_idle_rate: 0,
            current_protocol: 1,
        }
    }
}

/// Pointer-free wire encoding of a proxy entry, used both for NV persistence
/// and for the marshalling layer (`crate::pairing::encode_entry` is the
/// sibling for pairing entries).
pub fn encode_proxy_entry(entry: &ProxyEntry, buf: &mut [u8]) -> usize {
    let mut i = 0;
    buf[i..i + 2].copy_from_slice(&entry.hid_parser_version.to_le_bytes());
    i += 2;
    buf[i..i + 2].copy_from_slice(&entry.device_release.to_le_bytes());
    i += 2;
    buf[i..i + 2].copy_from_slice(&entry.vendor_id.to_le_bytes());
    i += 2;
    buf[i..i + 2].copy_from_slice(&entry.product_id.to_le_bytes());
    i += 2;
    buf[i] = entry.hid_subclass;
    i += 1;
    buf[i] = entry.protocol_code;
    i += 1;
    buf[i] = entry.country_code;
    i += 1;
    buf[i] = entry.num_endpoints;
    i += 1;
    buf[i] = entry.poll_interval;
    i += 1;
    buf[i] = entry.std_desc_components.len() as u8;
    i += 1;
    for c in entry.std_desc_components.iter() {
        buf[i] = *c;
        i += 1;
    }
    buf[i] = entry.num_non_std_desc_components;
    i += 1;
    buf[i] = entry.num_null_reports;
    i += 1;
    buf[i] = entry.current_idle_rate;
    i += 1;
    buf[i] = entry.current_protocol;
    i += 1;
    i
}

pub fn decode_proxy_entry(buf: &[u8]) -> Option<ProxyEntry> {
    if buf.len() < 14 {
        return None;
    }
    let mut i = 0;
    let hid_parser_version = u16::from_le_bytes(buf[i..i + 2].try_into().ok()?);
    i += 2;
    let device_release = u16::from_le_bytes(buf[i..i + 2].try_into().ok()?);
    i += 2;
    let vendor_id = u16::from_le_bytes(buf[i..i + 2].try_into().ok()?);
    i += 2;
    let product_id = u16::from_le_bytes(buf[i..i + 2].try_into().ok()?);
    i += 2;
    let hid_subclass = buf[i];
    i += 1;
    let protocol_code = buf[i];
    i += 1;
    let country_code = buf[i];
    i += 1;
    let num_endpoints = buf[i];
    i += 1;
    let poll_interval = buf[i];
    i += 1;
    let n_desc = buf[i] as usize;
    i += 1;
    let mut std_desc_components = Vec::new();
    for _ in 0..n_desc {
        let _ = std_desc_components.push(*buf.get(i)?);
        i += 1;
    }
    let num_non_std_desc_components = *buf.get(i)?;
    i += 1;
    let num_null_reports = *buf.get(i)?;
    i += 1;
    let current_idle_rate = *buf.get(i)?;
    i += 1;
    let current_protocol = *buf.get(i)?;

    Some(ProxyEntry {
        hid_parser_version,
        device_release,
        vendor_id,
        product_id,
        hid_subclass,
        protocol_code,
        country_code,
        num_endpoints,
        poll_interval,
        std_desc_components,
        num_non_std_desc_components,
        num_null_reports,
        current_idle_rate,
        current_protocol,
    })
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyTableError {
    InvalidIndex,
    NoEntry,
    Nv,
}

impl From<NvError> for ProxyTableError {
    fn from(_: NvError) -> Self {
        ProxyTableError::Nv
    }
}

/// The aggregate proxy table (`spec.md` §4.8, the original
/// `zid_adaptor.h`'s per-pairing proxy-entry registry, e.g.
/// `zidAda_RemoveFromProxyTable`): one committed [`ProxyEntry`] per pairing
/// slot, write-through to NV, parallel to `crate::pairing::PairingTable`.
pub struct ProxyTable<const N: usize> {
    slots: [Option<ProxyEntry>; N],
}

impl<const N: usize> Default for ProxyTable<N> {
    fn default() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }
}

impl<const N: usize> ProxyTable<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn lookup(&self, pairing_ref: u8) -> Result<&ProxyEntry, ProxyTableError> {
        self.slots
            .get(pairing_ref as usize)
            .and_then(|s| s.as_ref())
            .ok_or(ProxyTableError::NoEntry)
    }

    /// Commit a configured proxy entry for `pairing_ref`
    /// (`spec.md` §4.8 `CFG_COMPLETE` success path: "commit proxy-entry to
    /// NV, add pairing to proxy-table").
    pub fn insert(
        &mut self,
        nv: &mut impl NvStore,
        pairing_ref: u8,
        entry: ProxyEntry,
    ) -> Result<(), ProxyTableError> {
        let idx = pairing_ref as usize;
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or(ProxyTableError::InvalidIndex)?;
        Self::persist(nv, pairing_ref, &entry)?;
        *slot = Some(entry);
        Ok(())
    }

    /// `zidAda_RemoveFromProxyTable`: free the slot and its NV-persisted
    /// entry, used on unpair (`spec.md` §4.8, §8 property 2's converse).
    pub fn remove(
        &mut self,
        nv: &mut impl NvStore,
        pairing_ref: u8,
    ) -> Result<(), ProxyTableError> {
        let idx = pairing_ref as usize;
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or(ProxyTableError::InvalidIndex)?;
        *slot = None;
        nv.delete(id::zid_proxy_entry(pairing_ref))?;
        Ok(())
    }

    fn persist(
        nv: &mut impl NvStore,
        pairing_ref: u8,
        entry: &ProxyEntry,
    ) -> Result<(), ProxyTableError> {
        let mut buf = [0u8; 40];
        let n = encode_proxy_entry(entry, &mut buf);
        nv.write(id::zid_proxy_entry(pairing_ref), &buf[..n])?;
        Ok(())
    }
}

/// A NULL report provisioned during configuration (`spec.md` §4.6, §4.8);
/// up to 16 bytes per `spec.md` §6's largest standard report.
pub struct NullReport {
    pub report_id: u8,
    pub data: Vec<u8, 16>,
}

/// Which configuration discretes remain outstanding for a pairing's
/// configuration (`spec.md` §4.8: cleared as Push-Attributes records and
/// non-std-descriptor components complete).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedDiscretes {
    pub proxy_entry: bool,
    pub std_desc_components: bool,
    pub non_std_desc_components_remaining: u8,
}

impl ExpectedDiscretes {
    pub fn new_full(non_std_desc_components: u8) -> Self {
        Self {
            proxy_entry: true,
            std_desc_components: true,
            non_std_desc_components_remaining: non_std_desc_components,
        }
    }

    pub fn all_clear(&self) -> bool {
        !self.proxy_entry
            && !self.std_desc_components
            && self.non_std_desc_components_remaining == 0
    }
}

/// Drives one pairing's Adapter configuration sequence and runtime report
/// handling (`spec.md` §4.8).
pub struct AdapterPairing {
    pairing_ref: u8,
    pub state: AdaState,
    pub proxy_entry: ProxyEntry,
    pub expected: ExpectedDiscretes,
    pub rsp_wait: ResponseWaitTimer,
    non_std_desc_reassembly: NonStdDescReassembly,
    committed_non_std_descs: Vec<Vec<u8, { consts::MAX_NON_STD_DESC_COMP_SIZE }>, MAX_NON_STD_DESC_COMPONENTS>,
    last_report: Option<(u8, Vec<u8, 16>)>,
    last_report_at: Option<Duration>,
    idle_rate_guard_fired: bool,
}

impl AdapterPairing {
    /// `AllowPairCnf` with ZID bit set (`spec.md` §4.8): reserve a proxy
    /// slot, initialize defaults, set all expected discretes, clear
    /// `cfg_complete_disc[pair]`, set `adapter_disc[pair]`, enter `eAdaCfg`,
    /// arm response-wait at `2 x aplcMaxConfigWaitTime`.
    pub fn on_allow_pair_cnf(
        pairing_ref: u8,
        non_std_desc_components: u8,
        now: Duration,
        pair_info: &mut PairInfo,
        nv: &mut impl NvStore,
    ) -> Result<Self, AdaError> {
        pair_info.set_adapter(pairing_ref);
        pair_info.clear_cfg_complete(pairing_ref);
        pair_info.persist(nv).map_err(|_| AdaError::Nv)?;

        let mut rsp_wait = ResponseWaitTimer::new();
        rsp_wait.arm(now, consts::MAX_CONFIG_WAIT_TIME * 2);
        Ok(Self {
            pairing_ref,
            state: AdaState::Cfg,
            proxy_entry: ProxyEntry::empty(),
            expected: ExpectedDiscretes::new_full(non_std_desc_components),
            rsp_wait,
            non_std_desc_reassembly: NonStdDescReassembly::new(),
            committed_non_std_descs: Vec::new(),
            last_report: None,
            last_report_at: None,
            idle_rate_guard_fired: false,
        })
    }

    pub fn pairing_ref(&self) -> u8 {
        self.pairing_ref
    }

    /// Handle one Push-Attributes record for the `ProxyEntry` fields
    /// (`spec.md` §4.8): bounds-validate and clear the corresponding
    /// discrete. Each accepted push rearms the 300 ms wait.
    pub fn on_push_proxy_entry(
        &mut self,
        entry: ProxyEntry,
        now: Duration,
    ) -> Result<(), AdaError> {
        if !matches!(self.state, AdaState::Cfg) {
            return Err(AdaError::ConfigurationFailed);
        }
        if entry.poll_interval < consts::POLL_INTERVAL_MIN {
            return Err(AdaError::ConfigurationFailed);
        }
        self.proxy_entry = entry;
        self.expected.proxy_entry = false;
        self.expected.std_desc_components = false;
        self.rsp_wait.arm(now, consts::MAX_CONFIG_WAIT_TIME);
        Ok(())
    }

    /// Feed one non-std-descriptor fragment through the common reassembly
    /// machinery; on a malformed fragment, the caller must unpair and
    /// terminate configuration (`spec.md` §4.8, §8 "Malformed fragment").
    pub fn on_push_non_std_desc_fragment(
        &mut self,
        fragment_id: u8,
        report_id: u8,
        declared_size: u16,
        data: &[u8],
        now: Duration,
    ) -> Result<Option<GenericResponse>, NonStdDescError> {
        let complete = self
            .non_std_desc_reassembly
            .offer_fragment(fragment_id, report_id, declared_size, data)?;
        if let Some(bytes) = complete {
            let mut v = Vec::new();
            let _ = v.extend_from_slice(bytes);
            let _ = self.committed_non_std_descs.push(v);
            self.non_std_desc_reassembly.reset();
            if self.expected.non_std_desc_components_remaining > 0 {
                self.expected.non_std_desc_components_remaining -= 1;
            }
            self.rsp_wait.arm(now, consts::MAX_CONFIG_WAIT_TIME);
            return Ok(Some(GenericResponse::Success));
        }
        Ok(None)
    }

    /// `SET_REPORT` with `type=IN` for a non-std report id during
    /// configuration is NULL-report provisioning (`spec.md` §4.8).
    pub fn on_set_report_null_provisioning(&mut self, now: Duration) {
        self.rsp_wait.arm(now, consts::MAX_CONFIG_WAIT_TIME);
    }

    /// `CFG_COMPLETE` (`spec.md` §4.8): verify all expected discretes are
    /// clear; on success set `cfg_complete_disc[pair]`, commit the proxy
    /// entry to NV, add the pairing to the proxy table, and move to
    /// `eAdaRdy`. On failure the caller must unpair.
    pub fn on_cfg_complete<const N: usize>(
        &mut self,
        table: &mut ProxyTable<N>,
        pair_info: &mut PairInfo,
        nv: &mut impl NvStore,
    ) -> Result<(), AdaError> {
        if !self.expected.all_clear() {
            self.state = AdaState::Unpair;
            return Err(AdaError::ConfigurationFailed);
        }
        table.insert(nv, self.pairing_ref, self.proxy_entry.clone())?;
        pair_info.set_cfg_complete(self.pairing_ref);
        pair_info.persist(nv).map_err(|_| AdaError::Nv)?;
        self.state = AdaState::Rdy;
        Ok(())
    }

    /// Configuration failed, or the pairing was otherwise torn down
    /// (`spec.md` §4.8, §8 "Configuration failures... trigger unpair"):
    /// remove the committed proxy entry and clear both `PairInfo`
    /// discretes for this slot.
    pub fn on_unpair<const N: usize>(
        &mut self,
        table: &mut ProxyTable<N>,
        pair_info: &mut PairInfo,
        nv: &mut impl NvStore,
    ) {
        self.state = AdaState::Unpair;
        pair_info.clear(self.pairing_ref);
        let _ = pair_info.persist(nv);
        let _ = table.remove(nv, self.pairing_ref);
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, AdaState::Rdy)
    }

    /// A Report-Data frame arrived from the paired Class Device
    /// (`spec.md` §4.8): only valid once configuration has completed;
    /// keyboard reports must carry security.
    pub fn on_report_data(
        &mut self,
        report_id: u8,
        data: &[u8],
        was_secured: bool,
        now: Duration,
    ) -> Result<(), AdaError> {
        if !self.is_ready() {
            return Err(AdaError::NotReady);
        }
        if report_id == ReportId::Keyboard as u8 && !was_secured {
            return Err(AdaError::ConfigurationFailed);
        }
        let mut v = Vec::new();
        let _ = v.extend_from_slice(data);
        self.last_report = Some((report_id, v));
        self.last_report_at = Some(now);
        self.idle_rate_guard_fired = false;
        Ok(())
    }

    /// Idle-rate-guard check (`spec.md` §4.8, §8 property 5): if no report
    /// has arrived for `aplcIdleRateGuardTime` since the last non-idle-rate
    /// -zero push, synthesize the cached NULL report for the last-seen
    /// report id exactly once.
    pub fn poll_idle_rate_guard(&mut self, now: Duration) -> Option<ReportRecord> {
        if self.proxy_entry.current_idle_rate == 0 || self.idle_rate_guard_fired {
            return None;
        }
        let (report_id, last_at) = match (self.last_report.as_ref(), self.last_report_at) {
            (Some((id, _)), Some(at)) => (*id, at),
            _ => return None,
        };
        if now < last_at + consts::IDLE_RATE_GUARD_TIME {
            return None;
        }
        self.idle_rate_guard_fired = true;
        let data = self
            .last_report
            .as_ref()
            .map(|(_, d)| d.clone())
            .unwrap_or_default();
        Some(ReportRecord {
            report_type: super::report::ReportType::In,
            id: report_id,
            data,
        })
    }

    pub fn read_proxy_entry(&self) -> &ProxyEntry {
        &self.proxy_entry
    }

    pub fn write_current_idle_rate(&mut self, rate: u8) -> Result<(), WriteValidationError> {
        self.proxy_entry.current_idle_rate = rate;
        Ok(())
    }

    /// §8 property 2: the proxy-entry's declared non-std-descriptor count
    /// must match the number of committed components once configuration is
    /// complete.
    pub fn committed_non_std_desc_count(&self) -> usize {
        self.committed_non_std_descs.len()
    }

    pub fn read_committed_non_std_desc(&self, index: usize) -> Option<&[u8]> {
        self.committed_non_std_descs.get(index).map(|v| v.as_slice())
    }
}
