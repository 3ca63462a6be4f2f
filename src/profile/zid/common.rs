//! ZID common machinery shared by Class-Device and Adapter roles
//! (`spec.md` §4.6).

use crate::nv::{id, NvError, NvStore};
use core::time::Duration;

pub mod consts {
    use core::time::Duration;

    /// `aplcMaxResponseWaitTime` — runtime response-wait window.
    pub const MAX_RESPONSE_WAIT_TIME: Duration = Duration::from_millis(200);
    /// `aplcMaxConfigWaitTime` — response-wait window during configuration.
    pub const MAX_CONFIG_WAIT_TIME: Duration = Duration::from_millis(300);
    /// `aplcMinIntPipeUnsafeTxWindowTime`.
    pub const MIN_INT_PIPE_UNSAFE_TX_WINDOW_TIME: Duration = Duration::from_millis(50);
    /// `aplcMaxNonStdDescFragmentSize`.
    pub const MAX_NON_STD_DESC_FRAGMENT_SIZE: usize = 80;
    /// `aplcMaxNonStdDescCompSize`.
    pub const MAX_NON_STD_DESC_COMP_SIZE: usize = 256;
    /// `aplcMaxRxOnWaitTime`.
    pub const MAX_RX_ON_WAIT_TIME: Duration = Duration::from_millis(100);
    /// `aplcIdleRateGuardTime`.
    pub const IDLE_RATE_GUARD_TIME: Duration = Duration::from_millis(1500);
    /// Report-repeat-interval upper bound enforced by write validation.
    pub const MAX_REPORT_REPEAT_INTERVAL: Duration = Duration::from_millis(100);
    /// Poll-interval valid range (inclusive), in units of `spec.md`'s poll
    /// ticks.
    pub const POLL_INTERVAL_MIN: u8 = 1;
    pub const POLL_INTERVAL_MAX: u8 = 16;
}

/// The response-wait timer (`ZID_EVT_RSP_WAIT`, `spec.md` §4.6): armed after
/// any ZID message expecting a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseWaitTimer {
    deadline: Option<Duration>,
}

impl Default for ResponseWaitTimer {
    fn default() -> Self {
        Self { deadline: None }
    }
}

impl ResponseWaitTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Duration, window: Duration) {
        self.deadline = Some(now + window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` if `now` is at or past the armed deadline; does not
    /// clear the timer (the caller decides whether to re-arm or cancel).
    pub fn has_expired(&self, now: Duration) -> bool {
        matches!(self.deadline, Some(d) if now >= d)
    }
}

/// The unsafe-window guard (`ZID_EVT_SAFE_TX`, `spec.md` §4.6, §8
/// property 3): after a successful interrupt-pipe send, the next attempt
/// within the window is upgraded to an acknowledged control-pipe send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsafeWindowGuard {
    unsafe_until: Option<Duration>,
    window: Duration,
}

impl UnsafeWindowGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            unsafe_until: None,
            window,
        }
    }

    /// Validate a configured unsafe-window duration (`spec.md` §4.6 write
    /// validation: `>= aplcMinIntPipeUnsafeTxWindowTime`).
    pub fn set_window(&mut self, window: Duration) -> Result<(), WriteValidationError> {
        if window < consts::MIN_INT_PIPE_UNSAFE_TX_WINDOW_TIME {
            return Err(WriteValidationError::OutOfRange);
        }
        self.window = window;
        Ok(())
    }

    pub fn on_interrupt_pipe_sent(&mut self, now: Duration) {
        self.unsafe_until = Some(now + self.window);
    }

    fn is_unsafe(&self, now: Duration) -> bool {
        matches!(self.unsafe_until, Some(until) if now < until)
    }

    /// Decide how a requested interrupt-pipe transmission should actually go
    /// out, upgrading to an acknowledged control-pipe send while unsafe
    /// (`spec.md` §4.6, §8 property 3).
    pub fn resolve(&mut self, now: Duration, requested: TxPipe) -> TxPipe {
        match requested {
            TxPipe::Interrupt if self.is_unsafe(now) => TxPipe::ControlAcknowledged,
            TxPipe::Interrupt => {
                self.on_interrupt_pipe_sent(now);
                TxPipe::Interrupt
            }
            other => other,
        }
    }
}

/// The report-repeat timer (`ZID_EVT_REPORT_REPEAT`, `spec.md` §4.8): while a
/// report-generating control is held, re-sends the last report every
/// `aplReportRepeatInterval` until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRepeatTimer {
    deadline: Option<Duration>,
    interval: Duration,
}

impl ReportRepeatTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            deadline: None,
            interval,
        }
    }

    /// Validate and apply a new `aplReportRepeatInterval` (`spec.md` §4.6
    /// write validation).
    pub fn set_interval(&mut self, interval: Duration) -> Result<(), WriteValidationError> {
        validate_report_repeat_interval(interval)?;
        self.interval = interval;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn arm(&mut self, now: Duration) {
        self.deadline = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// If due, re-arm for the next interval and return `true` so the caller
    /// re-sends the cached report.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPipe {
    Interrupt,
    ControlAcknowledged,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteValidationError {
    ReadOnly,
    OutOfRange,
}

/// Attribute write-validation bounds (`spec.md` §4.6): profile-version is
/// read-only; report-repeat-interval must not exceed its cap; poll-interval
/// must fall within its valid range.
pub fn validate_report_repeat_interval(v: Duration) -> Result<(), WriteValidationError> {
    if v > consts::MAX_REPORT_REPEAT_INTERVAL {
        return Err(WriteValidationError::OutOfRange);
    }
    Ok(())
}

pub fn validate_poll_interval(v: u8) -> Result<(), WriteValidationError> {
    if v < consts::POLL_INTERVAL_MIN || v > consts::POLL_INTERVAL_MAX {
        return Err(WriteValidationError::OutOfRange);
    }
    Ok(())
}

pub fn reject_profile_version_write() -> Result<(), WriteValidationError> {
    Err(WriteValidationError::ReadOnly)
}

/// `PairInfo` (`spec.md` §3): two bitsets over pairing-table slots —
/// `adapter_disc` (this device acts as Adapter for that pairing) and
/// `cfg_complete_disc` (ZID configuration completed for that pairing).
/// Invariant: `cfg_complete_disc[i]` implies slot `i` holds a valid
/// ZID-profile entry (`spec.md` §8 property 2).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairInfo {
    adapter_disc: u32,
    cfg_complete_disc: u32,
}

impl PairInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_adapter(&self, pairing_ref: u8) -> bool {
        self.adapter_disc & (1 << pairing_ref) != 0
    }

    pub fn set_adapter(&mut self, pairing_ref: u8) {
        self.adapter_disc |= 1 << pairing_ref;
    }

    pub fn clear_adapter(&mut self, pairing_ref: u8) {
        self.adapter_disc &= !(1 << pairing_ref);
    }

    pub fn is_cfg_complete(&self, pairing_ref: u8) -> bool {
        self.cfg_complete_disc & (1 << pairing_ref) != 0
    }

    pub fn set_cfg_complete(&mut self, pairing_ref: u8) {
        self.cfg_complete_disc |= 1 << pairing_ref;
    }

    pub fn clear_cfg_complete(&mut self, pairing_ref: u8) {
        self.cfg_complete_disc &= !(1 << pairing_ref);
    }

    /// `clear(ref)` (`spec.md` §3): frees a slot's discretes, used alongside
    /// `PairingTable::clear` on unpair.
    pub fn clear(&mut self, pairing_ref: u8) {
        self.clear_adapter(pairing_ref);
        self.clear_cfg_complete(pairing_ref);
    }

    pub fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.adapter_disc.to_le_bytes());
        buf[4..8].copy_from_slice(&self.cfg_complete_disc.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 8 {
            return None;
        }
        Some(Self {
            adapter_disc: u32::from_le_bytes(buf[0..4].try_into().ok()?),
            cfg_complete_disc: u32::from_le_bytes(buf[4..8].try_into().ok()?),
        })
    }

    /// Load from NV, defaulting to all-clear if the item is absent or
    /// unreadable (cold boot, `spec.md` §4.9).
    pub fn load(nv: &mut impl NvStore) -> Self {
        let mut buf = [0u8; 8];
        match nv.read(id::ZID_PAIR_INFO, &mut buf) {
            Ok(n) => Self::decode(&buf[..n]).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn persist(&self, nv: &mut impl NvStore) -> Result<(), NvError> {
        nv.write(id::ZID_PAIR_INFO, &self.encode())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonStdDescError {
    MissingFragment { expected: u8, got: u8 },
    InvalidParam,
}

/// Non-standard-descriptor reassembly state machine (`spec.md` §4.6, §8
/// property 4): tracks expected-fragment-id, accumulated bytes, and the
/// header identity (type/size/report-id) that must stay consistent across
/// fragments.
pub struct NonStdDescReassembly {
    expected_fragment_id: u8,
    report_id: Option<u8>,
    declared_size: Option<u16>,
    buf: heapless::Vec<u8, { consts::MAX_NON_STD_DESC_COMP_SIZE }>,
}

impl Default for NonStdDescReassembly {
    fn default() -> Self {
        Self {
            expected_fragment_id: 0,
            report_id: None,
            declared_size: None,
            buf: heapless::Vec::new(),
        }
    }
}

impl NonStdDescReassembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment. `is_last` is the caller's knowledge of whether
    /// this fragment's declared size means reassembly is complete; returns
    /// the completed descriptor bytes once the last fragment lands.
    pub fn offer_fragment(
        &mut self,
        fragment_id: u8,
        report_id: u8,
        declared_size: u16,
        data: &[u8],
    ) -> Result<Option<&[u8]>, NonStdDescError> {
        if fragment_id != self.expected_fragment_id {
            return Err(NonStdDescError::MissingFragment {
                expected: self.expected_fragment_id,
                got: fragment_id,
            });
        }

        if let (Some(expected_report_id), Some(expected_size)) =
            (self.report_id, self.declared_size)
        {
            if expected_report_id != report_id || expected_size != declared_size {
                return Err(NonStdDescError::InvalidParam);
            }
        } else {
            self.report_id = Some(report_id);
            self.declared_size = Some(declared_size);
        }

        self.buf
            .extend_from_slice(data)
            .map_err(|_| NonStdDescError::InvalidParam)?;
        self.expected_fragment_id += 1;

        if self.buf.len() as u16 == declared_size {
            Ok(Some(self.buf.as_slice()))
        } else if self.buf.len() as u16 > declared_size {
            Err(NonStdDescError::InvalidParam)
        } else {
            Ok(None)
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_wait_timer_expires_after_window() {
        let mut t = ResponseWaitTimer::new();
        t.arm(Duration::from_millis(0), consts::MAX_RESPONSE_WAIT_TIME);
        assert!(!t.has_expired(Duration::from_millis(199)));
        assert!(t.has_expired(Duration::from_millis(200)));
    }

    #[test]
    fn unsafe_window_upgrades_second_interrupt_send() {
        // spec.md §8 property 3
        let mut guard = UnsafeWindowGuard::new(consts::MIN_INT_PIPE_UNSAFE_TX_WINDOW_TIME);
        let t0 = Duration::from_millis(0);
        assert_eq!(guard.resolve(t0, TxPipe::Interrupt), TxPipe::Interrupt);
        let t1 = t0 + Duration::from_millis(10);
        assert_eq!(
            guard.resolve(t1, TxPipe::Interrupt),
            TxPipe::ControlAcknowledged
        );
    }

    #[test]
    fn unsafe_window_clears_after_expiry() {
        let mut guard = UnsafeWindowGuard::new(consts::MIN_INT_PIPE_UNSAFE_TX_WINDOW_TIME);
        let t0 = Duration::from_millis(0);
        guard.resolve(t0, TxPipe::Interrupt);
        let t1 = t0 + consts::MIN_INT_PIPE_UNSAFE_TX_WINDOW_TIME;
        assert_eq!(guard.resolve(t1, TxPipe::Interrupt), TxPipe::Interrupt);
    }

    #[test]
    fn set_window_rejects_below_minimum() {
        let mut guard = UnsafeWindowGuard::new(consts::MIN_INT_PIPE_UNSAFE_TX_WINDOW_TIME);
        assert_eq!(
            guard.set_window(Duration::from_millis(10)),
            Err(WriteValidationError::OutOfRange)
        );
    }

    #[test]
    fn non_std_desc_reassembles_two_fragments() {
        // spec.md §8 property 4, and the two-fragment 100-byte example in
        // §8's end-to-end ZID-target pairing scenario.
        let mut r = NonStdDescReassembly::new();
        let first = [0xAAu8; 80];
        let second = [0xBBu8; 20];
        assert_eq!(r.offer_fragment(0, 1, 100, &first), Ok(None));
        let complete = r.offer_fragment(1, 1, 100, &second).unwrap().unwrap();
        assert_eq!(complete.len(), 100);
        assert_eq!(&complete[..80], &first[..]);
        assert_eq!(&complete[80..], &second[..]);
    }

    #[test]
    fn non_std_desc_out_of_order_fragment_is_missing_fragment() {
        let mut r = NonStdDescReassembly::new();
        assert_eq!(
            r.offer_fragment(1, 1, 100, &[0xAA; 20]),
            Err(NonStdDescError::MissingFragment {
                expected: 0,
                got: 1
            })
        );
    }

    #[test]
    fn non_std_desc_mismatched_report_id_is_invalid_param() {
        let mut r = NonStdDescReassembly::new();
        r.offer_fragment(0, 1, 100, &[0xAA; 80]).unwrap();
        assert_eq!(
            r.offer_fragment(1, 2, 100, &[0xBB; 20]),
            Err(NonStdDescError::InvalidParam)
        );
    }

    #[test]
    fn pair_info_tracks_adapter_and_cfg_complete_discretes_independently() {
        let mut p = PairInfo::new();
        p.set_adapter(2);
        assert!(p.is_adapter(2));
        assert!(!p.is_cfg_complete(2));

        p.set_cfg_complete(2);
        assert!(p.is_cfg_complete(2));

        p.clear(2);
        assert!(!p.is_adapter(2));
        assert!(!p.is_cfg_complete(2));
    }

    #[test]
    fn pair_info_roundtrips_through_nv() {
        let mut nv: crate::nv::MemoryNvStore<4> = crate::nv::MemoryNvStore::new();
        let mut p = PairInfo::new();
        p.set_adapter(0);
        p.set_cfg_complete(0);
        p.persist(&mut nv).unwrap();

        let loaded = PairInfo::load(&mut nv);
        assert_eq!(loaded, p);
    }

    #[test]
    fn pair_info_loads_default_when_absent() {
        let mut nv: crate::nv::MemoryNvStore<4> = crate::nv::MemoryNvStore::new();
        assert_eq!(PairInfo::load(&mut nv), PairInfo::default());
    }

    #[test]
    fn report_repeat_timer_fires_and_rearms_for_next_interval() {
        let mut t = ReportRepeatTimer::new(Duration::from_millis(50));
        let t0 = Duration::from_millis(0);
        t.arm(t0);
        assert!(!t.poll(t0 + Duration::from_millis(49)));
        assert!(t.poll(t0 + Duration::from_millis(50)));
        // re-armed for another 50ms out from the fire time
        assert!(!t.poll(t0 + Duration::from_millis(99)));
        assert!(t.poll(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn report_repeat_timer_idle_until_armed() {
        let mut t = ReportRepeatTimer::new(Duration::from_millis(50));
        assert!(!t.is_armed());
        assert!(!t.poll(Duration::from_millis(1000)));
    }

    #[test]
    fn report_repeat_timer_rejects_interval_above_cap() {
        let mut t = ReportRepeatTimer::new(Duration::from_millis(50));
        assert_eq!(
            t.set_interval(Duration::from_millis(200)),
            Err(WriteValidationError::OutOfRange)
        );
        assert_eq!(t.interval(), Duration::from_millis(50));
    }

    #[test]
    fn report_repeat_interval_validation() {
        assert!(validate_report_repeat_interval(Duration::from_millis(50)).is_ok());
        assert_eq!(
            validate_report_repeat_interval(Duration::from_millis(200)),
            Err(WriteValidationError::OutOfRange)
        );
    }

    #[test]
    fn poll_interval_validation() {
        assert!(validate_poll_interval(1).is_ok());
        assert!(validate_poll_interval(16).is_ok());
        assert_eq!(validate_poll_interval(0), Err(WriteValidationError::OutOfRange));
        assert_eq!(validate_poll_interval(17), Err(WriteValidationError::OutOfRange));
    }
}
