//! The RTI (RemoTI) top-level state machine (`spec.md` §4.4): owns startup
//! policy, discovery filtering, the allow-pair timeout, and the
//! profile-configuration chain walk.

use crate::nv::{id, BootFlag, NvError, NvStore, StartupControl};
use crate::pairing::{ProfileDiscs, PROFILE_BIT_MAX};
use crate::rcn::discovery::DiscoveredEvent;
use crate::status::{RtiError, Status};
use core::time::Duration;

/// `aplcGdpMaxPairIndicationWaitTime` (`spec.md` §4.4).
pub const ALLOW_PAIR_MAX_WAIT: Duration = Duration::from_millis(1200);
/// `aplcConfigBlackoutTime` (`spec.md` §4.4).
pub const CONFIG_BLACKOUT_TIME: Duration = Duration::from_millis(100);

/// `spec.md` §4.4's ten RTI states.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtiState {
    Start,
    Ready,
    Discovery,
    Discovered,
    DiscoveryError,
    DiscoveryAbort,
    Pair,
    NData,
    Unpair,
    Configuration { profile_bit: u8, pairing_ref: u8 },
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtiTransitionError {
    WrongState,
    NoProfilesConfigured,
}

/// Policy used to filter `NLME-DISCOVERED-EVENT`s during `DISCOVERY`
/// (`spec.md` §4.4): optional exact user-string match, and a programmed
/// supported-target-type list (0xFF entries act as wildcards).
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryFilterPolicy {
    pub user_string: Option<[u8; 16]>,
}

pub const DEVICE_TYPE_WILDCARD: u8 = 0xFF;

impl DiscoveryFilterPolicy {
    pub fn matches(
        &self,
        event: &DiscoveredEvent,
        event_user_string: Option<&[u8; 16]>,
        supported_target_types: &[u8],
    ) -> bool {
        if let Some(want) = self.user_string {
            match event_user_string {
                Some(got) if *got == want => {}
                _ => return false,
            }
        }
        supported_target_types
            .iter()
            .any(|&t| t == DEVICE_TYPE_WILDCARD || t == event.peer_device_type)
    }
}

/// Bridge mode (`spec.md` §4.4): a single function-pointer slot that, when
/// installed, routes every RCN callback verbatim to an external handler —
/// while installed, RTI performs no native processing of those callbacks.
/// Represented as a plain `fn` (not a closure) since this is a `no_std`
/// crate without an allocator to box a trait object into.
pub type BridgeCallback = fn(RtiEvent);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtiEvent {
    Discovered(DiscoveredEvent),
    PairConfirm { status: Status, pairing_ref: u8 },
    UnpairIndication { pairing_ref: u8 },
}

/// The RTI task (`spec.md` §4.4, §5): one cooperative state machine driven
/// by event flags, owning the network layer's primitives through
/// `crate::rcn::Network` (held by the caller and passed into each step, the
/// way the teacher's `EndDevice<C>` is driven by an external dispatcher
/// rather than owning its own clock).
pub struct Rti {
    pub state: RtiState,
    pub startup_control: StartupControl,
    pub allow_pair_flag: bool,
    allow_pair_deadline: Option<Duration>,
    pub bridge: Option<BridgeCallback>,
    pub discovery_policy: DiscoveryFilterPolicy,
}

impl Default for Rti {
    fn default() -> Self {
        Self {
            state: RtiState::Start,
            startup_control: StartupControl::RestoreState,
            allow_pair_flag: false,
            allow_pair_deadline: None,
            bridge: None,
            discovery_policy: DiscoveryFilterPolicy::default(),
        }
    }
}

impl Rti {
    pub fn new() -> Self {
        Self::default()
    }

    /// `InitReq` (`spec.md` §4.4, §4.9): cold-boot writes defaults
    /// idempotently; warm-boot reads the persisted snapshot. Returns the
    /// resolved `startup_control` policy.
    pub fn init(&mut self, nv: &mut impl NvStore) -> Result<StartupControl, NvError> {
        let mut boot_byte = [0u8; 1];
        let boot_flag = match nv.read(id::BOOT_FLAG, &mut boot_byte) {
            Ok(_) => BootFlag::from_byte(Some(boot_byte[0])),
            Err(NvError::ItemNotFound) => BootFlag::Cold,
            Err(e) => return Err(e),
        };

        if boot_flag == BootFlag::Cold {
            // Idempotent rewrite: re-running this on a crash mid-write
            // never loses defaults (`spec.md` §4.9).
            nv.write(id::STARTUP_CONTROL, &[StartupControl::RestoreState as u8])?;
            nv.write(id::BOOT_FLAG, &[BootFlag::Warm.to_byte()])?;
            self.startup_control = StartupControl::RestoreState;
        } else {
            let mut ctrl_byte = [0u8; 1];
            match nv.read(id::STARTUP_CONTROL, &mut ctrl_byte) {
                Ok(_) => self.startup_control = StartupControl::from_byte(ctrl_byte[0]),
                Err(NvError::ItemNotFound) => self.startup_control = StartupControl::RestoreState,
                Err(e) => return Err(e),
            }
        }

        Ok(self.startup_control)
    }

    /// `START → READY` on `NLME-START.confirm(success)`; remains in
    /// `START` on failure (`spec.md` §4.4).
    pub fn on_start_confirm(&mut self, status: Status) {
        if status.is_success() {
            self.state = RtiState::Ready;
        }
    }

    pub fn begin_discovery(&mut self) -> Result<(), RtiTransitionError> {
        if self.state != RtiState::Ready {
            return Err(RtiTransitionError::WrongState);
        }
        self.state = RtiState::Discovery;
        Ok(())
    }

    /// Discovery confirm/indication stream resolution (`spec.md` §4.4):
    /// more than one hit forces `DISCOVERY_ERROR`.
    pub fn on_discovery_outcome(&mut self, num_nodes: u8) {
        self.state = if num_nodes == 1 {
            RtiState::Discovered
        } else {
            RtiState::DiscoveryError
        };
    }

    /// `DiscoveryAbort` always returns to `READY` on completion
    /// (`spec.md` §5), and is only accepted in `DISCOVERY{,_ERROR}` /
    /// `DISCOVERED` (pair abort is not permitted once `NLME-PAIR` is in
    /// flight).
    pub fn abort_discovery(&mut self) -> Result<(), RtiTransitionError> {
        match self.state {
            RtiState::Discovery
            | RtiState::DiscoveryError
            | RtiState::Discovered => {
                self.state = RtiState::DiscoveryAbort;
                Ok(())
            }
            _ => Err(RtiTransitionError::WrongState),
        }
    }

    pub fn finish_discovery_abort(&mut self) {
        self.state = RtiState::Ready;
    }

    pub fn begin_pair(&mut self) -> Result<(), RtiTransitionError> {
        if self.state != RtiState::Discovered {
            return Err(RtiTransitionError::WrongState);
        }
        self.state = RtiState::Pair;
        Ok(())
    }

    /// `PAIR → CONFIGURATION` on pair confirm(success); the caller should
    /// arm `GDP_EVT_CONFIGURE_NEXT` after [`CONFIG_BLACKOUT_TIME`]
    /// (`spec.md` §4.4).
    pub fn on_pair_confirm(
        &mut self,
        status: Status,
        pairing_ref: u8,
        profile_discs: ProfileDiscs,
    ) -> Result<(), RtiError> {
        if !status.is_success() {
            self.state = RtiState::Ready;
            return Err(RtiError::FailedToPair);
        }
        match profile_discs.next_set_from(0) {
            Some(first_bit) => {
                self.state = RtiState::Configuration {
                    profile_bit: first_bit,
                    pairing_ref,
                };
                Ok(())
            }
            None => {
                // no profile bits set at all: configuration is vacuously
                // complete.
                self.state = RtiState::Ready;
                Ok(())
            }
        }
    }

    /// One profile co-layer raised `GDP_EVT_CONFIGURE_NEXT`
    /// (`spec.md` §4.4): advance the ascending walk over `profile_discs`, or
    /// return to `READY` once past the last profile.
    pub fn on_configure_next(
        &mut self,
        profile_discs: ProfileDiscs,
    ) -> Result<(), RtiTransitionError> {
        let RtiState::Configuration {
            profile_bit,
            pairing_ref,
        } = self.state
        else {
            return Err(RtiTransitionError::WrongState);
        };

        let next = profile_bit
            .checked_add(1)
            .and_then(|from| profile_discs.next_set_from(from));
        match next {
            Some(next) => {
                self.state = RtiState::Configuration {
                    profile_bit: next,
                    pairing_ref,
                };
            }
            None => {
                self.state = RtiState::Ready;
            }
        }
        Ok(())
    }

    /// A profile configuration failed mid-walk (`spec.md` §4.4, §4.9):
    /// caller must issue `UnpairReq` against `pairing_ref`; RTI returns to
    /// `READY` and the failure carries the offending profile's nibble.
    pub fn on_configure_failure(&mut self) -> RtiError {
        let profile_nibble = match self.state {
            RtiState::Configuration { profile_bit, .. } => profile_bit & 0x0F,
            _ => 0,
        };
        self.state = RtiState::Ready;
        RtiError::FailedToConfigure { profile_nibble }
    }

    /// `AllowPairReq` confirmed via `NLME-AUTO-DISCOVERY` success
    /// (`spec.md` §4.4): arm the allow-pair timeout.
    pub fn on_auto_discovery_confirm_success(&mut self, now: Duration) {
        self.allow_pair_flag = true;
        self.allow_pair_deadline = Some(now + ALLOW_PAIR_MAX_WAIT);
    }

    /// A pair-indication arrived while `allow_pair_flag` is set: clear it
    /// atomically before the caller invokes `NLME-PAIR.response`
    /// (`spec.md` §4.4).
    pub fn on_pair_indication(&mut self) -> bool {
        if self.allow_pair_flag {
            self.allow_pair_flag = false;
            self.allow_pair_deadline = None;
            true
        } else {
            false
        }
    }

    /// Poll for allow-pair timeout expiry (`spec.md` §4.4): if the flag is
    /// still set once `now` reaches the deadline, surface
    /// `ALLOW_PAIRING_TIMEOUT`.
    pub fn poll_allow_pair_timeout(&mut self, now: Duration) -> Option<RtiError> {
        if !self.allow_pair_flag {
            return None;
        }
        match self.allow_pair_deadline {
            Some(deadline) if now >= deadline => {
                self.allow_pair_flag = false;
                self.allow_pair_deadline = None;
                Some(RtiError::AllowPairingTimeout)
            }
            _ => None,
        }
    }

    /// `READY → NDATA` on an outbound `NLDE-DATA.request` (`spec.md` §4.4).
    pub fn send_data_request(&mut self) -> Result<(), RtiTransitionError> {
        if self.state != RtiState::Ready {
            return Err(RtiTransitionError::WrongState);
        }
        self.state = RtiState::NData;
        Ok(())
    }

    /// `NDATA → READY` once the `NLDE-DATA.confirm` for the in-flight send
    /// arrives (`spec.md` §4.4).
    pub fn on_data_confirm(&mut self) -> Result<(), RtiTransitionError> {
        if self.state != RtiState::NData {
            return Err(RtiTransitionError::WrongState);
        }
        self.state = RtiState::Ready;
        Ok(())
    }

    /// `* → UNPAIR` once the caller has issued `UnpairReq` against a remote
    /// `NLME-UNPAIR.indication` (`spec.md` §4.4, §4.9). Native handling
    /// (below, in [`Rti::dispatch`]) already moves here for an unsolicited
    /// remote unpair; this covers a locally-initiated one.
    pub fn begin_unpair(&mut self) {
        self.state = RtiState::Unpair;
    }

    /// `UNPAIR → READY` once the caller has cleared the pairing-table slot
    /// (`spec.md` §4.1, §4.9: unpair clears the entry and its `adapter_disc`/
    /// `cfg_complete_disc` bits before returning to `READY`).
    pub fn on_unpair_confirm(&mut self) -> Result<(), RtiTransitionError> {
        if self.state != RtiState::Unpair {
            return Err(RtiTransitionError::WrongState);
        }
        self.state = RtiState::Ready;
        Ok(())
    }

    /// Dispatch one RCN callback either to bridge mode (verbatim, no native
    /// processing) or back to the caller for native handling
    /// (`spec.md` §4.4). Native handling is minimal: an `UnpairIndication`
    /// moves RTI into `UNPAIR` so it stops accepting new pair/data requests
    /// while the caller tears down the pairing-table entry and then calls
    /// [`Rti::on_unpair_confirm`]; every other event is surfaced unchanged
    /// for the caller to act on (`spec.md` §9: message-passing between
    /// subsystems rather than a re-entrant call back into the pairing
    /// table from here).
    pub fn dispatch(&mut self, event: RtiEvent) -> Option<RtiEvent> {
        match self.bridge {
            Some(cb) => {
                cb(event);
                None
            }
            None => {
                if let RtiEvent::UnpairIndication { .. } = event {
                    self.state = RtiState::Unpair;
                }
                Some(event)
            }
        }
    }
}
