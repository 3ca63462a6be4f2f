//! ZID Class-Device role (`spec.md` §4.7): the report-originating side of a
//! ZID pairing.

use super::common::{consts, ReportRepeatTimer, ResponseWaitTimer, TxPipe, UnsafeWindowGuard};
use crate::frame::{CommPipe, TxOptions};
use crate::profile::gdp::GenericResponse;
use core::time::Duration;

/// Sub-states within `CONFIGURATION` (`spec.md` §4.7).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CldState {
    CfgGet,
    CfgPxy,
    CfgExt,
    CfgXmitNonStdDescCompFrags { component: u8, fragment: u8 },
    CfgNullReports { index: u8 },
    CfgComplete,
    CfgRdy,
    Rdy,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CldError {
    ConfigurationFailed,
    NotConfigured,
}

/// How many 80-byte fragments a non-std descriptor of `size` bytes needs
/// (`spec.md` §4.7: `ceil(size / aplcMaxNonStdDescFragmentSize)`).
pub fn fragment_count(size: usize) -> usize {
    size.div_ceil(consts::MAX_NON_STD_DESC_FRAGMENT_SIZE)
}

/// One non-standard descriptor component to push during configuration.
pub struct NonStdDescComponent<'a> {
    pub report_id: u8,
    pub data: &'a [u8],
}

/// One NULL report to provision during configuration (`ZID_CMD_SET_REPORT`,
/// `type=IN`).
pub struct NullReport {
    pub report_id: u8,
}

/// Drives one pairing's Class-Device configuration sequence
/// (`spec.md` §4.7): `eCldCfgGet → eCldCfgPxy → eCldCfgExt →
/// eCldCfgXmitNonStdDescCompFrags → eCldCfgNullReports → eCldCfgComplete →
/// eCldCfgRdy → eCldRdy`.
pub struct ClassDevicePairing {
    pub state: CldState,
    pub rsp_wait: ResponseWaitTimer,
    pub unsafe_window: UnsafeWindowGuard,
    pub report_repeat: ReportRepeatTimer,
}

impl ClassDevicePairing {
    /// `PairCnf` with ZID bit set kicks off `ZID_CLD_EVT_CFG`
    /// (`spec.md` §4.7). `aplReportRepeatInterval` defaults to half of
    /// `aplcMaxReportRepeatInterval`, matching the original
    /// `zid_class_device.c` default.
    pub fn begin_configuration() -> Self {
        Self {
            state: CldState::CfgGet,
            rsp_wait: ResponseWaitTimer::new(),
            unsafe_window: UnsafeWindowGuard::new(
                consts::MIN_INT_PIPE_UNSAFE_TX_WINDOW_TIME,
            ),
            report_repeat: ReportRepeatTimer::new(consts::MAX_REPORT_REPEAT_INTERVAL / 2),
        }
    }

    /// A report was sent while its originating control (e.g. a held button)
    /// is still active (`spec.md` §4.8): (re)arm the report-repeat timer so
    /// the caller resends it every `aplReportRepeatInterval` until released.
    pub fn on_report_sent_while_held(&mut self, now: Duration) {
        self.report_repeat.arm(now);
    }

    pub fn on_report_released(&mut self) {
        self.report_repeat.cancel();
    }

    /// Poll the report-repeat timer; `true` means the caller should resend
    /// its last-cached report now.
    pub fn poll_report_repeat(&mut self, now: Duration) -> bool {
        self.report_repeat.poll(now)
    }

    /// Advance past `CfgGet` once the Adapter's Get-Attributes-Response for
    /// parser/country/release/vendor/product has arrived successfully.
    pub fn on_get_attr_response(&mut self, ok: bool) -> Result<(), CldError> {
        if !matches!(self.state, CldState::CfgGet) {
            return Err(CldError::ConfigurationFailed);
        }
        if !ok {
            return Err(CldError::ConfigurationFailed);
        }
        self.state = CldState::CfgPxy;
        Ok(())
    }

    /// Proxy-entry + std-descriptor-list Push-Attributes accepted
    /// (`spec.md` §4.7): advance to `eCldCfgExt`, the pivot where the caller
    /// decides (via [`Self::advance_from_cfg_ext`]) whether a non-std
    /// descriptor component remains to push.
    pub fn on_proxy_entry_pushed(&mut self) -> Result<(), CldError> {
        if !matches!(self.state, CldState::CfgPxy) {
            return Err(CldError::ConfigurationFailed);
        }
        self.state = CldState::CfgExt;
        Ok(())
    }

    /// `eCldCfgExt`'s decision point: push another non-std descriptor
    /// component (`next_component < total_components`), or move on to
    /// NULL-report provisioning once all components are committed
    /// (`spec.md` §4.7). Reached both right after `CfgPxy` (`next_component
    /// = 0`) and after each component's fragments finish (see
    /// [`Self::on_non_std_desc_fragment_pushed`]), matching the original
    /// `eCldCfgXmitNonStdDescCompFrags → eCldCfgExt` loop-back.
    pub fn advance_from_cfg_ext(
        &mut self,
        next_component: u8,
        total_components: u8,
    ) -> Result<(), CldError> {
        if !matches!(self.state, CldState::CfgExt) {
            return Err(CldError::ConfigurationFailed);
        }
        self.state = if next_component < total_components {
            CldState::CfgXmitNonStdDescCompFrags {
                component: next_component,
                fragment: 0,
            }
        } else {
            CldState::CfgNullReports { index: 0 }
        };
        Ok(())
    }

    /// Record one accepted non-std-descriptor fragment push, advancing to
    /// the next fragment, or back to `eCldCfgExt` once the current
    /// component's fragments are exhausted (`spec.md` §4.7).
    pub fn on_non_std_desc_fragment_pushed(
        &mut self,
        fragments_for_current: u8,
    ) -> Result<(), CldError> {
        let CldState::CfgXmitNonStdDescCompFrags {
            component,
            fragment,
        } = self.state
        else {
            return Err(CldError::ConfigurationFailed);
        };

        let next_fragment = fragment + 1;
        self.state = if next_fragment < fragments_for_current {
            CldState::CfgXmitNonStdDescCompFrags {
                component,
                fragment: next_fragment,
            }
        } else {
            CldState::CfgExt
        };
        Ok(())
    }

    pub fn on_null_report_provisioned(&mut self, total_null_reports: u8) -> Result<(), CldError> {
        let CldState::CfgNullReports { index } = self.state else {
            return Err(CldError::ConfigurationFailed);
        };
        let next = index + 1;
        self.state = if next < total_null_reports {
            CldState::CfgNullReports { index: next }
        } else {
            CldState::CfgComplete
        };
        Ok(())
    }

    /// `GDP_CMD_CFG_COMPLETE` sent, Generic-Response success received
    /// (`spec.md` §4.7): mark `cfg_complete_disc`, move to `eCldRdy`.
    pub fn on_cfg_complete_response(&mut self, result: GenericResponse) -> Result<(), CldError> {
        if !matches!(self.state, CldState::CfgComplete) {
            return Err(CldError::ConfigurationFailed);
        }
        if !result.is_success() {
            return Err(CldError::ConfigurationFailed);
        }
        self.state = CldState::CfgRdy;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.state = CldState::Rdy;
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, CldState::Rdy)
    }

    /// `zidCld_SendDataReq(pair, tx_options, cmd)` (`spec.md` §4.7): select
    /// tx-options per the requested pipe and the unsafe-window guard, and
    /// report whether the caller should arm `RSPING`/receiver-on for
    /// `aplcMaxRxOnWaitTime`. `expects_reply` is set by the caller for
    /// `GET_ATTR | PUSH_ATTR | SET_REPORT | CFG_COMPLETE`, per `spec.md`
    /// §4.7.
    pub fn send_data_req(
        &mut self,
        now: Duration,
        requested_pipe: CommPipe,
        expects_reply: bool,
    ) -> (TxOptions, Option<Duration>) {
        let resolved = match requested_pipe {
            CommPipe::InterruptOut => {
                self.unsafe_window.resolve(now, TxPipe::Interrupt)
            }
            _ => TxPipe::ControlAcknowledged,
        };

        let tx_options = match resolved {
            TxPipe::Interrupt => TxOptions::new().with_single_channel(true),
            TxPipe::ControlAcknowledged => TxOptions::new().with_acknowledged(true),
        };

        let rx_on_wait = if expects_reply {
            self.rsp_wait.arm(now, consts::MAX_RX_ON_WAIT_TIME);
            Some(consts::MAX_RX_ON_WAIT_TIME)
        } else {
            None
        };

        (tx_options, rx_on_wait)
    }

    /// Validate an inbound `GET_REPORT`/`SET_REPORT` against the configured
    /// report-id lists (`spec.md` §4.7).
    pub fn validate_inbound_report_id(
        &self,
        report_id: u8,
        configured_standard: &[u8],
        configured_non_std: &[u8],
    ) -> Result<(), GenericResponse> {
        if configured_standard.contains(&report_id) || configured_non_std.contains(&report_id) {
            Ok(())
        } else {
            Err(GenericResponse::InvalidParameter)
        }
    }
}
