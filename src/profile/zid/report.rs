//! Standard ZID report payload structs (`spec.md` §6 "Standard report ids",
//! supplemented from the original `zid_profile.h` Tables 19-28) with
//! bit-accurate encode/decode.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReportId {
    Mouse = 0x01,
    Keyboard = 0x02,
    ContactData = 0x03,
    GestureTap = 0x04,
    GestureScroll = 0x05,
    GesturePinch = 0x06,
    GestureRotate = 0x07,
    GestureSync = 0x08,
    TouchSensorProps = 0x09,
    TapSupportProps = 0x0A,
}

impl ReportId {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x01 => ReportId::Mouse,
            0x02 => ReportId::Keyboard,
            0x03 => ReportId::ContactData,
            0x04 => ReportId::GestureTap,
            0x05 => ReportId::GestureScroll,
            0x06 => ReportId::GesturePinch,
            0x07 => ReportId::GestureRotate,
            0x08 => ReportId::GestureSync,
            0x09 => ReportId::TouchSensorProps,
            0x0A => ReportId::TapSupportProps,
            _ => return None,
        })
    }

    /// Fixed data length for this report id (`spec.md` §6).
    pub const fn data_len(self) -> usize {
        match self {
            ReportId::Mouse => 3,
            ReportId::Keyboard => 8,
            ReportId::ContactData => 11,
            ReportId::GestureTap => 5,
            ReportId::GestureScroll => 4,
            ReportId::GesturePinch => 6,
            ReportId::GestureRotate => 2,
            ReportId::GestureSync => 1,
            ReportId::TouchSensorProps => 7,
            ReportId::TapSupportProps => 4,
        }
    }
}

/// Report-record transport type (`spec.md` §6).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReportType {
    In = 1,
    Out = 2,
    Feature = 3,
}

impl ReportType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => ReportType::In,
            2 => ReportType::Out,
            3 => ReportType::Feature,
            _ => return None,
        })
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    UnknownReportId,
    LengthMismatch { expected: usize, got: usize },
}

/// A single Mouse report (`spec.md` §6 Table 19): relative x/y motion and a
/// button bitmask.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mouse {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
}

impl Mouse {
    pub fn encode(&self) -> [u8; 3] {
        [self.buttons, self.x as u8, self.y as u8]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 3 {
            return Err(ReportError::LengthMismatch {
                expected: 3,
                got: buf.len(),
            });
        }
        Ok(Self {
            buttons: buf[0],
            x: buf[1] as i8,
            y: buf[2] as i8,
        })
    }
}

/// A single Keyboard report (`spec.md` §6 Table 20): modifier byte, reserved
/// byte, and 6 keycodes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyboard {
    pub modifiers: u8,
    pub keycodes: [u8; 6],
}

impl Keyboard {
    pub fn encode(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0] = self.modifiers;
        out[1] = 0; // reserved
        out[2..8].copy_from_slice(&self.keycodes);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 8 {
            return Err(ReportError::LengthMismatch {
                expected: 8,
                got: buf.len(),
            });
        }
        let mut keycodes = [0u8; 6];
        keycodes.copy_from_slice(&buf[2..8]);
        Ok(Self {
            modifiers: buf[0],
            keycodes,
        })
    }
}

/// A single Contact Data report (`spec.md` §6 Tables 21-22, from the
/// original `zid_profile.h`'s `zid_contactData_data_t`): one touch contact's
/// index/type, state, orientation, pressure, 12-bit location, and 16-bit
/// major/minor ellipse axis lengths.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactData {
    pub contact_index: u8,
    pub contact_type: u8,
    pub state: u8,
    pub maj_ax_orientation: u8,
    pub pressure: u8,
    pub loc_x: u16,
    pub loc_y: u16,
    pub maj_ax_len: u16,
    pub min_ax_len: u16,
}

impl ContactData {
    const INDEX_MASK: u8 = 0x0F;
    const TYPE_MASK: u8 = 0xF0;

    pub fn encode(&self) -> [u8; 11] {
        let type_index = (self.contact_index & Self::INDEX_MASK) | (self.contact_type & Self::TYPE_MASK);
        let loc_x = self.loc_x.to_le_bytes();
        let loc_xy = (loc_x[1] & 0x0F) | (((self.loc_y & 0x0F) as u8) << 4);
        let loc_y = (self.loc_y >> 4) as u8;
        let maj = self.maj_ax_len.to_le_bytes();
        let min = self.min_ax_len.to_le_bytes();
        [
            type_index,
            self.state,
            self.maj_ax_orientation,
            self.pressure,
            loc_x[0],
            loc_xy,
            loc_y,
            maj[0],
            maj[1],
            min[0],
            min[1],
        ]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 11 {
            return Err(ReportError::LengthMismatch {
                expected: 11,
                got: buf.len(),
            });
        }
        let loc_x = ((buf[5] as u16 & 0x0F) << 8) | buf[4] as u16;
        let loc_y = (buf[5] as u16 >> 4) | ((buf[6] as u16) << 4);
        Ok(Self {
            contact_index: buf[0] & Self::INDEX_MASK,
            contact_type: buf[0] & Self::TYPE_MASK,
            state: buf[1],
            maj_ax_orientation: buf[2],
            pressure: buf[3],
            loc_x,
            loc_y,
            maj_ax_len: u16::from_le_bytes([buf[7], buf[8]]),
            min_ax_len: u16::from_le_bytes([buf[9], buf[10]]),
        })
    }
}

/// A single Gesture Tap report (`spec.md` §6 Table 23, from
/// `zid_gestureTap_data_t`): finger count, tap type, and a 12-bit location.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTap {
    pub finger_count: u8,
    pub tap_type: u8,
    pub loc_x: u16,
    pub loc_y: u16,
}

impl GestureTap {
    const FINGER_COUNT_MASK: u8 = 0x07;
    const TYPE_MASK: u8 = 0xF8;

    pub fn encode(&self) -> [u8; 5] {
        let type_count = (self.finger_count & Self::FINGER_COUNT_MASK) | (self.tap_type & Self::TYPE_MASK);
        let loc_x = self.loc_x.to_le_bytes();
        let loc_xy = (loc_x[1] & 0x0F) | (((self.loc_y & 0x0F) as u8) << 4);
        let loc_y = (self.loc_y >> 4) as u8;
        [type_count, 0, loc_x[0], loc_xy, loc_y]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 5 {
            return Err(ReportError::LengthMismatch {
                expected: 5,
                got: buf.len(),
            });
        }
        let loc_x = ((buf[3] as u16 & 0x0F) << 8) | buf[2] as u16;
        let loc_y = (buf[3] as u16 >> 4) | ((buf[4] as u16) << 4);
        Ok(Self {
            finger_count: buf[0] & Self::FINGER_COUNT_MASK,
            tap_type: buf[0] & Self::TYPE_MASK,
            loc_x,
            loc_y,
        })
    }
}

/// A single Gesture Scroll report (`spec.md` §6 Tables 24-27, from
/// `zid_gestureScroll_data_t`): finger count, scroll type, direction, and a
/// 12-bit distance.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureScroll {
    pub finger_count: u8,
    pub scroll_type: u8,
    pub direction: u8,
    pub distance: u16,
}

impl GestureScroll {
    const FINGER_COUNT_MASK: u8 = 0x07;
    const TYPE_MASK: u8 = 0xF8;
    const DIRECTION_MASK: u8 = 0x07;

    pub fn encode(&self) -> [u8; 4] {
        let type_count = (self.finger_count & Self::FINGER_COUNT_MASK) | (self.scroll_type & Self::TYPE_MASK);
        let dist_dir = (self.direction & Self::DIRECTION_MASK) | (((self.distance & 0x0F) as u8) << 4);
        let distance = (self.distance >> 4) as u8;
        [type_count, 0, dist_dir, distance]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 4 {
            return Err(ReportError::LengthMismatch {
                expected: 4,
                got: buf.len(),
            });
        }
        let distance = (buf[2] as u16 >> 4) | ((buf[3] as u16) << 4);
        Ok(Self {
            finger_count: buf[0] & Self::FINGER_COUNT_MASK,
            scroll_type: buf[0] & Self::TYPE_MASK,
            direction: buf[2] & Self::DIRECTION_MASK,
            distance,
        })
    }
}

/// A single Gesture Pinch report (`spec.md` §6 Table 28, from
/// `zid_gesturePinch_data_t`): direction, finger-present flag, a 12-bit
/// distance, and a 12-bit center location.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GesturePinch {
    pub direction_apart: bool,
    pub finger_present: bool,
    pub distance: u16,
    pub center_x: u16,
    pub center_y: u16,
}

impl GesturePinch {
    const DIR_BIT: u8 = 1 << 0;
    const FINGER_PRESENT_BIT: u8 = 1 << 1;

    pub fn encode(&self) -> [u8; 6] {
        let mut finger_dir = 0u8;
        if self.direction_apart {
            finger_dir |= Self::DIR_BIT;
        }
        if self.finger_present {
            finger_dir |= Self::FINGER_PRESENT_BIT;
        }
        let dist_low = self.distance as u8;
        let dist_high = ((self.distance >> 8) & 0x0F) as u8;
        let center_x = self.center_x.to_le_bytes();
        let center_xy = (center_x[1] & 0x0F) | (((self.center_y & 0x0F) as u8) << 4);
        let center_y = (self.center_y >> 4) as u8;
        [finger_dir, dist_low, dist_high, center_x[0], center_xy, center_y]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 6 {
            return Err(ReportError::LengthMismatch {
                expected: 6,
                got: buf.len(),
            });
        }
        let distance = ((buf[2] as u16 & 0x0F) << 8) | buf[1] as u16;
        let center_x = ((buf[4] as u16 & 0x0F) << 8) | buf[3] as u16;
        let center_y = (buf[4] as u16 >> 4) | ((buf[5] as u16) << 4);
        Ok(Self {
            direction_apart: buf[0] & Self::DIR_BIT != 0,
            finger_present: buf[0] & Self::FINGER_PRESENT_BIT != 0,
            distance,
            center_x,
            center_y,
        })
    }
}

/// A single Gesture Rotate report (`spec.md` §6, from
/// `zid_gestureRotate_data_t`): rotation direction, finger-present flag, and
/// a magnitude.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureRotate {
    pub clockwise: bool,
    pub finger_present: bool,
    pub magnitude: u8,
}

impl GestureRotate {
    const DIR_BIT: u8 = 1 << 0;
    const FINGER_PRESENT_BIT: u8 = 1 << 1;

    pub fn encode(&self) -> [u8; 2] {
        let mut finger_dir = 0u8;
        if self.clockwise {
            finger_dir |= Self::DIR_BIT;
        }
        if self.finger_present {
            finger_dir |= Self::FINGER_PRESENT_BIT;
        }
        [finger_dir, self.magnitude]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 2 {
            return Err(ReportError::LengthMismatch {
                expected: 2,
                got: buf.len(),
            });
        }
        Ok(Self {
            clockwise: buf[0] & Self::DIR_BIT != 0,
            finger_present: buf[0] & Self::FINGER_PRESENT_BIT != 0,
            magnitude: buf[1],
        })
    }
}

/// A single Gesture Sync report (`spec.md` §6, from
/// `zid_gestureSync_data_t`): contact count and a gesture-active flag.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureSync {
    pub contact_count: u8,
    pub gesture_active: bool,
}

impl GestureSync {
    const COUNT_MASK: u8 = 0x0F;
    const ACTIVE_BIT: u8 = 1 << 4;

    pub fn encode(&self) -> [u8; 1] {
        let mut b = self.contact_count & Self::COUNT_MASK;
        if self.gesture_active {
            b |= Self::ACTIVE_BIT;
        }
        [b]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 1 {
            return Err(ReportError::LengthMismatch {
                expected: 1,
                got: buf.len(),
            });
        }
        Ok(Self {
            contact_count: buf[0] & Self::COUNT_MASK,
            gesture_active: buf[0] & Self::ACTIVE_BIT != 0,
        })
    }
}

/// A single Touch Sensor Properties report (`spec.md` §6 Tables 19-20, from
/// `zid_touchSensorProperties_data_t`): additional-contact count, origin,
/// reliability/gesture flags, resolution, a 12-bit maximum coordinate pair,
/// and shape.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSensorProps {
    pub num_additional_contacts: u8,
    pub origin: u8,
    pub reliable_index: bool,
    pub gestures: bool,
    pub resolution_x: u8,
    pub resolution_y: u8,
    pub max_coordinate_x: u16,
    pub max_coordinate_y: u16,
    pub shape: u8,
}

impl TouchSensorProps {
    const ADDITIONAL_CONTACTS_MASK: u8 = 0x0F;
    const ORIGIN_MASK: u8 = 0x30;
    const RELIABLE_INDEX_BIT: u8 = 1 << 6;
    const GESTURES_BIT: u8 = 1 << 7;
    const SHAPE_MASK: u8 = 0x07;

    pub fn encode(&self) -> [u8; 7] {
        let mut ges_rel_ori_add = (self.num_additional_contacts & Self::ADDITIONAL_CONTACTS_MASK)
            | (self.origin & Self::ORIGIN_MASK);
        if self.reliable_index {
            ges_rel_ori_add |= Self::RELIABLE_INDEX_BIT;
        }
        if self.gestures {
            ges_rel_ori_add |= Self::GESTURES_BIT;
        }
        let max_coordinate_x_high = (self.max_coordinate_x >> 4) as u8;
        let max_coordinate_y = self.max_coordinate_y.to_le_bytes();
        let max_coordinate_x_y = ((self.max_coordinate_y >> 8) as u8 & 0x0F) | (((self.max_coordinate_x & 0x0F) as u8) << 4);
        [
            ges_rel_ori_add,
            self.resolution_x,
            self.resolution_y,
            max_coordinate_x_high,
            max_coordinate_x_y,
            max_coordinate_y[0],
            self.shape & Self::SHAPE_MASK,
        ]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 7 {
            return Err(ReportError::LengthMismatch {
                expected: 7,
                got: buf.len(),
            });
        }
        let max_coordinate_x = ((buf[4] as u16 & 0xF0) >> 4) | ((buf[3] as u16) << 4);
        let max_coordinate_y = ((buf[4] as u16 & 0x0F) << 8) | buf[5] as u16;
        Ok(Self {
            num_additional_contacts: buf[0] & Self::ADDITIONAL_CONTACTS_MASK,
            origin: buf[0] & Self::ORIGIN_MASK,
            reliable_index: buf[0] & Self::RELIABLE_INDEX_BIT != 0,
            gestures: buf[0] & Self::GESTURES_BIT != 0,
            resolution_x: buf[1],
            resolution_y: buf[2],
            max_coordinate_x,
            max_coordinate_y,
            shape: buf[6] & Self::SHAPE_MASK,
        })
    }
}

/// A single Tap Support Properties report (`spec.md` §6, from
/// `zid_tapSupportProperties_data_t`): which tap gestures the sensor
/// supports.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapSupportProps {
    pub single_tap: bool,
    pub tap_and_a_half: bool,
    pub double_tap: bool,
    pub long_tap: bool,
}

impl TapSupportProps {
    const SINGLE_TAP_BIT: u8 = 1 << 0;
    const TAP_AND_A_HALF_BIT: u8 = 1 << 1;
    const DOUBLE_TAP_BIT: u8 = 1 << 2;
    const LONG_TAP_BIT: u8 = 1 << 3;

    pub fn encode(&self) -> [u8; 4] {
        let mut b = 0u8;
        if self.single_tap {
            b |= Self::SINGLE_TAP_BIT;
        }
        if self.tap_and_a_half {
            b |= Self::TAP_AND_A_HALF_BIT;
        }
        if self.double_tap {
            b |= Self::DOUBLE_TAP_BIT;
        }
        if self.long_tap {
            b |= Self::LONG_TAP_BIT;
        }
        [b, 0, 0, 0]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != 4 {
            return Err(ReportError::LengthMismatch {
                expected: 4,
                got: buf.len(),
            });
        }
        Ok(Self {
            single_tap: buf[0] & Self::SINGLE_TAP_BIT != 0,
            tap_and_a_half: buf[0] & Self::TAP_AND_A_HALF_BIT != 0,
            double_tap: buf[0] & Self::DOUBLE_TAP_BIT != 0,
            long_tap: buf[0] & Self::LONG_TAP_BIT != 0,
        })
    }
}

/// One reported record `{len, type, id, data[len-2]}` (`spec.md` §6).
pub const MAX_REPORT_DATA_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub report_type: ReportType,
    pub id: u8,
    pub data: heapless::Vec<u8, MAX_REPORT_DATA_LEN>,
}

impl ReportRecord {
    /// Encode as `{len, type, id, data...}`. `len` covers `type` + `id` +
    /// `data` (`spec.md` §6).
    pub fn encode(&self, buf: &mut heapless::Vec<u8, { MAX_REPORT_DATA_LEN + 3 }>) {
        let len = (self.data.len() + 2) as u8;
        let _ = buf.push(len);
        let _ = buf.push(self.report_type as u8);
        let _ = buf.push(self.id);
        let _ = buf.extend_from_slice(&self.data);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ReportError> {
        if buf.len() < 3 {
            return Err(ReportError::LengthMismatch {
                expected: 3,
                got: buf.len(),
            });
        }
        let len = buf[0] as usize;
        if len < 2 || buf.len() < 1 + len {
            return Err(ReportError::LengthMismatch {
                expected: 1 + len,
                got: buf.len(),
            });
        }
        let report_type =
            ReportType::from_u8(buf[1]).ok_or(ReportError::UnknownReportId)?;
        let id = buf[2];
        let mut data = heapless::Vec::new();
        let _ = data.extend_from_slice(&buf[3..1 + len]);
        Ok((
            ReportRecord {
                report_type,
                id,
                data,
            },
            1 + len,
        ))
    }
}
