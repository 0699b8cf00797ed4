//! # Object dictionary addresses
//!
//! Fixed EPOS object addresses. These must not change, the firmware expects exactly these.

use std::fmt;

/// An object dictionary entry address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Object {
    pub index: u16,
    pub subindex: u8,
}

impl Object {
    pub const fn new(index: u16, subindex: u8) -> Self {
        Self { index, subindex }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}/{:#04x}", self.index, self.subindex)
    }
}

// Communication profile
pub const ERROR_REGISTER: Object = Object::new(0x1001, 0x00);
pub const NUMBER_OF_ERRORS: Object = Object::new(0x1003, 0x00);
pub const STORE_PARAMETERS: Object = Object::new(0x1010, 0x01);
pub const RESTORE_DEFAULT_PARAMETERS: Object = Object::new(0x1011, 0x01);

/// First entry of the error history, entries are at subindices 1 to 5.
pub const ERROR_HISTORY_INDEX: u16 = 0x1003;
pub const ERROR_HISTORY_LEN: u8 = 5;

// Manufacturer specific
pub const VELOCITY_ACTUAL_AVERAGED: Object = Object::new(0x2028, 0x00);
pub const VELOCITY_MODE_SETTING_VALUE: Object = Object::new(0x206B, 0x00);
pub const DIGITAL_OUTPUTS: Object = Object::new(0x2078, 0x01);
pub const CURRENT_THRESHOLD_HOMING: Object = Object::new(0x2080, 0x00);
pub const HOME_POSITION: Object = Object::new(0x2081, 0x00);
pub const INTERPOLATION_DATA_RECORD: Object = Object::new(0x20C1, 0x00);
pub const INTERPOLATION_BUFFER_STATUS: Object = Object::new(0x20C4, 0x01);
pub const INTERPOLATION_BUFFER_UNDERFLOW_WARNING: Object = Object::new(0x20C4, 0x02);
pub const INTERPOLATION_BUFFER_OVERFLOW_WARNING: Object = Object::new(0x20C4, 0x03);

// Device profile
pub const CONTROLWORD: Object = Object::new(0x6040, 0x00);
pub const STATUSWORD: Object = Object::new(0x6041, 0x00);
pub const MODES_OF_OPERATION: Object = Object::new(0x6060, 0x00);
pub const MODES_OF_OPERATION_DISPLAY: Object = Object::new(0x6061, 0x00);
pub const POSITION_DEMAND_VALUE: Object = Object::new(0x6062, 0x00);
pub const POSITION_ACTUAL_VALUE: Object = Object::new(0x6064, 0x00);
pub const MAX_FOLLOWING_ERROR: Object = Object::new(0x6065, 0x00);
pub const POSITION_WINDOW: Object = Object::new(0x6067, 0x00);
pub const VELOCITY_ACTUAL_VALUE: Object = Object::new(0x606C, 0x00);
pub const CURRENT_ACTUAL_VALUE: Object = Object::new(0x6078, 0x00);
pub const TARGET_POSITION: Object = Object::new(0x607A, 0x00);
pub const HOME_OFFSET: Object = Object::new(0x607C, 0x00);
pub const MIN_POSITION_LIMIT: Object = Object::new(0x607D, 0x01);
pub const MAX_POSITION_LIMIT: Object = Object::new(0x607D, 0x02);
pub const MAX_PROFILE_VELOCITY: Object = Object::new(0x607F, 0x00);
pub const PROFILE_VELOCITY: Object = Object::new(0x6081, 0x00);
pub const PROFILE_ACCELERATION: Object = Object::new(0x6083, 0x00);
pub const PROFILE_DECELERATION: Object = Object::new(0x6084, 0x00);
pub const QUICK_STOP_DECELERATION: Object = Object::new(0x6085, 0x00);
pub const MOTION_PROFILE_TYPE: Object = Object::new(0x6086, 0x00);
pub const HOMING_METHOD: Object = Object::new(0x6098, 0x00);
pub const SPEED_FOR_SWITCH_SEARCH: Object = Object::new(0x6099, 0x01);
pub const SPEED_FOR_ZERO_SEARCH: Object = Object::new(0x6099, 0x02);
pub const HOMING_ACCELERATION: Object = Object::new(0x609A, 0x00);
pub const INTERPOLATION_SUB_MODE: Object = Object::new(0x60C0, 0x00);
pub const INTERPOLATION_TIME_PERIOD: Object = Object::new(0x60C2, 0x01);
pub const INTERPOLATION_TIME_INDEX: Object = Object::new(0x60C2, 0x02);
pub const INTERPOLATION_BUFFER_SIZE: Object = Object::new(0x60C4, 0x02);
pub const INTERPOLATION_BUFFER_POSITION: Object = Object::new(0x60C4, 0x04);
pub const INTERPOLATION_BUFFER_CLEAR: Object = Object::new(0x60C4, 0x06);
pub const TARGET_VELOCITY: Object = Object::new(0x60FF, 0x00);
