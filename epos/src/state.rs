//! # CiA-402 device states, controlwords and operation modes

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Statusword bits, firmware specification 14.1.58.
pub mod status_bits {
    pub const READY_TO_SWITCH_ON: u16 = 1 << 0;
    pub const SWITCHED_ON: u16 = 1 << 1;
    pub const OPERATION_ENABLE: u16 = 1 << 2;
    pub const FAULT: u16 = 1 << 3;
    pub const VOLTAGE_ENABLED: u16 = 1 << 4;
    pub const QUICK_STOP: u16 = 1 << 5;
    pub const SWITCH_ON_DISABLED: u16 = 1 << 6;
    pub const WARNING: u16 = 1 << 7;
    pub const OFFSET_CURRENT_MEASURED: u16 = 1 << 8;
    pub const REMOTE: u16 = 1 << 9;
    pub const TARGET_REACHED: u16 = 1 << 10;
    pub const HOMING_ATTAINED: u16 = 1 << 12;
    pub const HOMING_ERROR: u16 = 1 << 13;
    pub const REFRESH: u16 = 1 << 14;
    pub const REFERENCED: u16 = 1 << 15;
}

/// Bits of the statusword which identify the device state.
pub const STATE_MASK: u16 = 0x417F;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// State of the device as decoded from the statusword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActualState {
    Start,
    NotReadyToSwitchOn,
    SwitchOnDisabled,
    ReadyToSwitchOn,
    SwitchedOn,
    Refresh,
    MeasureInit,
    OperationEnable,
    QuickStopActive,
    FaultReactionActiveDisabled,
    FaultReactionActiveEnabled,
    Fault,
    Unknown,
}

/// State transitions which can be requested through the controlword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesiredState {
    Shutdown,
    SwitchOn,
    SwitchOnAndEnable,
    DisableVoltage,
    Quickstop,
    DisableOperation,
    EnableOperation,
    FaultReset,
}

/// Modes of operation, object 0x6060.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    InterpolatedPosition,
    Homing,
    ProfileVelocity,
    ProfilePosition,
    Position,
    Velocity,
    Current,
    MasterEncoder,
    StepDirection,
    /// A value the device reported which has no named mode
    Other(i8),
}

/// Homing methods, object 0x6098.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomingMethod {
    ActualPosition,
    IndexPositiveSpeed,
    IndexNegativeSpeed,
    HomeSwitchNegativeSpeed,
    HomeSwitchPositiveSpeed,
    PositiveLimitSwitch,
    NegativeLimitSwitch,
    HomeSwitchNegativeSpeedAndIndex,
    HomeSwitchPositiveSpeedAndIndex,
    PositiveLimitSwitchAndIndex,
    NegativeLimitSwitchAndIndex,
    PositiveCurrentThreshold,
    NegativeCurrentThreshold,
    PositiveCurrentThresholdAndIndex,
    NegativeCurrentThresholdAndIndex,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActualState {
    /// Every named state, in firmware order.
    pub const NAMED: [ActualState; 12] = [
        ActualState::Start,
        ActualState::NotReadyToSwitchOn,
        ActualState::SwitchOnDisabled,
        ActualState::ReadyToSwitchOn,
        ActualState::SwitchedOn,
        ActualState::Refresh,
        ActualState::MeasureInit,
        ActualState::OperationEnable,
        ActualState::QuickStopActive,
        ActualState::FaultReactionActiveDisabled,
        ActualState::FaultReactionActiveEnabled,
        ActualState::Fault,
    ];

    /// The statusword bits, under [`STATE_MASK`], which identify a named state.
    pub fn pattern(&self) -> Option<u16> {
        use ActualState::*;

        Some(match self {
            Start => 0x0000,
            NotReadyToSwitchOn => 0x0100,
            SwitchOnDisabled => 0x0140,
            ReadyToSwitchOn => 0x0121,
            SwitchedOn => 0x0123,
            Refresh => 0x4123,
            MeasureInit => 0x4133,
            OperationEnable => 0x0137,
            QuickStopActive => 0x0117,
            FaultReactionActiveDisabled => 0x010F,
            FaultReactionActiveEnabled => 0x011F,
            Fault => 0x0108,
            Unknown => return None,
        })
    }

    /// Decode a statusword. Bits outside [`STATE_MASK`] are ignored.
    pub fn from_statusword(word: u16) -> Self {
        let masked = word & STATE_MASK;

        Self::NAMED
            .iter()
            .copied()
            .find(|s| s.pattern() == Some(masked))
            .unwrap_or(ActualState::Unknown)
    }

    /// Longer description of what the drive is doing in this state.
    pub fn description(&self) -> &'static str {
        use ActualState::*;

        match self {
            Start => "Bootup",
            NotReadyToSwitchOn => "Current offset will be measured, drive function is disabled",
            SwitchOnDisabled => "Drive initialization is complete, drive function is disabled",
            ReadyToSwitchOn => "Drive parameters may be changed, drive function is disabled",
            SwitchedOn => "Drive function is disabled",
            Refresh => "Refresh of power stage",
            MeasureInit => "Power is applied to the motor, motor resistance is measured",
            OperationEnable => "Drive function is enabled and power is applied to the motor",
            QuickStopActive => "Quickstop function is being executed",
            FaultReactionActiveDisabled => "A fault has occurred, drive function is disabled",
            FaultReactionActiveEnabled => "A fault has occurred, fault reaction is executed",
            Fault => "A fault has occurred in the drive, drive function is disabled",
            Unknown => "Statusword does not match any state",
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ActualState::Fault
                | ActualState::FaultReactionActiveDisabled
                | ActualState::FaultReactionActiveEnabled
        )
    }
}

impl fmt::Display for ActualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ActualState::*;

        let s = match self {
            Start => "START",
            NotReadyToSwitchOn => "NOT_READY_TO_SWITCH_ON",
            SwitchOnDisabled => "SWITCH_ON_DISABLED",
            ReadyToSwitchOn => "READY_TO_SWITCH_ON",
            SwitchedOn => "SWITCHED_ON",
            Refresh => "REFRESH",
            MeasureInit => "MEASURE_INIT",
            OperationEnable => "OPERATION_ENABLE",
            QuickStopActive => "QUICK_STOP_ACTIVE",
            FaultReactionActiveDisabled => "FAULT_REACTION_ACTIVE_DISABLED",
            FaultReactionActiveEnabled => "FAULT_REACTION_ACTIVE_ENABLED",
            Fault => "FAULT",
            Unknown => "UNKNOWN",
        };

        write!(f, "{}", s)
    }
}

impl DesiredState {
    /// The controlword writes which request this transition, in order.
    ///
    /// The old controlword is never read back, only the listed words are written.
    pub fn controlwords(&self) -> &'static [u16] {
        match self {
            DesiredState::Shutdown => &[0x0006],
            DesiredState::SwitchOn => &[0x0007],
            DesiredState::SwitchOnAndEnable => &[0x000F],
            DesiredState::DisableVoltage => &[0x0000],
            DesiredState::Quickstop => &[0x0002],
            DesiredState::DisableOperation => &[0x0007],
            DesiredState::EnableOperation => &[0x000F],
            DesiredState::FaultReset => &[0x0000, 0x0080],
        }
    }
}

impl OperationMode {
    pub fn to_raw(self) -> i8 {
        match self {
            OperationMode::InterpolatedPosition => 7,
            OperationMode::Homing => 6,
            OperationMode::ProfileVelocity => 3,
            OperationMode::ProfilePosition => 1,
            OperationMode::Position => -1,
            OperationMode::Velocity => -2,
            OperationMode::Current => -3,
            OperationMode::MasterEncoder => -5,
            OperationMode::StepDirection => -6,
            OperationMode::Other(m) => m,
        }
    }

    pub fn from_raw(raw: i8) -> Self {
        match raw {
            7 => OperationMode::InterpolatedPosition,
            6 => OperationMode::Homing,
            3 => OperationMode::ProfileVelocity,
            1 => OperationMode::ProfilePosition,
            -1 => OperationMode::Position,
            -2 => OperationMode::Velocity,
            -3 => OperationMode::Current,
            -5 => OperationMode::MasterEncoder,
            -6 => OperationMode::StepDirection,
            m => OperationMode::Other(m),
        }
    }
}

impl HomingMethod {
    pub fn to_raw(self) -> i8 {
        use HomingMethod::*;

        match self {
            ActualPosition => 35,
            IndexPositiveSpeed => 34,
            IndexNegativeSpeed => 33,
            HomeSwitchNegativeSpeed => 27,
            HomeSwitchPositiveSpeed => 23,
            PositiveLimitSwitch => 18,
            NegativeLimitSwitch => 17,
            HomeSwitchNegativeSpeedAndIndex => 11,
            HomeSwitchPositiveSpeedAndIndex => 7,
            PositiveLimitSwitchAndIndex => 2,
            NegativeLimitSwitchAndIndex => 1,
            PositiveCurrentThreshold => -3,
            NegativeCurrentThreshold => -4,
            PositiveCurrentThresholdAndIndex => -1,
            NegativeCurrentThresholdAndIndex => -2,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decode a statusword into the device state, logging a warning for unknown words.
pub fn status2state(word: u16) -> ActualState {
    let state = ActualState::from_statusword(word);

    if state == ActualState::Unknown {
        warn!("EPOS status word {:#06x} is an unknown state", word);
    }

    state
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_status2state_named_patterns() {
        assert_eq!(status2state(0x0000), ActualState::Start);
        assert_eq!(status2state(0x0140), ActualState::SwitchOnDisabled);
        assert_eq!(status2state(0x0121), ActualState::ReadyToSwitchOn);
        assert_eq!(status2state(0x0137), ActualState::OperationEnable);
        assert_eq!(status2state(0x0108), ActualState::Fault);

        // Remote, target reached, homing and referenced bits don't change the state
        assert_eq!(status2state(0x0137 | 0x8000 | 0x1000 | 0x0400 | 0x0200), ActualState::OperationEnable);
        // The warning bit isn't part of the state
        assert_eq!(status2state(0x0108 | 0x0080), ActualState::Fault);

        assert_eq!(status2state(0x0001), ActualState::Unknown);
        assert_eq!(status2state(0x4137), ActualState::Unknown);
    }

    #[test]
    fn test_status2state_total_and_pure() {
        let mut counts: HashMap<ActualState, usize> = HashMap::new();

        for word in 0..=u16::MAX {
            let state = ActualState::from_statusword(word);
            assert_eq!(state, ActualState::from_statusword(word));
            *counts.entry(state).or_insert(0) += 1;
        }

        // 12 named states plus unknown, each named state owns 2^7 words (7 don't care bits)
        assert_eq!(counts.len(), 13);
        for s in ActualState::NAMED.iter() {
            assert_eq!(counts[s], 128, "{}", s);
        }
        assert_eq!(counts[&ActualState::Unknown], 65536 - 12 * 128);
    }

    #[test]
    fn test_patterns_round_trip() {
        for s in ActualState::NAMED.iter() {
            assert_eq!(ActualState::from_statusword(s.pattern().unwrap()), *s);
        }
    }

    #[test]
    fn test_modes() {
        for raw in -6i8..=7 {
            assert_eq!(OperationMode::from_raw(raw).to_raw(), raw);
        }
        assert_eq!(OperationMode::from_raw(-2), OperationMode::Velocity);
        assert_eq!(HomingMethod::ActualPosition.to_raw(), 35);
        assert_eq!(DesiredState::FaultReset.controlwords(), &[0x0000, 0x0080]);
    }
}
