//! # EPOS node driver
//!
//! [`Epos`] drives one Maxon EPOS motor controller through the CiA-402 state machine. All
//! communication goes through the node's [`Gateway`], every wait is a bounded poll at a fixed
//! period.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

use util::time::Ticker;

use crate::{
    diag,
    error::{EposError, ErrorKind},
    gateway::{Gateway, GatewayError, NmtService, ObjectValue},
    od::{self, Object},
    state::{status2state, status_bits, ActualState, DesiredState, OperationMode},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Period of every state polling loop.
pub const POLL_PERIOD: Duration = Duration::from_millis(5);

/// Statusword reads allowed for the shutdown transition of [`Epos::enable`].
pub const SHUTDOWN_RETRIES: u32 = 5;

/// Statusword reads allowed for the enable operation transition of [`Epos::enable`].
pub const ENABLE_RETRIES: u32 = 25;

/// Statusword reads allowed to leave the fault state in [`Epos::clear_fault`].
pub const FAULT_RESET_RETRIES: u32 = 5;

/// Attempts at an object read or write which goes unanswered, one [`POLL_PERIOD`] apart.
pub const BUS_RETRIES: u32 = 3;

/// Enable operation with the halt bit set.
pub(crate) const CW_ENABLE_HALT: u16 = 0x010F;
pub(crate) const CW_START_ABSOLUTE: u16 = 0x003F;
pub(crate) const CW_START_RELATIVE: u16 = 0x005F;
pub(crate) const CW_START: u16 = 0x001F;

/// Position limit values which disable the limits.
const POSITION_LIMIT_DISABLED_MIN: i32 = -0x8000_0000;
const POSITION_LIMIT_DISABLED_MAX: i32 = 0x7FFF_FFFF;

/// `"save"` as a little-endian u32.
const STORE_SIGNATURE: u32 = 0x6576_6173;
/// `"load"` as a little-endian u32.
const RESTORE_SIGNATURE: u32 = 0x6461_6f6c;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Driver for a single EPOS node.
pub struct Epos<G: Gateway> {
    pub(crate) gateway: G,

    node_id: u8,

    device_name: String,

    /// `'<name>' (CanID <id>)`, used in every log line and error
    description: String,

    op_mode: OperationMode,
    profile_velocity: u32,
    profile_acceleration: u32,
    profile_deceleration: u32,
    target_velocity: i32,
    digital_outputs: [bool; 8],
    remote: bool,

    /// Upper bound on the number of polls of any homing monitoring loop
    pub(crate) homing_max_polls: u32,
}

/// One sample of the node's operating figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Telemetry {
    pub position: i32,
    pub velocity: i32,
    pub current: i16,
    pub statusword: u16,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Verdict of one iteration of a state polling loop.
pub(crate) enum Poll {
    Done,
    Continue,
    Fail(ErrorKind),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<G: Gateway> Epos<G> {
    /// Create the driver for a node, reading the node's current settings into the cache.
    pub fn new(gateway: G, node_id: u8, device_name: &str) -> Result<Self, EposError> {
        let description = format!("'{}' (CanID {})", device_name, node_id);

        let mut epos = Self {
            gateway,
            node_id,
            device_name: device_name.to_string(),
            description,
            op_mode: OperationMode::Other(0),
            profile_velocity: 0,
            profile_acceleration: 0,
            profile_deceleration: 0,
            target_velocity: 0,
            digital_outputs: [false; 8],
            remote: false,
            homing_max_polls: 12_000,
        };

        epos.op_mode = epos.get_actual_operation_mode()?;
        epos.profile_velocity = epos.read(od::PROFILE_VELOCITY)?;
        epos.profile_acceleration = epos.read(od::PROFILE_ACCELERATION)?;
        epos.profile_deceleration = epos.read(od::PROFILE_DECELERATION)?;
        epos.target_velocity = epos.read(od::TARGET_VELOCITY)?;
        epos.remote = Self::is_remote_operation_enabled(epos.get_statusword()?);

        let outputs: u16 = epos.read(od::DIGITAL_OUTPUTS)?;
        for (i, out) in epos.digital_outputs.iter_mut().enumerate() {
            *out = outputs & (1 << (15 - i)) != 0;
        }

        debug!(
            "EPOS node {}: mode {:?}, profile {{V,A,D}} {}, {}, {}",
            epos.description,
            epos.op_mode,
            epos.profile_velocity,
            epos.profile_acceleration,
            epos.profile_deceleration
        );

        Ok(epos)
    }

    /// Limit the number of 5 ms polls a homing run may take before it is abandoned.
    pub fn with_homing_max_polls(mut self, polls: u32) -> Self {
        self.homing_max_polls = polls;
        self
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Description of the node used in logs, `'<name>' (CanID <id>)`.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ---- STATE MACHINE ----

    pub fn get_statusword(&mut self) -> Result<u16, EposError> {
        self.read(od::STATUSWORD)
    }

    /// Read and decode the device state.
    pub fn get_state(&mut self) -> Result<ActualState, EposError> {
        let word = self.get_statusword()?;
        Ok(status2state(word))
    }

    pub fn set_controlword(&mut self, word: u16) -> Result<(), EposError> {
        self.write(od::CONTROLWORD, word)
    }

    /// Request a state transition by writing the matching controlword(s).
    pub fn set_state(&mut self, state: DesiredState) -> Result<(), EposError> {
        for cw in state.controlwords() {
            self.set_controlword(*cw)?;
        }
        Ok(())
    }

    /// Bring the device into OPERATION_ENABLE with the halt bit set.
    ///
    /// A device in FAULT is never reset here: the error register and history are logged and a
    /// [`ErrorKind::Fault`] returned. Use [`Epos::clear_fault`] to recover.
    pub fn enable(&mut self) -> Result<(), EposError> {
        let word = self.get_statusword()?;
        let state = status2state(word);

        info!(
            "EPOS node {}: resetting from state '{}'",
            self.description, state
        );

        match state {
            ActualState::Fault => {
                let reg = self.get_error_register()?;
                if reg != 0 {
                    self.log_error_register(reg);
                    let num = self.get_number_of_errors()?;
                    self.log_error_history(num)?;
                }

                return Err(self.err(ErrorKind::Fault));
            }
            ActualState::Unknown => return Err(self.err(ErrorKind::UnknownState(word))),
            ActualState::OperationEnable => (),
            _ => {
                self.set_state(DesiredState::Shutdown)?;

                let desc = self.description.clone();
                self.poll_state(SHUTDOWN_RETRIES, "shutting device down", |s| match s {
                    ActualState::ReadyToSwitchOn | ActualState::QuickStopActive => Poll::Done,
                    ActualState::Fault => Poll::Fail(ErrorKind::Fault),
                    other => {
                        debug!(
                            "EPOS node {}: transited to state '{}' during shutdown",
                            desc, other
                        );
                        Poll::Continue
                    }
                })?;

                self.set_state(DesiredState::EnableOperation)?;

                self.poll_state(ENABLE_RETRIES, "enabling device", |s| match s {
                    ActualState::OperationEnable => Poll::Done,
                    ActualState::SwitchedOn | ActualState::MeasureInit | ActualState::Refresh => {
                        Poll::Continue
                    }
                    ActualState::Fault => Poll::Fail(ErrorKind::Fault),
                    other => {
                        debug!(
                            "EPOS node {}: transited to state '{}' during initialization",
                            desc, other
                        );
                        Poll::Continue
                    }
                })?;
            }
        }

        self.set_controlword(CW_ENABLE_HALT)?;

        let state = self.get_state()?;
        if state != ActualState::OperationEnable {
            return Err(self.err(ErrorKind::UnexpectedState {
                expected: "Operation Enable",
                found: state,
            }));
        }

        info!("EPOS node {}: reset OK", self.description);

        Ok(())
    }

    /// Recover a device from FAULT, then [`Epos::enable`] it.
    ///
    /// The error register and history are logged and the history cleared before the fault reset
    /// is issued.
    pub fn clear_fault(&mut self) -> Result<(), EposError> {
        let state = self.get_state()?;

        info!(
            "EPOS node {}: is in state {} ({})",
            self.description,
            state,
            state.description()
        );

        if state == ActualState::Fault {
            let reg = self.get_error_register()?;
            self.log_error_register(reg);

            let num = self.get_number_of_errors()?;
            info!("EPOS node {}: number of errors = {}", self.description, num);
            self.log_error_history(num)?;

            if num > 0 {
                self.clear_number_of_errors()?;
            }

            self.set_state(DesiredState::FaultReset)?;

            let retries = self
                .poll_state(FAULT_RESET_RETRIES, "recovering from fault", |s| match s {
                    ActualState::Fault => Poll::Continue,
                    _ => Poll::Done,
                })
                .map_err(|e| match e.kind {
                    ErrorKind::Timeout(_) => self.err(ErrorKind::FaultNotRecovered),
                    _ => e,
                })?
                .1;

            info!(
                "EPOS node {}: recovering in {} retries",
                self.description, retries
            );
        }

        self.enable()
    }

    /// Stop the motion with the quick stop deceleration.
    pub fn quick_stop(&mut self) -> Result<(), EposError> {
        self.set_state(DesiredState::Quickstop)
    }

    // ---- ERRORS ----

    pub fn get_error_register(&mut self) -> Result<u8, EposError> {
        self.read(od::ERROR_REGISTER)
    }

    pub fn get_number_of_errors(&mut self) -> Result<u8, EposError> {
        self.read(od::NUMBER_OF_ERRORS)
    }

    /// Read the error history entry at `num`, which must be in 1..=5.
    pub fn get_error_history(&mut self, num: u8) -> Result<u32, EposError> {
        if num < 1 || num > od::ERROR_HISTORY_LEN {
            return Err(self.err(ErrorKind::ErrorHistoryIndex(num)));
        }
        self.read(Object::new(od::ERROR_HISTORY_INDEX, num))
    }

    pub fn clear_number_of_errors(&mut self) -> Result<(), EposError> {
        self.write(od::NUMBER_OF_ERRORS, 0u8)
    }

    // ---- MODES AND PROFILES ----

    /// Set the operation mode. Nothing is written if the cached mode already matches.
    pub fn set_operation_mode(&mut self, mode: OperationMode) -> Result<(), EposError> {
        if self.op_mode != mode {
            self.write(od::MODES_OF_OPERATION, mode.to_raw())?;
            self.op_mode = mode;
        }
        Ok(())
    }

    pub fn get_actual_operation_mode(&mut self) -> Result<OperationMode, EposError> {
        let raw: i8 = self.read(od::MODES_OF_OPERATION_DISPLAY)?;
        Ok(OperationMode::from_raw(raw))
    }

    pub fn operation_mode(&self) -> OperationMode {
        self.op_mode
    }

    pub fn set_profile_velocity(&mut self, val: u32) -> Result<(), EposError> {
        if self.profile_velocity != val {
            self.write(od::PROFILE_VELOCITY, val)?;
            self.profile_velocity = val;
        }
        Ok(())
    }

    pub fn set_profile_acceleration(&mut self, val: u32) -> Result<(), EposError> {
        if self.profile_acceleration != val {
            self.write(od::PROFILE_ACCELERATION, val)?;
            self.profile_acceleration = val;
        }
        Ok(())
    }

    pub fn set_profile_deceleration(&mut self, val: u32) -> Result<(), EposError> {
        if self.profile_deceleration != val {
            self.write(od::PROFILE_DECELERATION, val)?;
            self.profile_deceleration = val;
        }
        Ok(())
    }

    pub fn profile(&self) -> (u32, u32, u32) {
        (
            self.profile_velocity,
            self.profile_acceleration,
            self.profile_deceleration,
        )
    }

    pub fn set_target_velocity(&mut self, val: i32) -> Result<(), EposError> {
        if self.target_velocity != val {
            self.write(od::TARGET_VELOCITY, val)?;
            self.target_velocity = val;
        }
        Ok(())
    }

    pub fn target_velocity(&self) -> i32 {
        self.target_velocity
    }

    pub fn set_quick_stop_deceleration(&mut self, val: u32) -> Result<(), EposError> {
        self.write(od::QUICK_STOP_DECELERATION, val)
    }

    pub fn get_quick_stop_deceleration(&mut self) -> Result<u32, EposError> {
        self.read(od::QUICK_STOP_DECELERATION)
    }

    pub fn set_max_profile_velocity(&mut self, val: u32) -> Result<(), EposError> {
        self.write(od::MAX_PROFILE_VELOCITY, val)
    }

    pub fn get_max_profile_velocity(&mut self) -> Result<u32, EposError> {
        self.read(od::MAX_PROFILE_VELOCITY)
    }

    pub fn set_position_profile_type(&mut self, val: i16) -> Result<(), EposError> {
        self.write(od::MOTION_PROFILE_TYPE, val)
    }

    pub fn set_position_window(&mut self, val: u32) -> Result<(), EposError> {
        self.write(od::POSITION_WINDOW, val)
    }

    pub fn get_max_following_error(&mut self) -> Result<u32, EposError> {
        self.read(od::MAX_FOLLOWING_ERROR)
    }

    pub fn set_max_following_error(&mut self, val: u32) -> Result<(), EposError> {
        self.write(od::MAX_FOLLOWING_ERROR, val)
    }

    // ---- MOTION ----

    pub fn set_target_position(&mut self, val: i32) -> Result<(), EposError> {
        self.write(od::TARGET_POSITION, val)
    }

    /// Start a profile position move to an absolute position, cancelling any ongoing move.
    pub fn move_absolute(&mut self, steps: i32) -> Result<(), EposError> {
        self.set_operation_mode(OperationMode::ProfilePosition)?;
        self.set_target_position(steps)?;
        self.set_controlword(CW_START_ABSOLUTE)
    }

    /// Start a profile position move relative to the current target.
    pub fn move_relative(&mut self, steps: i32) -> Result<(), EposError> {
        self.set_operation_mode(OperationMode::ProfilePosition)?;
        self.set_target_position(steps)?;
        self.set_controlword(CW_START_RELATIVE)
    }

    /// Velocity demand used in velocity mode.
    pub fn set_velocity_mode_setting_value(&mut self, val: i32) -> Result<(), EposError> {
        self.write(od::VELOCITY_MODE_SETTING_VALUE, val)
    }

    pub fn is_target_reached(&mut self) -> Result<bool, EposError> {
        Ok(self.get_statusword()? & status_bits::TARGET_REACHED != 0)
    }

    pub fn is_referenced(&mut self) -> Result<bool, EposError> {
        Ok(self.get_statusword()? & status_bits::REFERENCED != 0)
    }

    pub fn is_fault_state(&mut self) -> Result<bool, EposError> {
        Ok(self.get_statusword()? & status_bits::FAULT != 0)
    }

    // ---- TELEMETRY ----

    pub fn get_actual_position(&mut self) -> Result<i32, EposError> {
        self.read(od::POSITION_ACTUAL_VALUE)
    }

    pub fn get_demand_position(&mut self) -> Result<i32, EposError> {
        self.read(od::POSITION_DEMAND_VALUE)
    }

    pub fn get_actual_velocity(&mut self) -> Result<i32, EposError> {
        self.read(od::VELOCITY_ACTUAL_VALUE)
    }

    pub fn get_actual_velocity_averaged(&mut self) -> Result<i32, EposError> {
        self.read(od::VELOCITY_ACTUAL_AVERAGED)
    }

    pub fn get_actual_current(&mut self) -> Result<i16, EposError> {
        self.read(od::CURRENT_ACTUAL_VALUE)
    }

    /// Sample statusword, position, velocity and current, in that order.
    pub fn telemetry(&mut self) -> Result<Telemetry, EposError> {
        let statusword = self.get_statusword()?;

        Ok(Telemetry {
            position: self.get_actual_position()?,
            velocity: self.get_actual_velocity()?,
            current: self.get_actual_current()?,
            statusword,
        })
    }

    // ---- POSITION LIMITS ----

    pub fn get_min_position_limit(&mut self) -> Result<i32, EposError> {
        self.read(od::MIN_POSITION_LIMIT)
    }

    pub fn set_min_position_limit(&mut self, val: i32) -> Result<(), EposError> {
        self.write(od::MIN_POSITION_LIMIT, val)
    }

    pub fn get_max_position_limit(&mut self) -> Result<i32, EposError> {
        self.read(od::MAX_POSITION_LIMIT)
    }

    pub fn set_max_position_limit(&mut self, val: i32) -> Result<(), EposError> {
        self.write(od::MAX_POSITION_LIMIT, val)
    }

    pub fn disable_position_limits(&mut self) -> Result<(), EposError> {
        self.set_min_position_limit(POSITION_LIMIT_DISABLED_MIN)?;
        self.set_max_position_limit(POSITION_LIMIT_DISABLED_MAX)
    }

    // ---- DIGITAL OUTPUTS ----

    pub fn digital_outputs(&self) -> [bool; 8] {
        self.digital_outputs
    }

    /// Set the 8 general purpose outputs, output 0 maps to bit 15.
    pub fn set_digital_outputs(&mut self, outputs: [bool; 8]) -> Result<(), EposError> {
        if self.digital_outputs != outputs {
            let word = outputs
                .iter()
                .enumerate()
                .filter(|(_, on)| **on)
                .fold(0u16, |acc, (i, _)| acc | (1 << (15 - i)));

            self.write(od::DIGITAL_OUTPUTS, word)?;
            self.digital_outputs = outputs;
        }
        Ok(())
    }

    // ---- REMOTE OPERATION ----

    pub fn is_remote_operation_enabled(statusword: u16) -> bool {
        statusword & status_bits::REMOTE != 0
    }

    pub fn remote(&self) -> bool {
        self.remote
    }

    /// Start or stop remote operation with an NMT request, then check the remote bit.
    pub fn set_remote_operation(&mut self, enable: bool) -> Result<(), EposError> {
        if self.remote != enable {
            let service = if enable {
                NmtService::StartRemoteNode
            } else {
                NmtService::StopRemoteNode
            };

            let node = self.node_id;
            self.gateway
                .send_nmt(node, service)
                .map_err(|e| self.err(ErrorKind::Gateway(e)))?;

            self.remote = Self::is_remote_operation_enabled(self.get_statusword()?);

            if self.remote != enable {
                return Err(self.err(ErrorKind::RemoteState));
            }
        }
        Ok(())
    }

    // ---- PARAMETER STORAGE ----

    /// Save all parameters to the node's non-volatile memory.
    pub fn store(&mut self) -> Result<(), EposError> {
        self.write(od::STORE_PARAMETERS, STORE_SIGNATURE)
    }

    /// Restore the default parameters.
    pub fn restore(&mut self) -> Result<(), EposError> {
        self.write(od::RESTORE_DEFAULT_PARAMETERS, RESTORE_SIGNATURE)
    }

    // ---- INTERNALS ----

    pub(crate) fn err(&self, kind: ErrorKind) -> EposError {
        EposError {
            node_id: self.node_id,
            device: self.description.clone(),
            kind,
        }
    }

    pub(crate) fn read<T: ObjectValue>(&mut self, obj: Object) -> Result<T, EposError> {
        let node = self.node_id;
        let raw = self.with_bus_retries("read", obj, |gw| {
            gw.read_object(node, obj.index, obj.subindex)
        })?;
        Ok(T::from_raw(raw))
    }

    pub(crate) fn write<T: ObjectValue>(&mut self, obj: Object, value: T) -> Result<(), EposError> {
        let node = self.node_id;
        let data = value.to_bytes();
        self.with_bus_retries("write", obj, |gw| {
            gw.write_object(node, obj.index, obj.subindex, &data)
        })
    }

    /// Run an object transfer, repeating it every [`POLL_PERIOD`] while it goes unanswered.
    ///
    /// Other gateway errors, and a transfer still unanswered after [`BUS_RETRIES`] attempts, are
    /// device failures.
    fn with_bus_retries<R, F>(
        &mut self,
        what: &'static str,
        obj: Object,
        mut transfer: F,
    ) -> Result<R, EposError>
    where
        F: FnMut(&mut G) -> Result<R, GatewayError>,
    {
        let mut ticker = Ticker::new(POLL_PERIOD);
        let mut attempt = 1;

        loop {
            match transfer(&mut self.gateway) {
                Ok(r) => return Ok(r),
                Err(e) if e.is_transient() && attempt < BUS_RETRIES => {
                    debug!(
                        "EPOS node {}: {} of {} unanswered, attempt {}",
                        self.description, what, obj, attempt
                    );
                    attempt += 1;
                    ticker.wait();
                }
                Err(e) => {
                    warn!("EPOS node {}: {} of {} failed: {}", self.description, what, obj, e);
                    return Err(self.err(ErrorKind::Gateway(e)));
                }
            }
        }
    }

    /// Poll the device state every [`POLL_PERIOD`] until `check` accepts or rejects it, or
    /// `retries` reads have been made.
    ///
    /// Returns the accepted state and the number of reads it took. An UNKNOWN statusword always
    /// fails the poll.
    pub(crate) fn poll_state<F>(
        &mut self,
        retries: u32,
        what: &'static str,
        mut check: F,
    ) -> Result<(ActualState, u32), EposError>
    where
        F: FnMut(ActualState) -> Poll,
    {
        let mut ticker = Ticker::new(POLL_PERIOD);

        for attempt in 1..=retries {
            let word = self.get_statusword()?;
            let state = status2state(word);

            if state == ActualState::Unknown {
                return Err(self.err(ErrorKind::UnknownState(word)));
            }

            match check(state) {
                Poll::Done => return Ok((state, attempt)),
                Poll::Fail(kind) => return Err(self.err(kind)),
                Poll::Continue => (),
            }

            if attempt < retries {
                ticker.wait();
            }
        }

        warn!("EPOS node {}: timeout {}", self.description, what);
        Err(self.err(ErrorKind::Timeout(what)))
    }

    fn log_error_register(&self, reg: u8) {
        warn!(
            "EPOS node {}: error register = {:#04x}",
            self.description, reg
        );
        for msg in diag::error_register_messages(reg) {
            warn!("    {}", msg);
        }
    }

    /// Read and log the first `num` history entries, at most 5.
    fn log_error_history(&mut self, num: u8) -> Result<Vec<u32>, EposError> {
        let mut codes = Vec::new();

        for i in 1..=num.min(od::ERROR_HISTORY_LEN) {
            let code = self.get_error_history(i)?;
            warn!(
                "EPOS node {}: error at index {} is {:#x}: {}",
                self.description,
                i,
                code,
                diag::error_code_message(code)
            );
            codes.push(code);
        }

        Ok(codes)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{GatewayCall, SimGateway, SimTiming};

    fn node(timing: SimTiming) -> Epos<SimGateway> {
        let mut sim = SimGateway::new(timing);
        sim.add_node(1);
        Epos::new(sim, 1, "joint_1").unwrap()
    }

    #[test]
    fn test_enable_from_switch_on_disabled() {
        let mut epos = node(SimTiming {
            shutdown_reads: 3,
            enable_reads: 20,
            ..Default::default()
        });
        assert_eq!(epos.get_state().unwrap(), ActualState::SwitchOnDisabled);

        epos.enable().unwrap();
        assert_eq!(epos.get_state().unwrap(), ActualState::OperationEnable);

        // The last controlword is enable with halt
        let cws = epos.gateway().controlwords(1);
        assert_eq!(cws, vec![0x0006, 0x000F, 0x010F]);

        // Already enabled, only the halt controlword is written
        epos.enable().unwrap();
        assert_eq!(epos.gateway().controlwords(1).last(), Some(&0x010F));
        assert_eq!(epos.gateway().controlwords(1).len(), 4);
    }

    #[test]
    fn test_unanswered_requests_are_repeated() {
        let mut epos = node(SimTiming::default());

        epos.gateway.drop_responses(1, BUS_RETRIES - 1);
        epos.gateway.clear_calls();
        assert_eq!(epos.get_state().unwrap(), ActualState::SwitchOnDisabled);
        assert_eq!(epos.gateway().statusword_reads(1), BUS_RETRIES as usize);

        epos.gateway.drop_responses(1, BUS_RETRIES);
        let err = epos.get_state().unwrap_err();
        assert_eq!(err.node_id, 1);
        assert!(matches!(
            err.kind,
            ErrorKind::Gateway(GatewayError::Timeout(1))
        ));
    }

    #[test]
    fn test_enable_at_the_retry_bounds() {
        // 4 extra reads for shutdown and 24 for enable still fit in 5 + 25
        let mut epos = node(SimTiming {
            shutdown_reads: 4,
            enable_reads: 24,
            ..Default::default()
        });
        epos.enable().unwrap();

        let mut epos = node(SimTiming {
            shutdown_reads: 5,
            ..Default::default()
        });
        match epos.enable() {
            Err(EposError {
                kind: ErrorKind::Timeout(_),
                node_id: 1,
                ..
            }) => (),
            r => panic!("Expected a shutdown timeout, got {:?}", r),
        }

        let mut epos = node(SimTiming {
            enable_reads: 25,
            ..Default::default()
        });
        assert!(matches!(
            epos.enable(),
            Err(EposError {
                kind: ErrorKind::Timeout("enabling device"),
                ..
            })
        ));
    }

    #[test]
    fn test_enable_stuck_device() {
        let mut epos = node(SimTiming::default());
        epos.gateway.set_stuck(1, true);

        let err = epos.enable().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Timeout("shutting device down")));
        assert_eq!(err.device, "'joint_1' (CanID 1)");

        // Exactly the retry bound worth of statusword reads after the first
        let reads = epos.gateway().statusword_reads(1);
        assert_eq!(reads, 1 + 1 + SHUTDOWN_RETRIES as usize);
    }

    #[test]
    fn test_enable_in_fault_never_clears() {
        let mut epos = node(SimTiming::default());
        epos.gateway.inject_fault(1, &[0x8611]);

        let err = epos.enable().unwrap_err();
        assert!(err.is_fault());

        // No controlword was written and the history was only read
        assert!(epos.gateway().controlwords(1).is_empty());
        assert_eq!(epos.gateway().history_reads(1), vec![1]);
        assert_eq!(epos.get_state().unwrap(), ActualState::Fault);
    }

    #[test]
    fn test_enable_unknown_state() {
        let mut epos = node(SimTiming::default());
        epos.gateway.force_statusword(1, 0x0001);

        assert!(matches!(
            epos.enable().unwrap_err().kind,
            ErrorKind::UnknownState(0x0001)
        ));
    }

    #[test]
    fn test_clear_fault_with_two_errors() {
        let mut epos = node(SimTiming {
            fault_reset_reads: 2,
            ..Default::default()
        });
        epos.gateway.inject_fault(1, &[0x2310, 0x8611]);
        epos.gateway.clear_calls();

        epos.clear_fault().unwrap();

        assert_eq!(epos.get_state().unwrap(), ActualState::OperationEnable);
        assert_eq!(epos.gateway().history_reads(1), vec![1, 2]);

        let calls = epos.gateway().calls().to_vec();
        let clear = calls
            .iter()
            .position(|c| *c == GatewayCall::write(1, 0x1003, 0, &[0]))
            .expect("history count not cleared");
        let reset = calls
            .iter()
            .position(|c| *c == GatewayCall::write(1, 0x6040, 0, &[0x80, 0x00]))
            .expect("fault reset not issued");
        assert!(clear < reset);
        assert_eq!(epos.get_number_of_errors().unwrap(), 0);
    }

    #[test]
    fn test_clear_fault_bounds_history() {
        let mut epos = node(SimTiming::default());
        epos.gateway
            .inject_fault(1, &[0x1000, 0x2310, 0x3210, 0x3220, 0x4210, 0x8611, 0x8611]);

        epos.clear_fault().unwrap();
        assert_eq!(epos.gateway().history_reads(1), vec![1, 2, 3, 4, 5]);
        assert!(epos.get_error_history(6).is_err());
        assert!(epos.get_error_history(0).is_err());
    }

    #[test]
    fn test_clear_fault_not_recovered() {
        let mut epos = node(SimTiming {
            fault_reset_reads: 5,
            ..Default::default()
        });
        epos.gateway.inject_fault(1, &[0x8611]);

        assert!(matches!(
            epos.clear_fault().unwrap_err().kind,
            ErrorKind::FaultNotRecovered
        ));
    }

    #[test]
    fn test_cached_setters() {
        let mut epos = node(SimTiming::default());
        epos.gateway.clear_calls();

        epos.set_profile_velocity(500).unwrap();
        epos.set_profile_velocity(500).unwrap();
        epos.set_profile_acceleration(2500).unwrap();
        epos.set_profile_acceleration(2500).unwrap();
        epos.set_profile_deceleration(3500).unwrap();
        epos.set_profile_deceleration(3500).unwrap();
        epos.set_target_velocity(-40).unwrap();
        epos.set_target_velocity(-40).unwrap();
        epos.set_operation_mode(OperationMode::ProfilePosition).unwrap();
        epos.set_operation_mode(OperationMode::ProfilePosition).unwrap();

        assert_eq!(
            epos.gateway().calls(),
            &[
                GatewayCall::write(1, 0x6081, 0, &500u32.to_le_bytes()),
                GatewayCall::write(1, 0x6083, 0, &2500u32.to_le_bytes()),
                GatewayCall::write(1, 0x6084, 0, &3500u32.to_le_bytes()),
                GatewayCall::write(1, 0x60FF, 0, &(-40i32).to_le_bytes()),
                GatewayCall::write(1, 0x6060, 0, &[1]),
            ][..]
        );
        assert_eq!(epos.profile(), (500, 2500, 3500));
        assert_eq!(epos.target_velocity(), -40);
        assert_eq!(epos.get_actual_operation_mode().unwrap(), OperationMode::ProfilePosition);

        // The value read at start up is cached too
        let mut fresh = node(SimTiming::default());
        fresh.gateway.clear_calls();
        fresh.set_profile_velocity(1000).unwrap();
        assert!(fresh.gateway().calls().is_empty());
    }

    #[test]
    fn test_position_parameters() {
        let mut epos = node(SimTiming::default());
        epos.gateway.clear_calls();

        epos.set_max_following_error(3000).unwrap();
        epos.set_position_window(15).unwrap();
        epos.set_position_profile_type(1).unwrap();
        epos.restore().unwrap();

        assert_eq!(
            epos.gateway().calls(),
            &[
                GatewayCall::write(1, 0x6065, 0, &3000u32.to_le_bytes()),
                GatewayCall::write(1, 0x6067, 0, &15u32.to_le_bytes()),
                GatewayCall::write(1, 0x6086, 0, &1i16.to_le_bytes()),
                GatewayCall::write(1, 0x1011, 1, b"load"),
            ][..]
        );

        assert_eq!(epos.get_max_following_error().unwrap(), 3000);
    }

    #[test]
    fn test_move_absolute() {
        let mut epos = node(SimTiming {
            motion_reads: 3,
            ..Default::default()
        });
        epos.enable().unwrap();

        epos.move_absolute(12_000).unwrap();
        assert!(!epos.is_target_reached().unwrap());

        let mut polls = 1;
        while !epos.is_target_reached().unwrap() {
            polls += 1;
            assert!(polls < 10);
        }
        assert_eq!(epos.get_actual_position().unwrap(), 12_000);

        epos.move_relative(-2_000).unwrap();
        while !epos.is_target_reached().unwrap() {}
        assert_eq!(epos.get_actual_position().unwrap(), 10_000);
    }

    #[test]
    fn test_relative_moves_add_to_the_target() {
        let mut epos = node(SimTiming {
            motion_reads: 3,
            ..Default::default()
        });
        epos.enable().unwrap();

        // The second move starts before the first one has finished
        epos.move_relative(500).unwrap();
        epos.move_relative(500).unwrap();
        assert_eq!(epos.get_demand_position().unwrap(), 1000);

        while !epos.is_target_reached().unwrap() {}
        assert_eq!(epos.get_actual_position().unwrap(), 1000);
    }

    #[test]
    fn test_digital_outputs_and_remote() {
        let mut epos = node(SimTiming::default());

        let mut outs = [false; 8];
        outs[0] = true;
        outs[7] = true;
        epos.set_digital_outputs(outs).unwrap();
        assert_eq!(
            epos.gateway().calls().last(),
            Some(&GatewayCall::write(1, 0x2078, 1, &[0x00, 0x81]))
        );

        assert!(!epos.remote());
        epos.set_remote_operation(true).unwrap();
        assert!(epos.remote());
        assert!(Epos::<SimGateway>::is_remote_operation_enabled(
            epos.get_statusword().unwrap()
        ));
    }

    #[test]
    fn test_store_signature() {
        let mut epos = node(SimTiming::default());
        epos.store().unwrap();
        assert_eq!(
            epos.gateway().calls().last(),
            Some(&GatewayCall::write(1, 0x1010, 1, b"save"))
        );
    }
}
