//! # Simulated gateway
//!
//! A CAN bus of simulated EPOS nodes. Each node has an object dictionary and follows the CiA-402
//! transitions, with configurable latencies counted in statusword reads so that tests are
//! deterministic. Every call made on the gateway is recorded.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};

use crate::{
    diag::abort_codes,
    gateway::{raw_from_bytes, Gateway, GatewayError, NmtService},
    ipm::{ipm_status_bits, PvtRecord},
    od::{self, Object},
    state::{status_bits, ActualState, OperationMode},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Capacity of the interpolation buffer.
pub const PVT_BUFFER_CAPACITY: usize = 64;

const SUBINDEX_DOES_NOT_EXIST: u32 = 0x0609_0011;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Latencies of the simulated nodes, in statusword reads.
///
/// A latency of `n` means the state is unchanged for `n` reads and the transition shows on read
/// `n + 1`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimTiming {
    /// Shutdown and switch on transitions
    pub shutdown_reads: u32,

    /// Enable operation, SWITCHED_ON is reported meanwhile
    pub enable_reads: u32,

    /// Leaving FAULT after a fault reset
    pub fault_reset_reads: u32,

    /// Homing run
    pub homing_reads: u32,

    /// Profile position move or interpolated trajectory
    pub motion_reads: u32,

    /// Averaged velocity reads before a velocity mode motion stalls on its end stop
    pub stall_reads: u32,
}

/// A bus of simulated nodes.
#[derive(Debug)]
pub struct SimGateway {
    timing: SimTiming,
    nodes: HashMap<u8, SimNode>,
    calls: Vec<GatewayCall>,
}

#[derive(Debug)]
struct SimNode {
    timing: SimTiming,
    dict: HashMap<Object, u32>,

    state: ActualState,
    transition: Option<Pending<ActualState>>,
    motion: Option<Pending<Motion>>,

    /// Statusword bits which are not part of the state
    flags: u16,
    forced_statusword: Option<u16>,
    stuck: bool,
    homing_error: bool,
    /// Requests left to go unanswered
    dropped_left: u32,

    position: i32,
    velocity_setting: i32,
    stall_left: u32,

    error_count: u8,
    error_history: Vec<u32>,

    pvt_buffer: VecDeque<[u8; 8]>,
    pvt_written: u16,
    pvt_enabled: bool,
    ip_active: bool,
    ipm_errors: u16,

    segmented: Option<Segmented>,
}

#[derive(Debug)]
struct Pending<T> {
    target: T,
    reads_left: u32,
    via: Option<ActualState>,
}

#[derive(Debug)]
struct Segmented {
    object: Object,
    length: usize,
    data: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A call made on the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Read {
        node: u8,
        index: u16,
        subindex: u8,
    },
    Write {
        node: u8,
        index: u16,
        subindex: u8,
        data: Vec<u8>,
    },
    Nmt {
        node: u8,
        service: NmtService,
    },
    InitiateSegmented {
        node: u8,
        index: u16,
        subindex: u8,
        length: u32,
    },
    Segmented {
        node: u8,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Motion {
    Move(i32),
    Homing,
    Interpolation,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimTiming {
    fn default() -> Self {
        Self {
            shutdown_reads: 1,
            enable_reads: 2,
            fault_reset_reads: 1,
            homing_reads: 3,
            motion_reads: 2,
            stall_reads: 3,
        }
    }
}

impl GatewayCall {
    pub fn write(node: u8, index: u16, subindex: u8, data: &[u8]) -> Self {
        GatewayCall::Write {
            node,
            index,
            subindex,
            data: data.to_vec(),
        }
    }
}

impl SimGateway {
    pub fn new(timing: SimTiming) -> Self {
        Self {
            timing,
            nodes: HashMap::new(),
            calls: Vec::new(),
        }
    }

    /// Add a node in SWITCH_ON_DISABLED with default parameters.
    pub fn add_node(&mut self, node: u8) {
        self.nodes.insert(node, SimNode::new(self.timing));
    }

    pub fn calls(&self) -> &[GatewayCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Every controlword written to a node, in order.
    pub fn controlwords(&self, node: u8) -> Vec<u16> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Write {
                    node: n,
                    index,
                    subindex,
                    data,
                } if *n == node
                    && *index == od::CONTROLWORD.index
                    && *subindex == od::CONTROLWORD.subindex =>
                {
                    raw_from_bytes(data).ok().map(|w| w as u16)
                }
                _ => None,
            })
            .collect()
    }

    pub fn statusword_reads(&self, node: u8) -> usize {
        self.calls
            .iter()
            .filter(|c| {
                **c == GatewayCall::Read {
                    node,
                    index: od::STATUSWORD.index,
                    subindex: od::STATUSWORD.subindex,
                }
            })
            .count()
    }

    /// Subindices of the error history entries read from a node, in order.
    pub fn history_reads(&self, node: u8) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Read {
                    node: n,
                    index,
                    subindex,
                } if *n == node && *index == od::ERROR_HISTORY_INDEX && *subindex > 0 => {
                    Some(*subindex)
                }
                _ => None,
            })
            .collect()
    }

    /// Records waiting in a node's interpolation buffer.
    pub fn pvt_buffer(&self, node: u8) -> Vec<PvtRecord> {
        self.nodes
            .get(&node)
            .map(|n| n.pvt_buffer.iter().map(PvtRecord::from_bytes).collect())
            .unwrap_or_default()
    }

    /// Put a node in FAULT with the given error history, most recent first.
    pub fn inject_fault(&mut self, node: u8, codes: &[u32]) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.state = ActualState::Fault;
            n.transition = None;
            n.motion = None;
            n.velocity_setting = 0;
            n.error_count = codes.len() as u8;
            n.error_history = codes
                .iter()
                .take(od::ERROR_HISTORY_LEN as usize)
                .copied()
                .collect();
            n.dict.insert(od::ERROR_REGISTER, 0x01);
        }
    }

    /// Ignore every state transition request.
    pub fn set_stuck(&mut self, node: u8, stuck: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.stuck = stuck;
        }
    }

    /// Report this statusword regardless of the node's state.
    pub fn force_statusword(&mut self, node: u8, word: u16) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.forced_statusword = Some(word);
        }
    }

    /// End the next homing runs with the homing error bit.
    pub fn set_homing_error(&mut self, node: u8, error: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.homing_error = error;
        }
    }

    /// Leave the next `count` reads and writes to a node unanswered.
    pub fn drop_responses(&mut self, node: u8, count: u32) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.dropped_left = count;
        }
    }

    pub fn set_stall_reads(&mut self, node: u8, reads: u32) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.timing.stall_reads = reads;
        }
    }

    fn node(&mut self, node: u8) -> Result<&mut SimNode, GatewayError> {
        self.nodes
            .get_mut(&node)
            .ok_or(GatewayError::NoSuchNode(node))
    }

    /// The node for an expedited transfer, unless the request goes unanswered.
    fn answering_node(&mut self, node: u8) -> Result<&mut SimNode, GatewayError> {
        let n = self.node(node)?;
        if n.dropped_left > 0 {
            n.dropped_left -= 1;
            return Err(GatewayError::Timeout(node));
        }
        Ok(n)
    }
}

impl Gateway for SimGateway {
    fn read_object(&mut self, node: u8, index: u16, subindex: u8) -> Result<u32, GatewayError> {
        self.calls.push(GatewayCall::Read {
            node,
            index,
            subindex,
        });

        let value = self.answering_node(node)?.read(Object::new(index, subindex))?;
        trace!("sim node {}: read {:#06x}/{} = {:#x}", node, index, subindex, value);
        Ok(value)
    }

    fn write_object(
        &mut self,
        node: u8,
        index: u16,
        subindex: u8,
        data: &[u8],
    ) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::write(node, index, subindex, data));

        let value = raw_from_bytes(data)?;
        trace!("sim node {}: write {:#06x}/{} = {:#x}", node, index, subindex, value);
        self.answering_node(node)?
            .write(Object::new(index, subindex), value)
    }

    fn send_nmt(&mut self, node: u8, service: NmtService) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::Nmt { node, service });

        let n = self.node(node)?;
        match service {
            NmtService::StartRemoteNode => n.flags |= status_bits::REMOTE,
            NmtService::StopRemoteNode | NmtService::EnterPreOperational => {
                n.flags &= !status_bits::REMOTE
            }
            NmtService::ResetNode | NmtService::ResetCommunication => {
                *n = SimNode::new(n.timing);
            }
        }
        Ok(())
    }

    fn initiate_segmented_write(
        &mut self,
        node: u8,
        index: u16,
        subindex: u8,
        length: u32,
    ) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::InitiateSegmented {
            node,
            index,
            subindex,
            length,
        });

        let n = self.node(node)?;
        let object = Object::new(index, subindex);

        if object != od::INTERPOLATION_DATA_RECORD || length != 8 {
            return Err(GatewayError::Abort(abort_codes::UNSUPPORTED_ACCESS));
        }

        n.segmented = Some(Segmented {
            object,
            length: length as usize,
            data: Vec::with_capacity(length as usize),
        });
        Ok(())
    }

    fn segmented_write(&mut self, node: u8, data: &[u8]) -> Result<(), GatewayError> {
        self.calls.push(GatewayCall::Segmented {
            node,
            data: data.to_vec(),
        });

        let n = self.node(node)?;

        if data.len() > 7 {
            return Err(GatewayError::Segmented(format!(
                "segment of {} bytes, at most 7 allowed",
                data.len()
            )));
        }

        let transfer = n
            .segmented
            .as_mut()
            .ok_or_else(|| GatewayError::Segmented("no transfer in progress".into()))?;

        transfer.data.extend_from_slice(data);

        if transfer.data.len() > transfer.length {
            n.segmented = None;
            return Err(GatewayError::Segmented("more data than announced".into()));
        }

        if transfer.data.len() == transfer.length {
            if let Some(t) = n.segmented.take() {
                n.complete_segmented(t)?;
            }
        }

        Ok(())
    }
}

impl SimNode {
    fn new(timing: SimTiming) -> Self {
        let defaults: [(Object, u32); 30] = [
            (od::ERROR_REGISTER, 0),
            (od::STORE_PARAMETERS, 1),
            (od::RESTORE_DEFAULT_PARAMETERS, 1),
            (od::DIGITAL_OUTPUTS, 0),
            (od::CURRENT_THRESHOLD_HOMING, 500),
            (od::HOME_POSITION, 0),
            (od::INTERPOLATION_BUFFER_UNDERFLOW_WARNING, 4),
            (od::INTERPOLATION_BUFFER_OVERFLOW_WARNING, 60),
            (od::MODES_OF_OPERATION, 0),
            (od::MODES_OF_OPERATION_DISPLAY, 0),
            (od::MAX_FOLLOWING_ERROR, 2000),
            (od::POSITION_WINDOW, 20),
            (od::CURRENT_ACTUAL_VALUE, 0),
            (od::TARGET_POSITION, 0),
            (od::HOME_OFFSET, 0),
            (od::MIN_POSITION_LIMIT, i32::MIN as u32),
            (od::MAX_POSITION_LIMIT, i32::MAX as u32),
            (od::MAX_PROFILE_VELOCITY, 25000),
            (od::PROFILE_VELOCITY, 1000),
            (od::PROFILE_ACCELERATION, 5000),
            (od::PROFILE_DECELERATION, 5000),
            (od::QUICK_STOP_DECELERATION, 10000),
            (od::MOTION_PROFILE_TYPE, 0),
            (od::HOMING_METHOD, 7),
            (od::SPEED_FOR_SWITCH_SEARCH, 100),
            (od::SPEED_FOR_ZERO_SEARCH, 10),
            (od::HOMING_ACCELERATION, 1000),
            (od::INTERPOLATION_SUB_MODE, 0xFFFF),
            (od::INTERPOLATION_TIME_PERIOD, 1),
            (od::TARGET_VELOCITY, 0),
        ];

        let mut dict: HashMap<Object, u32> = defaults.iter().copied().collect();
        dict.insert(od::INTERPOLATION_TIME_INDEX, 0xFD);

        Self {
            timing,
            dict,
            state: ActualState::SwitchOnDisabled,
            transition: None,
            motion: None,
            flags: 0,
            forced_statusword: None,
            dropped_left: 0,
            stuck: false,
            homing_error: false,
            position: 0,
            velocity_setting: 0,
            stall_left: 0,
            error_count: 0,
            error_history: Vec::new(),
            pvt_buffer: VecDeque::new(),
            pvt_written: 0,
            pvt_enabled: false,
            ip_active: false,
            ipm_errors: 0,
            segmented: None,
        }
    }

    fn mode(&self) -> OperationMode {
        OperationMode::from_raw(self.dict.get(&od::MODES_OF_OPERATION).copied().unwrap_or(0) as u8 as i8)
    }

    fn read(&mut self, obj: Object) -> Result<u32, GatewayError> {
        let value = match obj {
            od::STATUSWORD => self.read_statusword() as u32,
            od::POSITION_ACTUAL_VALUE => self.position as u32,
            od::POSITION_DEMAND_VALUE => match self.motion {
                Some(Pending {
                    target: Motion::Move(t),
                    ..
                }) => t as u32,
                _ => self.position as u32,
            },
            od::VELOCITY_ACTUAL_VALUE => self.velocity() as u32,
            od::VELOCITY_ACTUAL_AVERAGED => {
                let v = self.velocity();
                self.stall_left = self.stall_left.saturating_sub(1);
                v as u32
            }
            od::NUMBER_OF_ERRORS => self.error_count as u32,
            Object {
                index: od::ERROR_HISTORY_INDEX,
                subindex,
            } => {
                if subindex > od::ERROR_HISTORY_LEN {
                    return Err(GatewayError::Abort(SUBINDEX_DOES_NOT_EXIST));
                }
                self.error_history
                    .get(subindex as usize - 1)
                    .copied()
                    .unwrap_or(0)
            }
            od::INTERPOLATION_BUFFER_SIZE => self.pvt_buffer.len() as u32,
            od::INTERPOLATION_BUFFER_POSITION => self.pvt_written as u32,
            od::INTERPOLATION_BUFFER_STATUS => self.ipm_status() as u32,
            obj => *self
                .dict
                .get(&obj)
                .ok_or(GatewayError::Abort(abort_codes::OBJECT_DOES_NOT_EXIST))?,
        };

        Ok(value)
    }

    fn write(&mut self, obj: Object, value: u32) -> Result<(), GatewayError> {
        match obj {
            od::CONTROLWORD => self.controlword(value as u16),
            od::STATUSWORD | od::MODES_OF_OPERATION_DISPLAY => {
                return Err(GatewayError::Abort(0x0601_0002))
            }
            od::MODES_OF_OPERATION => {
                self.dict.insert(od::MODES_OF_OPERATION, value);
                self.dict.insert(od::MODES_OF_OPERATION_DISPLAY, value);
            }
            od::NUMBER_OF_ERRORS => {
                if value != 0 {
                    return Err(GatewayError::Abort(abort_codes::VALUE_RANGE_EXCEEDED));
                }
                self.error_count = 0;
                self.error_history.clear();
            }
            od::VELOCITY_MODE_SETTING_VALUE => {
                self.velocity_setting = value as i32;
                self.stall_left = self.timing.stall_reads;
            }
            od::INTERPOLATION_BUFFER_CLEAR => {
                if value == 0 {
                    self.pvt_enabled = false;
                    self.pvt_buffer.clear();
                    self.ipm_errors = 0;
                } else {
                    self.pvt_enabled = true;
                }
            }
            obj => match self.dict.get_mut(&obj) {
                Some(v) => *v = value,
                None => return Err(GatewayError::Abort(abort_codes::OBJECT_DOES_NOT_EXIST)),
            },
        }

        Ok(())
    }

    fn read_statusword(&mut self) -> u16 {
        if let Some(t) = self.transition.as_mut() {
            if t.reads_left == 0 {
                self.state = t.target;
                self.transition = None;
            } else {
                t.reads_left -= 1;
                if let Some(via) = t.via {
                    self.state = via;
                }
            }
        }

        if let Some(m) = self.motion.as_mut() {
            if m.reads_left == 0 {
                let motion = m.target;
                self.motion = None;
                self.finish_motion(motion);
            } else {
                m.reads_left -= 1;
            }
        }

        if let Some(word) = self.forced_statusword {
            return word;
        }

        self.state.pattern().unwrap_or(0) | self.flags
    }

    fn controlword(&mut self, cw: u16) {
        use ActualState::*;

        if self.stuck {
            return;
        }

        if self.state == Fault {
            if cw & 0x0080 != 0 {
                self.transition_to(SwitchOnDisabled, self.timing.fault_reset_reads, None);
            }
            return;
        }

        match cw & 0x000F {
            0x0006 | 0x000E => match self.state {
                SwitchOnDisabled | ReadyToSwitchOn | SwitchedOn | OperationEnable
                | QuickStopActive => {
                    self.stop();
                    self.transition_to(ReadyToSwitchOn, self.timing.shutdown_reads, None)
                }
                _ => (),
            },
            0x0007 => match self.state {
                ReadyToSwitchOn | OperationEnable => {
                    self.stop();
                    self.transition_to(SwitchedOn, self.timing.shutdown_reads, None)
                }
                _ => (),
            },
            0x000F => match self.state {
                ReadyToSwitchOn | SwitchedOn | QuickStopActive => {
                    self.transition_to(OperationEnable, self.timing.enable_reads, Some(SwitchedOn))
                }
                OperationEnable => self.operate(cw),
                _ => (),
            },
            low if low & 0x0002 == 0 => {
                self.stop();
                self.transition = None;
                self.state = SwitchOnDisabled;
            }
            _ => {
                self.stop();
                self.transition = None;
                self.state = match self.state {
                    OperationEnable => QuickStopActive,
                    _ => SwitchOnDisabled,
                };
            }
        }
    }

    /// Handle the operation mode specific bits of a controlword in OPERATION_ENABLE.
    fn operate(&mut self, cw: u16) {
        if cw & 0x0100 != 0 {
            self.stop();
            self.flags |= status_bits::TARGET_REACHED;
            return;
        }

        if cw & 0x0010 == 0 {
            return;
        }

        let target = match self.mode() {
            OperationMode::ProfilePosition => {
                let target = self.dict.get(&od::TARGET_POSITION).copied().unwrap_or(0) as i32;
                if cw & 0x0040 != 0 {
                    // Relative to the target of a move still running
                    let base = match self.motion {
                        Some(Pending {
                            target: Motion::Move(t),
                            ..
                        }) => t,
                        _ => self.position,
                    };
                    Motion::Move(base.wrapping_add(target))
                } else {
                    Motion::Move(target)
                }
            }
            OperationMode::Homing => {
                self.flags &= !(status_bits::HOMING_ATTAINED
                    | status_bits::HOMING_ERROR
                    | status_bits::REFERENCED);
                Motion::Homing
            }
            OperationMode::InterpolatedPosition => {
                if self.pvt_buffer.is_empty() {
                    self.ipm_errors |= ipm_status_bits::UNDERFLOW_ERROR;
                    return;
                }
                self.ip_active = true;
                Motion::Interpolation
            }
            _ => return,
        };

        self.flags &= !status_bits::TARGET_REACHED;
        self.motion = Some(Pending {
            target,
            reads_left: match target {
                Motion::Homing => self.timing.homing_reads,
                _ => self.timing.motion_reads,
            },
            via: None,
        });
    }

    fn finish_motion(&mut self, motion: Motion) {
        match motion {
            Motion::Move(target) => {
                self.position = target;
                self.flags |= status_bits::TARGET_REACHED;
            }
            Motion::Homing => {
                if self.homing_error {
                    self.flags |= status_bits::HOMING_ERROR;
                } else {
                    self.position = self.dict.get(&od::HOME_POSITION).copied().unwrap_or(0) as i32;
                    self.flags |= status_bits::TARGET_REACHED
                        | status_bits::HOMING_ATTAINED
                        | status_bits::REFERENCED;
                }
            }
            Motion::Interpolation => {
                if let Some(last) = self.pvt_buffer.back() {
                    self.position = PvtRecord::from_bytes(last).position;
                }
                self.pvt_buffer.clear();
                self.ip_active = false;
                self.flags |= status_bits::TARGET_REACHED;
            }
        }
    }

    fn stop(&mut self) {
        self.motion = None;
        self.ip_active = false;
        self.velocity_setting = 0;
    }

    fn transition_to(&mut self, target: ActualState, reads: u32, via: Option<ActualState>) {
        self.transition = Some(Pending {
            target,
            reads_left: reads,
            via,
        });
    }

    fn velocity(&self) -> i32 {
        let moving = self.state == ActualState::OperationEnable
            && self.mode() == OperationMode::Velocity
            && self.stall_left > 0;

        if moving {
            self.velocity_setting
        } else {
            0
        }
    }

    fn ipm_status(&self) -> u16 {
        let mut status = self.ipm_errors;
        let len = self.pvt_buffer.len() as u32;

        let underflow = self
            .dict
            .get(&od::INTERPOLATION_BUFFER_UNDERFLOW_WARNING)
            .copied()
            .unwrap_or(0);
        let overflow = self
            .dict
            .get(&od::INTERPOLATION_BUFFER_OVERFLOW_WARNING)
            .copied()
            .unwrap_or(PVT_BUFFER_CAPACITY as u32);

        if self.pvt_enabled && len <= underflow {
            status |= ipm_status_bits::UNDERFLOW_WARNING;
        }
        if len >= overflow {
            status |= ipm_status_bits::OVERFLOW_WARNING;
        }
        if self.pvt_enabled {
            status |= ipm_status_bits::BUFFER_ENABLED;
        }
        if self.ip_active {
            status |= ipm_status_bits::IP_MODE_ACTIVE;
        }

        status
    }

    fn complete_segmented(&mut self, transfer: Segmented) -> Result<(), GatewayError> {
        if transfer.object != od::INTERPOLATION_DATA_RECORD {
            return Err(GatewayError::Abort(abort_codes::UNSUPPORTED_ACCESS));
        }

        if !self.pvt_enabled {
            return Err(GatewayError::Abort(abort_codes::UNSUPPORTED_ACCESS));
        }

        if self.pvt_buffer.len() >= PVT_BUFFER_CAPACITY {
            self.ipm_errors |= ipm_status_bits::OVERFLOW_ERROR;
            return Ok(());
        }

        let mut record = [0u8; 8];
        record.copy_from_slice(&transfer.data);
        self.pvt_buffer.push_back(record);
        self.pvt_written = self.pvt_written.wrapping_add(1);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sim_transitions() {
        let mut sim = SimGateway::new(SimTiming {
            shutdown_reads: 0,
            enable_reads: 1,
            ..Default::default()
        });
        sim.add_node(5);

        let sw = |sim: &mut SimGateway| sim.read_object(5, 0x6041, 0).unwrap() as u16;

        assert_eq!(sw(&mut sim), 0x0140);
        sim.write_object(5, 0x6040, 0, &[0x06, 0x00]).unwrap();
        assert_eq!(sw(&mut sim), 0x0121);
        sim.write_object(5, 0x6040, 0, &[0x0F, 0x00]).unwrap();
        assert_eq!(sw(&mut sim), 0x0123);
        assert_eq!(sw(&mut sim), 0x0137);
        sim.write_object(5, 0x6040, 0, &[0x02, 0x00]).unwrap();
        assert_eq!(sw(&mut sim), 0x0117);

        sim.send_nmt(5, NmtService::StartRemoteNode).unwrap();
        assert_eq!(sw(&mut sim), 0x0317);
    }

    #[test]
    fn test_sim_errors() {
        let mut sim = SimGateway::new(SimTiming::default());
        sim.add_node(5);

        assert_eq!(
            sim.read_object(6, 0x6041, 0),
            Err(GatewayError::NoSuchNode(6))
        );
        assert_eq!(
            sim.read_object(5, 0x1234, 0),
            Err(GatewayError::Abort(abort_codes::OBJECT_DOES_NOT_EXIST))
        );
        assert!(sim.write_object(5, 0x6041, 0, &[0, 0]).is_err());
        assert!(sim.segmented_write(5, &[0; 3]).is_err());

        // PVT records are refused until buffer access is enabled
        sim.initiate_segmented_write(5, 0x20C1, 0, 8).unwrap();
        sim.segmented_write(5, &[0; 7]).unwrap();
        assert!(sim.segmented_write(5, &[0]).is_err());

        assert_eq!(sim.calls().len(), 7);
    }
}
