//! # Diagnostics
//!
//! Human readable descriptions of EPOS error codes, error register bits and SDO abort codes.

/// Describe an entry of the error history (object 0x1003).
pub fn error_code_message(code: u32) -> &'static str {
    match code {
        0x0000 => "No Error",
        0x1000 => "Generic Error",
        0x2310 => "Overcurrent Error",
        0x3210 => "Overvoltage",
        0x3220 => "Undervoltage",
        0x4210 => "Overtemperature",
        0x5113 => "Supply Voltage (+5V) Too Low",
        0x5114 => "Supply Voltage Output Stage Too Low",
        0x6100 => "Internal Software Error",
        0x6320 => "Software Parameter Error",
        0x7320 => "Sensor Position Error",
        0x8110 => "CAN Overrun Error (Objects lost)",
        0x8111 => "CAN Overrun Error",
        0x8120 => "CAN Passive Mode Error",
        0x8130 => "CAN Life Guard Error",
        0x8150 => "CAN Transmit COB-ID Collision",
        0x81FD => "CAN Bus Off",
        0x81FE => "CAN Rx Queue Overrun",
        0x81FF => "CAN Tx Queue Overrun",
        0x8210 => "CAN PDO Length Error",
        0x8611 => "Following Error",
        0xFF01 => "Hall Sensor Error",
        0xFF02 => "Index Processing Error",
        0xFF03 => "Encoder Resolution Error",
        0xFF04 => "Hall Sensor not found Error",
        0xFF06 => "Negative Limit Error",
        0xFF07 => "Positive Limit Error",
        0xFF08 => "Hall Angle Detection Error",
        0xFF09 => "Software Position Limit Error",
        0xFF0A => "Position Sensor Breach",
        0xFF0B => "System Overloaded",
        0xFF0C => "Interpolated Position Mode Error",
        0xFF0D => "Auto Tuning Identification Error",
        _ => "Unknown error",
    }
}

/// Describe each bit set in the error register (object 0x1001).
pub fn error_register_messages(reg: u8) -> Vec<&'static str> {
    const BITS: [(u8, &str); 8] = [
        (1 << 7, "Motion error"),
        (1 << 6, "reserved (always 0)"),
        (1 << 5, "Device profile-specific"),
        (1 << 4, "Communication error"),
        (1 << 3, "Temperature error"),
        (1 << 2, "Voltage error"),
        (1 << 1, "Current error"),
        (1 << 0, "Generic error"),
    ];

    BITS.iter()
        .filter(|(bit, _)| reg & bit != 0)
        .map(|(_, msg)| *msg)
        .collect()
}

/// Describe an SDO abort code.
pub fn sdo_abort_message(code: u32) -> &'static str {
    match code {
        0x0000_0000 => "no error",
        0x0602_0000 => "object does not exist",
        0x0609_0011 => "subindex does not exist",
        0x0504_0005 => "out of memory",
        0x0601_0000 => "unsupported access to an object",
        0x0601_0001 => "attempt to read a write-only object",
        0x0601_0002 => "attempt to write a read-only object",
        0x0604_0043 => "general parameter incompatibility",
        0x0604_0047 => "general internal incompatibility in the device",
        0x0606_0000 => "access failed due to an hardware error",
        0x0609_0030 => "value range of parameter exceeded",
        0x0609_0031 => "value of parameter written is too high",
        0x0609_0032 => "value of parameter written is too low",
        0x0609_0036 => "maximum value is less than minimum value",
        0x0F00_FFC0 => "wrong NMT state",
        0x0F00_FFBF => "rs232 command illegal",
        0x0F00_FFBE => "password incorrect",
        0x0F00_FFBC => "device not in service mode",
        0x0F00_FFB9 => "error in Node-ID",
        _ => "unknown abort code",
    }
}

/// SDO abort codes used by the simulated gateway.
pub mod abort_codes {
    pub const OBJECT_DOES_NOT_EXIST: u32 = 0x0602_0000;
    pub const UNSUPPORTED_ACCESS: u32 = 0x0601_0000;
    pub const VALUE_RANGE_EXCEEDED: u32 = 0x0609_0030;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(error_code_message(0x8611), "Following Error");
        assert_eq!(error_code_message(0x1234), "Unknown error");
        assert_eq!(
            error_register_messages(0x83),
            vec!["Motion error", "Current error", "Generic error"]
        );
        assert!(error_register_messages(0).is_empty());
        assert_eq!(sdo_abort_message(0x0602_0000), "object does not exist");
    }
}
