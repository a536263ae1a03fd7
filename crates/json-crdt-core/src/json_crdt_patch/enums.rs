//! Protocol enumerations: reserved sessions, node kinds, and opcodes.

/// Reserved session ids. User sessions are random and at least 65536.
#[allow(non_snake_case)]
pub mod SESSION {
    /// Reserved by the protocol; owns ORIGIN.
    pub const SYSTEM: u64 = 0;
    /// The only session of a server-clock document.
    pub const SERVER: u64 = 1;
    /// Patches applied identically on every replica (e.g. schema setup).
    pub const GLOBAL: u64 = 2;
    /// Local-only changes that are never shared.
    pub const LOCAL: u64 = 3;
    /// Largest session id that survives a trip through a 53-bit integer.
    pub const MAX: u64 = 9_007_199_254_740_991;
}

/// Smallest session id handed out by the random generator.
pub const MIN_USER_SESSION: u64 = 65_536;

/// 3-bit node kind discriminant, shared by both binary codecs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonCrdtDataType {
    Con = 0b000,
    Val = 0b001,
    Obj = 0b010,
    Vec = 0b011,
    Str = 0b100,
    Bin = 0b101,
    Arr = 0b110,
}

impl JsonCrdtDataType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Con,
            1 => Self::Val,
            2 => Self::Obj,
            3 => Self::Vec,
            4 => Self::Str,
            5 => Self::Bin,
            6 => Self::Arr,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Con => "con",
            Self::Val => "val",
            Self::Obj => "obj",
            Self::Vec => "vec",
            Self::Str => "str",
            Self::Bin => "bin",
            Self::Arr => "arr",
        }
    }
}

/// 5-bit operation opcode: `new_*` ops use the bare kind, `ins_*` ops set
/// bit 3, and the two kind-less ops live at 16 and 17.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonCrdtPatchOpcode {
    NewCon = JsonCrdtDataType::Con as u8,
    NewVal = JsonCrdtDataType::Val as u8,
    NewObj = JsonCrdtDataType::Obj as u8,
    NewVec = JsonCrdtDataType::Vec as u8,
    NewStr = JsonCrdtDataType::Str as u8,
    NewBin = JsonCrdtDataType::Bin as u8,
    NewArr = JsonCrdtDataType::Arr as u8,
    InsVal = 0b01000 | JsonCrdtDataType::Val as u8,
    InsObj = 0b01000 | JsonCrdtDataType::Obj as u8,
    InsVec = 0b01000 | JsonCrdtDataType::Vec as u8,
    InsStr = 0b01000 | JsonCrdtDataType::Str as u8,
    InsBin = 0b01000 | JsonCrdtDataType::Bin as u8,
    InsArr = 0b01000 | JsonCrdtDataType::Arr as u8,
    Del = 0b10000,
    Nop = 0b10001,
}

impl JsonCrdtPatchOpcode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::NewCon,
            1 => Self::NewVal,
            2 => Self::NewObj,
            3 => Self::NewVec,
            4 => Self::NewStr,
            5 => Self::NewBin,
            6 => Self::NewArr,
            9 => Self::InsVal,
            10 => Self::InsObj,
            11 => Self::InsVec,
            12 => Self::InsStr,
            13 => Self::InsBin,
            14 => Self::InsArr,
            16 => Self::Del,
            17 => Self::Nop,
            _ => return None,
        })
    }

    /// Opcode shifted into the high five bits of an op header byte.
    pub const fn overlay(self) -> u8 {
        (self as u8) << 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_round_trip_through_u8() {
        for v in 0u8..32 {
            if let Some(op) = JsonCrdtPatchOpcode::from_u8(v) {
                assert_eq!(op as u8, v);
            }
        }
        assert_eq!(JsonCrdtPatchOpcode::from_u8(15), None);
        assert_eq!(JsonCrdtPatchOpcode::InsStr.overlay(), 12 << 3);
    }

    #[test]
    fn data_types_round_trip_through_u8() {
        for v in 0u8..7 {
            let kind = JsonCrdtDataType::from_u8(v).expect("valid kind");
            assert_eq!(kind as u8, v);
        }
        assert!(JsonCrdtDataType::from_u8(7).is_none());
    }
}
