/// DMAP wire type ids, as specified by the tagged data format.
///
/// The numeric value of each variant is the type id as it appears in
/// `/content-codes` responses, so this enum must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Byte = 1,
    Ubyte = 2,
    Short = 3,
    Ushort = 4,
    Int = 5,
    Uint = 6,
    Long = 7,
    Ulong = 8,
    Str = 9,
    Date = 10,
    Version = 11,
    Container = 12,
}

impl DataType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A decoded or to-be-encoded DMAP value. Each variant corresponds to
/// exactly one [`DataType`]; `DaapObject::new` checks that the value
/// handed in matches the type registered for the requested code.
#[derive(Debug, Clone, PartialEq)]
pub enum DaapValue {
    Byte(i8),
    Ubyte(u8),
    Short(i16),
    Ushort(u16),
    Int(i32),
    Uint(u32),
    Long(i64),
    Ulong(u64),
    Str(String),
    Date(u32),
    /// (major, minor), formatted on the wire as two big-endian `u16`s.
    Version(u16, u16),
    Container(Vec<crate::object::DaapObject>),
}

impl DaapValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DaapValue::Byte(_) => DataType::Byte,
            DaapValue::Ubyte(_) => DataType::Ubyte,
            DaapValue::Short(_) => DataType::Short,
            DaapValue::Ushort(_) => DataType::Ushort,
            DaapValue::Int(_) => DataType::Int,
            DaapValue::Uint(_) => DataType::Uint,
            DaapValue::Long(_) => DataType::Long,
            DaapValue::Ulong(_) => DataType::Ulong,
            DaapValue::Str(_) => DataType::Str,
            DaapValue::Date(_) => DataType::Date,
            DaapValue::Version(_, _) => DataType::Version,
            DaapValue::Container(_) => DataType::Container,
        }
    }
}

impl From<i8> for DaapValue {
    fn from(v: i8) -> Self {
        DaapValue::Byte(v)
    }
}
impl From<u8> for DaapValue {
    fn from(v: u8) -> Self {
        DaapValue::Ubyte(v)
    }
}
impl From<i16> for DaapValue {
    fn from(v: i16) -> Self {
        DaapValue::Short(v)
    }
}
impl From<u16> for DaapValue {
    fn from(v: u16) -> Self {
        DaapValue::Ushort(v)
    }
}
impl From<i32> for DaapValue {
    fn from(v: i32) -> Self {
        DaapValue::Int(v)
    }
}
impl From<u32> for DaapValue {
    fn from(v: u32) -> Self {
        DaapValue::Uint(v)
    }
}
impl From<i64> for DaapValue {
    fn from(v: i64) -> Self {
        DaapValue::Long(v)
    }
}
impl From<u64> for DaapValue {
    fn from(v: u64) -> Self {
        DaapValue::Ulong(v)
    }
}
impl From<String> for DaapValue {
    fn from(v: String) -> Self {
        DaapValue::Str(v)
    }
}
impl From<&str> for DaapValue {
    fn from(v: &str) -> Self {
        DaapValue::Str(v.to_owned())
    }
}
impl From<Vec<crate::object::DaapObject>> for DaapValue {
    fn from(v: Vec<crate::object::DaapObject>) -> Self {
        DaapValue::Container(v)
    }
}

/// Reinterpret a 4-byte code as the big-endian `i32` DMAP uses to carry
/// "short ASCII literal" values in `int`-typed fields (e.g. the code
/// numbers listed in a `/content-codes` response). The wire bytes this
/// produces are identical to the original 4 ASCII characters - DMAP's
/// "4-char literal" packing and `int32` packing are the same 4 bytes
/// read two different ways, not two different wire encodings.
pub fn int_from_code(code: [u8; 4]) -> i32 {
    i32::from_be_bytes(code)
}
