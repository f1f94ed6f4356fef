use crate::codes::{lookup_code, lookup_name};
use crate::error::{Error, Result};
use crate::types::{DataType, DaapValue};

/// A single node of a DMAP tagged-data tree: a resolved code, its
/// symbolic name and type, and a value. Containers hold further nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct DaapObject {
    pub code: [u8; 4],
    pub name: &'static str,
    pub data_type: DataType,
    pub value: DaapValue,
}

impl DaapObject {
    /// Build a node by looking up `name` in the code table. Fails if the
    /// name is unknown or the value's type doesn't match the type the
    /// table registers for this code.
    pub fn new(name: &str, value: impl Into<DaapValue>) -> Result<Self> {
        let entry = lookup_name(name).ok_or_else(|| Error::UnknownCode(name.to_owned()))?;
        let value = value.into();

        if value.data_type() != entry.data_type {
            return Err(Error::Encode {
                code: code_to_string(&entry.code),
                name: entry.name,
                cause: format!(
                    "value is {:?} but '{}' is registered as {:?}",
                    value.data_type(),
                    name,
                    entry.data_type
                ),
            });
        }

        Ok(Self {
            code: entry.code,
            name: entry.name,
            data_type: entry.data_type,
            value,
        })
    }

    /// Build a container node from already-built children.
    pub fn container(name: &str, children: Vec<DaapObject>) -> Result<Self> {
        Self::new(name, children)
    }

    /// Fast-construction path: the caller has already resolved `code`
    /// against the table (e.g. a hot response-builder loop that
    /// resolves codes once outside the loop). Skips the name lookup.
    /// Must never produce bytes different from the equivalent `new()`
    /// call.
    pub fn from_resolved(code: [u8; 4], value: DaapValue) -> Result<Self> {
        let entry = lookup_code(&code).ok_or_else(|| Error::UnknownCode(code_to_string(&code)))?;

        if value.data_type() != entry.data_type {
            return Err(Error::Encode {
                code: code_to_string(&code),
                name: entry.name,
                cause: format!(
                    "value is {:?} but code is registered as {:?}",
                    value.data_type(),
                    entry.data_type
                ),
            });
        }

        Ok(Self {
            code,
            name: entry.name,
            data_type: entry.data_type,
            value,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        match &self.value {
            DaapValue::Container(children) => {
                let mut inner = Vec::new();
                for child in children {
                    child.encode_into(&mut inner)?;
                }
                push_tlv_header(buf, &self.code, &self.name, inner.len())?;
                buf.extend_from_slice(&inner);
            }
            other => {
                let bytes = encode_atom(other);
                push_tlv_header(buf, &self.code, &self.name, bytes.len())?;
                buf.extend_from_slice(&bytes);
            }
        }
        Ok(())
    }

    /// Decode a single complete tree from `bytes`. Fails if trailing
    /// bytes remain after the root node's declared length is consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (object, consumed) = Self::decode_one(bytes)?;
        if consumed != bytes.len() {
            return Err(Error::Decode {
                code: code_to_string(&object.code),
                cause: format!(
                    "trailing {} byte(s) after decoding root object",
                    bytes.len() - consumed
                ),
            });
        }
        Ok(object)
    }

    fn decode_one(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < 8 {
            return Err(Error::UnexpectedEof("tlv header"));
        }

        let code: [u8; 4] = bytes[0..4].try_into().expect("checked len");
        let length = u32::from_be_bytes(bytes[4..8].try_into().expect("checked len")) as usize;
        let entry = lookup_code(&code).ok_or_else(|| Error::UnknownCode(code_to_string(&code)))?;

        let start = 8;
        let end = start
            .checked_add(length)
            .ok_or(Error::UnexpectedEof("tlv body"))?;
        if end > bytes.len() {
            return Err(Error::UnexpectedEof("tlv body"));
        }
        let payload = &bytes[start..end];

        let value = if entry.data_type == DataType::Container {
            let mut children = Vec::new();
            let mut offset = 0usize;
            while offset < payload.len() {
                let (child, consumed) = Self::decode_one(&payload[offset..])?;
                children.push(child);
                offset += consumed;
            }
            if offset != payload.len() {
                return Err(Error::ContainerLengthMismatch {
                    code: code_to_string(&code),
                    declared: length as u32,
                    actual: offset as u32,
                });
            }
            DaapValue::Container(children)
        } else {
            decode_atom(entry.data_type, payload, &code)?
        };

        Ok((
            Self {
                code,
                name: entry.name,
                data_type: entry.data_type,
                value,
            },
            end,
        ))
    }
}

fn push_tlv_header(buf: &mut Vec<u8>, code: &[u8; 4], name: &str, length: usize) -> Result<()> {
    let length_u32 = u32::try_from(length).map_err(|_| Error::Encode {
        code: code_to_string(code),
        name: leak_or_static(name),
        cause: format!("value length {length} exceeds u32::MAX"),
    })?;
    buf.extend_from_slice(code);
    buf.extend_from_slice(&length_u32.to_be_bytes());
    Ok(())
}

// `name` here is always a `&'static str` borrowed from the code table in
// practice (the only caller passes `self.name`); this helper just avoids
// threading the lifetime through `push_tlv_header`'s signature.
fn leak_or_static(name: &str) -> &'static str {
    lookup_name(name).map(|e| e.name).unwrap_or("<unknown>")
}

fn encode_atom(value: &DaapValue) -> Vec<u8> {
    match value {
        DaapValue::Byte(v) => vec![*v as u8],
        DaapValue::Ubyte(v) => vec![*v],
        DaapValue::Short(v) => v.to_be_bytes().to_vec(),
        DaapValue::Ushort(v) => v.to_be_bytes().to_vec(),
        DaapValue::Int(v) => v.to_be_bytes().to_vec(),
        DaapValue::Uint(v) => v.to_be_bytes().to_vec(),
        DaapValue::Long(v) => v.to_be_bytes().to_vec(),
        DaapValue::Ulong(v) => v.to_be_bytes().to_vec(),
        DaapValue::Date(v) => v.to_be_bytes().to_vec(),
        DaapValue::Version(major, minor) => {
            let mut bytes = Vec::with_capacity(4);
            bytes.extend_from_slice(&major.to_be_bytes());
            bytes.extend_from_slice(&minor.to_be_bytes());
            bytes
        }
        DaapValue::Str(s) => s.as_bytes().to_vec(),
        DaapValue::Container(_) => unreachable!("containers are encoded by encode_into"),
    }
}

fn decode_atom(data_type: DataType, payload: &[u8], code: &[u8; 4]) -> Result<DaapValue> {
    let need = |n: usize| -> Result<()> {
        if payload.len() != n {
            Err(Error::Decode {
                code: code_to_string(code),
                cause: format!("expected {n} byte(s), got {}", payload.len()),
            })
        } else {
            Ok(())
        }
    };

    Ok(match data_type {
        DataType::Byte => {
            need(1)?;
            DaapValue::Byte(payload[0] as i8)
        }
        DataType::Ubyte => {
            need(1)?;
            DaapValue::Ubyte(payload[0])
        }
        DataType::Short => {
            need(2)?;
            DaapValue::Short(i16::from_be_bytes(payload.try_into().unwrap()))
        }
        DataType::Ushort => {
            need(2)?;
            DaapValue::Ushort(u16::from_be_bytes(payload.try_into().unwrap()))
        }
        DataType::Int => {
            need(4)?;
            DaapValue::Int(i32::from_be_bytes(payload.try_into().unwrap()))
        }
        DataType::Uint => {
            need(4)?;
            DaapValue::Uint(u32::from_be_bytes(payload.try_into().unwrap()))
        }
        DataType::Long => {
            need(8)?;
            DaapValue::Long(i64::from_be_bytes(payload.try_into().unwrap()))
        }
        DataType::Ulong => {
            need(8)?;
            DaapValue::Ulong(u64::from_be_bytes(payload.try_into().unwrap()))
        }
        DataType::Date => {
            need(4)?;
            DaapValue::Date(u32::from_be_bytes(payload.try_into().unwrap()))
        }
        DataType::Version => {
            need(4)?;
            let major = u16::from_be_bytes(payload[0..2].try_into().unwrap());
            let minor = u16::from_be_bytes(payload[2..4].try_into().unwrap());
            DaapValue::Version(major, minor)
        }
        DataType::Str => DaapValue::Str(decode_string(payload)),
        DataType::Container => unreachable!("containers are decoded by decode_one"),
    })
}

/// UTF-8 first, falling back to Latin-1 (each byte is its own Unicode
/// scalar value) for the occasional non-UTF-8 tag iTunes emits.
fn decode_string(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(s) => s.to_owned(),
        Err(_) => payload.iter().map(|&b| b as char).collect(),
    }
}

fn code_to_string(code: &[u8; 4]) -> String {
    String::from_utf8_lossy(code).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_status_code_matches_known_bytes() {
        let object = DaapObject::new("dmap.status", 200u32).unwrap();
        let bytes = object.encode().unwrap();
        assert_eq!(
            bytes,
            vec![0x6D, 0x73, 0x74, 0x74, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0xC8]
        );
    }

    #[test]
    fn round_trip_login_response_container() {
        let object = DaapObject::container(
            "dmap.loginresponse",
            vec![
                DaapObject::new("dmap.status", 200u32).unwrap(),
                DaapObject::new("dmap.sessionid", 1u32).unwrap(),
            ],
        )
        .unwrap();

        let bytes = object.encode().unwrap();
        let decoded = DaapObject::decode(&bytes).unwrap();
        assert_eq!(decoded, object);
    }

    #[test]
    fn decode_rejects_unknown_code() {
        let bytes = [b'z', b'z', b'z', b'z', 0, 0, 0, 0];
        let err = DaapObject::decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnknownCode(_)));
    }

    #[test]
    fn decode_rejects_short_input() {
        let bytes = [b'm', b's'];
        let err = DaapObject::decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(_)));
    }

    #[test]
    fn string_decode_falls_back_to_latin1_on_invalid_utf8() {
        // 0xE9 alone is not valid UTF-8 but is "é" in Latin-1.
        let payload = [0xE9u8];
        let value = decode_atom(DataType::Str, &payload, b"minm").unwrap();
        assert_eq!(value, DaapValue::Str("\u{e9}".to_string()));
    }

    #[test]
    fn negative_byte_and_short_round_trip() {
        let object = DaapObject::new("dmap.updatetype", 0u8).unwrap();
        assert_eq!(object.encode().unwrap().last(), Some(&0u8));

        let short = DaapObject::new("daap.songyear", -1i16).unwrap();
        let bytes = short.encode().unwrap();
        let decoded = DaapObject::decode(&bytes).unwrap();
        assert_eq!(decoded.value, DaapValue::Short(-1));
    }

    #[test]
    fn content_codes_number_reinterprets_code_as_int() {
        use crate::types::int_from_code;

        let value = int_from_code(*b"mstt");
        let object = DaapObject::new("dmap.contentcodesnumber", value).unwrap();
        let bytes = object.encode().unwrap();
        // The last 4 bytes of the encoding are exactly the ASCII code.
        assert_eq!(&bytes[bytes.len() - 4..], b"mstt");
    }

    #[test]
    fn container_length_mismatch_is_detected() {
        // A container claiming 4 bytes but containing only a header-less
        // fragment (not a full child TLV) must be rejected, not panic.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"mlit");
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        let err = DaapObject::decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnknownCode(_) | Error::UnexpectedEof(_)));
    }

    #[test]
    fn new_rejects_type_mismatch() {
        // dmap.status is Uint; handing it a Str must fail cleanly.
        let err = DaapObject::new("dmap.status", "not a number").unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }
}
