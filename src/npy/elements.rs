use super::{ReadDataError, ReadableElement, WritableElement, WriteDataError};
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use py_literal::Value as PyValue;
use std::{
    fmt,
    io::{self, Read as _},
    mem,
};
use thiserror::Error;

/// An element type that can be stored in an `.npy` file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    /// `b1`
    Bool,
    /// `i1`
    I8,
    /// `i2`
    I16,
    /// `i4`
    I32,
    /// `i8`
    I64,
    /// `u1`
    U8,
    /// `u2`
    U16,
    /// `u4`
    U32,
    /// `u8`
    U64,
    /// `f4`
    F32,
    /// `f8`
    F64,
}

/// Byte order of the element data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    /// `<`
    Little,
    /// `>`
    Big,
}

impl Endianness {
    const NATIVE: Self = if cfg!(target_endian = "big") { Self::Big } else { Self::Little };
}

impl DType {
    /// Parses a type descriptor string such as `'<f8'`, `'>i4'` or `'|b1'`.
    ///
    /// Returns `None` for descriptors that aren't plain strings or name an
    /// unsupported type (structured dtypes, strings, complex numbers, ...).
    pub fn from_descriptor(desc: &PyValue) -> Option<(Self, Endianness)> {
        let PyValue::String(desc) = desc else {
            return None;
        };
        let (order, rest) = match desc.as_bytes().first()? {
            b'<' => (Some(Endianness::Little), &desc[1..]),
            b'>' => (Some(Endianness::Big), &desc[1..]),
            b'=' => (Some(Endianness::NATIVE), &desc[1..]),
            b'|' => (None, &desc[1..]),
            _ => (Some(Endianness::NATIVE), desc.as_str()),
        };
        let dtype = match rest {
            "b1" | "?" => Self::Bool,
            "i1" => Self::I8,
            "i2" => Self::I16,
            "i4" => Self::I32,
            "i8" => Self::I64,
            "u1" => Self::U8,
            "u2" => Self::U16,
            "u4" => Self::U32,
            "u8" => Self::U64,
            "f4" => Self::F32,
            "f8" => Self::F64,
            _ => return None,
        };
        let endianness = match order {
            Some(order) => order,
            // '|' means "not applicable", which only makes sense for single bytes
            None if dtype.size() == 1 => Endianness::Little,
            None => return None,
        };
        Some((dtype, endianness))
    }

    /// The descriptor written for this type (little-endian).
    pub fn descriptor(self) -> PyValue {
        let desc = match self {
            Self::Bool => "|b1",
            Self::I8 => "|i1",
            Self::I16 => "<i2",
            Self::I32 => "<i4",
            Self::I64 => "<i8",
            Self::U8 => "|u1",
            Self::U16 => "<u2",
            Self::U32 => "<u4",
            Self::U64 => "<u8",
            Self::F32 => "<f4",
            Self::F64 => "<f8",
        };
        PyValue::String(desc.to_string())
    }

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
            Self::F32 => "float32",
            Self::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// An error parsing a `bool` from a byte.
#[derive(Debug, Error)]
#[error("error parsing value {0:#04x} as a bool")]
pub struct ParseBoolError(pub u8);

fn check_descriptor(type_desc: &PyValue, expected: DType) -> Result<Endianness, ReadDataError> {
    match DType::from_descriptor(type_desc) {
        Some((dtype, endianness)) if dtype == expected => Ok(endianness),
        _ => Err(ReadDataError::WrongDescriptor(type_desc.clone())),
    }
}

/// Reads exactly `len` elements of `size` bytes each.
///
/// The buffer grows with the data actually read, so a header declaring more
/// elements than the file holds fails with `MissingData` instead of
/// allocating the declared size up front.
fn read_data_bytes<R: io::Read>(
    reader: &mut R,
    len: usize,
    size: usize,
) -> Result<Vec<u8>, ReadDataError> {
    let nbytes = len.checked_mul(size).ok_or(ReadDataError::MissingData)?;
    let mut bytes = Vec::new();
    reader.take(nbytes as u64).read_to_end(&mut bytes)?;
    if bytes.len() < nbytes {
        return Err(ReadDataError::MissingData);
    }
    Ok(bytes)
}

fn check_for_extra_bytes<R: io::Read>(mut reader: R) -> Result<(), ReadDataError> {
    match io::copy(&mut reader, &mut io::sink())? {
        0 => Ok(()),
        n => Err(ReadDataError::ExtraBytes(n as usize)),
    }
}

impl ReadableElement for bool {
    fn read_to_end_exact_vec<R: io::Read>(
        mut reader: R,
        type_desc: &PyValue,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError> {
        check_descriptor(type_desc, DType::Bool)?;
        let bytes = read_data_bytes(&mut reader, len, 1)?;
        check_for_extra_bytes(&mut reader)?;
        bytes
            .into_iter()
            .map(|byte| match byte {
                0x00 => Ok(false),
                0x01 => Ok(true),
                _ => Err(ParseBoolError(byte).into()),
            })
            .collect()
    }
}

impl WritableElement for bool {
    fn type_descriptor() -> PyValue {
        DType::Bool.descriptor()
    }

    fn write<W: io::Write>(&self, mut writer: W) -> Result<(), WriteDataError> {
        writer.write_u8(u8::from(*self))?;
        Ok(())
    }

    fn write_slice<W: io::Write>(slice: &[Self], mut writer: W) -> Result<(), WriteDataError> {
        let bytes: Vec<u8> = slice.iter().map(|&b| u8::from(b)).collect();
        writer.write_all(&bytes)?;
        Ok(())
    }
}

impl ReadableElement for u8 {
    fn read_to_end_exact_vec<R: io::Read>(
        mut reader: R,
        type_desc: &PyValue,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError> {
        check_descriptor(type_desc, DType::U8)?;
        let out = read_data_bytes(&mut reader, len, 1)?;
        check_for_extra_bytes(&mut reader)?;
        Ok(out)
    }
}

impl WritableElement for u8 {
    fn type_descriptor() -> PyValue {
        DType::U8.descriptor()
    }

    fn write<W: io::Write>(&self, mut writer: W) -> Result<(), WriteDataError> {
        writer.write_u8(*self)?;
        Ok(())
    }

    fn write_slice<W: io::Write>(slice: &[Self], mut writer: W) -> Result<(), WriteDataError> {
        writer.write_all(slice)?;
        Ok(())
    }
}

impl ReadableElement for i8 {
    fn read_to_end_exact_vec<R: io::Read>(
        mut reader: R,
        type_desc: &PyValue,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError> {
        check_descriptor(type_desc, DType::I8)?;
        let bytes = read_data_bytes(&mut reader, len, 1)?;
        check_for_extra_bytes(&mut reader)?;
        Ok(bytes.into_iter().map(|byte| byte as i8).collect())
    }
}

impl WritableElement for i8 {
    fn type_descriptor() -> PyValue {
        DType::I8.descriptor()
    }

    fn write<W: io::Write>(&self, mut writer: W) -> Result<(), WriteDataError> {
        writer.write_i8(*self)?;
        Ok(())
    }

    fn write_slice<W: io::Write>(slice: &[Self], mut writer: W) -> Result<(), WriteDataError> {
        for &elem in slice {
            writer.write_i8(elem)?;
        }
        Ok(())
    }
}

macro_rules! impl_multibyte_element {
    ($elem:ty, $dtype:ident, $zero:expr, $read_into:ident, $write_one:ident) => {
        impl ReadableElement for $elem {
            fn read_to_end_exact_vec<R: io::Read>(
                mut reader: R,
                type_desc: &PyValue,
                len: usize,
            ) -> Result<Vec<Self>, ReadDataError> {
                let endianness = check_descriptor(type_desc, DType::$dtype)?;
                let bytes = read_data_bytes(&mut reader, len, mem::size_of::<$elem>())?;
                check_for_extra_bytes(&mut reader)?;
                let mut out = vec![$zero; len];
                match endianness {
                    Endianness::Little => LittleEndian::$read_into(&bytes, &mut out),
                    Endianness::Big => BigEndian::$read_into(&bytes, &mut out),
                }
                Ok(out)
            }
        }

        impl WritableElement for $elem {
            fn type_descriptor() -> PyValue {
                DType::$dtype.descriptor()
            }

            fn write<W: io::Write>(&self, mut writer: W) -> Result<(), WriteDataError> {
                writer.$write_one::<LittleEndian>(*self)?;
                Ok(())
            }

            fn write_slice<W: io::Write>(
                slice: &[Self],
                mut writer: W,
            ) -> Result<(), WriteDataError> {
                for &elem in slice {
                    writer.$write_one::<LittleEndian>(elem)?;
                }
                Ok(())
            }
        }
    };
}

impl_multibyte_element!(i16, I16, 0, read_i16_into, write_i16);
impl_multibyte_element!(i32, I32, 0, read_i32_into, write_i32);
impl_multibyte_element!(i64, I64, 0, read_i64_into, write_i64);
impl_multibyte_element!(u16, U16, 0, read_u16_into, write_u16);
impl_multibyte_element!(u32, U32, 0, read_u32_into, write_u32);
impl_multibyte_element!(u64, U64, 0, read_u64_into, write_u64);
impl_multibyte_element!(f32, F32, 0., read_f32_into, write_f32);
impl_multibyte_element!(f64, F64, 0., read_f64_into, write_f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(s: &str) -> PyValue {
        PyValue::String(s.to_string())
    }

    #[test]
    fn parses_descriptors() {
        assert_eq!(DType::from_descriptor(&desc("<f8")), Some((DType::F64, Endianness::Little)));
        assert_eq!(DType::from_descriptor(&desc(">i4")), Some((DType::I32, Endianness::Big)));
        assert_eq!(DType::from_descriptor(&desc("|b1")), Some((DType::Bool, Endianness::Little)));
        assert_eq!(DType::from_descriptor(&desc("|u1")), Some((DType::U8, Endianness::Little)));
        assert_eq!(DType::from_descriptor(&desc("|f8")), None);
        assert_eq!(DType::from_descriptor(&desc("<c16")), None);
        assert_eq!(DType::from_descriptor(&desc("<U10")), None);
        assert_eq!(DType::from_descriptor(&PyValue::List(vec![])), None);
    }

    #[test]
    fn written_descriptor_parses_back() {
        for dtype in [DType::Bool, DType::I8, DType::U16, DType::I64, DType::F32, DType::F64] {
            let (parsed, _) = DType::from_descriptor(&dtype.descriptor()).unwrap();
            assert_eq!(parsed, dtype);
        }
    }

    #[test]
    fn reads_big_endian_floats() {
        let bytes = [1.5f64.to_be_bytes(), (-2.0f64).to_be_bytes()].concat();
        let out = f64::read_to_end_exact_vec(&bytes[..], &desc(">f8"), 2).unwrap();
        assert_eq!(out, vec![1.5, -2.0]);
    }

    #[test]
    fn rejects_mismatched_descriptor() {
        let bytes = 7i32.to_le_bytes();
        let err = f32::read_to_end_exact_vec(&bytes[..], &desc("<i4"), 1).unwrap_err();
        assert!(matches!(err, ReadDataError::WrongDescriptor(_)));
    }

    #[test]
    fn detects_missing_and_extra_data() {
        let bytes = [0u8; 12];
        let err = i32::read_to_end_exact_vec(&bytes[..], &desc("<i4"), 4).unwrap_err();
        assert!(matches!(err, ReadDataError::MissingData));
        let err = i32::read_to_end_exact_vec(&bytes[..], &desc("<i4"), 2).unwrap_err();
        assert!(matches!(err, ReadDataError::ExtraBytes(4)));
    }

    #[test]
    fn oversized_declared_length_is_missing_data() {
        let bytes = [0u8; 16];
        let err = f64::read_to_end_exact_vec(&bytes[..], &desc("<f8"), 1 << 40).unwrap_err();
        assert!(matches!(err, ReadDataError::MissingData));
        let err = bool::read_to_end_exact_vec(&bytes[..], &desc("|b1"), 1 << 40).unwrap_err();
        assert!(matches!(err, ReadDataError::MissingData));
    }

    #[test]
    fn reads_signed_bytes() {
        let out = i8::read_to_end_exact_vec(&[0xffu8, 0x7f][..], &desc("|i1"), 2).unwrap();
        assert_eq!(out, vec![-1, 127]);
    }

    #[test]
    fn rejects_invalid_bool_bytes() {
        let err = bool::read_to_end_exact_vec(&[0u8, 1, 2][..], &desc("|b1"), 3).unwrap_err();
        assert!(matches!(err, ReadDataError::ParseBool(ParseBoolError(2))));
    }
}
