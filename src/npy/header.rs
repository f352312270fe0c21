use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use num_traits::ToPrimitive;
use py_literal::{
    FormatError as PyValueFormatError, ParseError as PyValueParseError, Value as PyValue,
};
use std::{
    fmt,
    io::{self, Read as _},
};
use thiserror::Error;

/// Magic string to indicate npy format.
const MAGIC_STRING: &[u8] = b"\x93NUMPY";

/// The total header length (including magic string, version number, header
/// length value, array format description, padding, and final newline) must be
/// evenly divisible by this value.
const HEADER_DIVISOR: usize = 64;

/// An error parsing the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum ParseHeaderError {
    /// The start of the file does not match the magic string.
    #[error("start does not match magic string")]
    MagicString,
    /// The version number is not recognized.
    #[error("unknown version number: {major}.{minor}")]
    Version {
        /// Major version number.
        major: u8,
        /// Minor version number.
        minor: u8,
    },
    /// Indicates that the `HEADER_LEN` doesn't fit in `usize`.
    #[error("HEADER_LEN {0} does not fit in `usize`")]
    HeaderLengthOverflow(u32),
    /// The array format string contains non-ASCII characters, which versions
    /// 1.0 and 2.0 forbid.
    #[error("non-ascii in array format string; this is not supported in .npy format versions 1.0 and 2.0")]
    NonAscii,
    /// Error parsing a version 3.0 array format string as UTF-8.
    #[error("error parsing array format string as UTF-8: {0}")]
    Utf8Parse(#[from] std::str::Utf8Error),
    /// An unknown key was found in the metadata dictionary.
    #[error("unknown key: {0}")]
    UnknownKey(PyValue),
    /// A required key was missing from the metadata dictionary.
    #[error("missing key: {0}")]
    MissingKey(&'static str),
    /// An illegal value was found for a key in the metadata dictionary.
    #[error("illegal value for key {key}: {value}")]
    IllegalValue {
        /// The key for which the value was illegal.
        key: &'static str,
        /// The illegal value.
        value: PyValue,
    },
    /// Error parsing the metadata dictionary.
    #[error("error parsing metadata dict: {0}")]
    DictParse(#[from] PyValueParseError),
    /// The metadata is not a dictionary.
    #[error("metadata is not a dict: {0}")]
    MetaNotDict(PyValue),
    /// The header is missing a newline at the end.
    #[error("newline missing at end of header")]
    MissingNewline,
    /// The input ended before the end of the header.
    #[error("input is too short to contain a .npy header")]
    Truncated,
}

/// An error reading the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum ReadHeaderError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error parsing the header.
    #[error("error parsing header: {0}")]
    Parse(#[from] ParseHeaderError),
}

/// An error formatting the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum FormatHeaderError {
    /// The metadata dictionary could not be rendered as a Python literal.
    #[error("error formatting Python value: {0}")]
    PyValue(#[from] PyValueFormatError),
    /// The total header length overflows `usize`, or `HEADER_LEN` exceeds the
    /// maximum encodable value.
    #[error("the header is too long")]
    HeaderTooLong,
}

/// An error writing the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum WriteHeaderError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error formatting the header.
    #[error("error formatting header: {0}")]
    Format(#[from] FormatHeaderError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Version {
    V1_0,
    V2_0,
    V3_0,
}

impl Version {
    /// Number of bytes taken up by version number (1 byte for major version, 1
    /// byte for minor version).
    const VERSION_NUM_BYTES: usize = 2;

    fn from_array(bytes: [u8; Self::VERSION_NUM_BYTES]) -> Result<Self, ParseHeaderError> {
        match bytes {
            [0x01, 0x00] => Ok(Version::V1_0),
            [0x02, 0x00] => Ok(Version::V2_0),
            [0x03, 0x00] => Ok(Version::V3_0),
            [major, minor] => Err(ParseHeaderError::Version { major, minor }),
        }
    }

    const fn to_array(self) -> [u8; Self::VERSION_NUM_BYTES] {
        match self {
            Version::V1_0 => [0x01, 0x00],
            Version::V2_0 => [0x02, 0x00],
            Version::V3_0 => [0x03, 0x00],
        }
    }

    /// Number of bytes in representation of header length.
    const fn header_len_num_bytes(self) -> usize {
        match self {
            Version::V1_0 => 2,
            Version::V2_0 | Version::V3_0 => 4,
        }
    }

    fn read_header_len<R: io::Read>(self, mut reader: R) -> Result<usize, ReadHeaderError> {
        match self {
            Version::V1_0 => Ok(usize::from(reader.read_u16::<LittleEndian>()?)),
            Version::V2_0 | Version::V3_0 => {
                let header_len = reader.read_u32::<LittleEndian>()?;
                let header_len = usize::try_from(header_len)
                    .map_err(|_| ParseHeaderError::HeaderLengthOverflow(header_len))?;
                Ok(header_len)
            }
        }
    }

    /// Returns `None` if `header_len` does not fit the field of this version.
    fn format_header_len(self, header_len: usize) -> Option<Vec<u8>> {
        let mut out = vec![0; self.header_len_num_bytes()];
        match self {
            Version::V1_0 => LittleEndian::write_u16(&mut out, u16::try_from(header_len).ok()?),
            Version::V2_0 | Version::V3_0 => {
                LittleEndian::write_u32(&mut out, u32::try_from(header_len).ok()?);
            }
        }
        Some(out)
    }

    /// Computes the padded total header length and the encoded `HEADER_LEN`
    /// for a dictionary literal of `dict_len` bytes.
    fn compute_lengths(self, dict_len: usize) -> Option<(usize, Vec<u8>)> {
        let prefix_len =
            MAGIC_STRING.len() + Version::VERSION_NUM_BYTES + self.header_len_num_bytes();
        // Trailing '\n'
        let unpadded_total_len = prefix_len.checked_add(dict_len)?.checked_add(1)?;
        let padding_len = (HEADER_DIVISOR - unpadded_total_len % HEADER_DIVISOR) % HEADER_DIVISOR;
        let total_len = unpadded_total_len.checked_add(padding_len)?;
        let formatted_header_len = self.format_header_len(total_len - prefix_len)?;
        Some((total_len, formatted_header_len))
    }
}

/// The metadata dictionary at the start of a `.npy` file.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    /// The `descr` entry, e.g. `'<f8'`.
    pub type_descriptor: PyValue,
    /// Whether the data is stored in column-major order.
    pub fortran_order: bool,
    /// Axis lengths.
    pub shape: Vec<usize>,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.to_py_value(), f)
    }
}

impl Header {
    /// Number of elements described by `shape`, or `None` on overflow.
    pub fn element_count(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
    }

    fn from_py_value(value: PyValue) -> Result<Self, ParseHeaderError> {
        let PyValue::Dict(dict) = value else {
            return Err(ParseHeaderError::MetaNotDict(value));
        };
        let mut type_descriptor = None;
        let mut fortran_order = None;
        let mut shape = None;
        for (key, value) in dict {
            let PyValue::String(k) = &key else {
                return Err(ParseHeaderError::UnknownKey(key));
            };
            match k.as_str() {
                "descr" => type_descriptor = Some(value),
                "fortran_order" => match value {
                    PyValue::Boolean(b) => fortran_order = Some(b),
                    value => {
                        return Err(ParseHeaderError::IllegalValue { key: "fortran_order", value })
                    }
                },
                "shape" => match parse_shape(&value) {
                    Some(s) => shape = Some(s),
                    None => return Err(ParseHeaderError::IllegalValue { key: "shape", value }),
                },
                _ => return Err(ParseHeaderError::UnknownKey(key)),
            }
        }
        Ok(Self {
            type_descriptor: type_descriptor.ok_or(ParseHeaderError::MissingKey("descr"))?,
            fortran_order: fortran_order.ok_or(ParseHeaderError::MissingKey("fortran_order"))?,
            shape: shape.ok_or(ParseHeaderError::MissingKey("shape"))?,
        })
    }

    pub(crate) fn from_reader<R: io::Read>(mut reader: R) -> Result<Self, ReadHeaderError> {
        let mut magic = [0; MAGIC_STRING.len()];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_STRING {
            return Err(ParseHeaderError::MagicString.into());
        }

        let mut version = [0; Version::VERSION_NUM_BYTES];
        reader.read_exact(&mut version)?;
        let version = Version::from_array(version)?;
        let header_len = version.read_header_len(&mut reader)?;

        // Grows with the bytes actually present rather than the declared length
        let mut buf = Vec::new();
        reader.by_ref().take(header_len as u64).read_to_end(&mut buf)?;
        if buf.len() < header_len {
            return Err(ParseHeaderError::Truncated.into());
        }
        let Some((&b'\n', without_newline)) = buf.split_last() else {
            return Err(ParseHeaderError::MissingNewline.into());
        };
        let header_str = match version {
            Version::V1_0 | Version::V2_0 => {
                if !without_newline.is_ascii() {
                    return Err(ParseHeaderError::NonAscii.into());
                }
                std::str::from_utf8(without_newline).map_err(ParseHeaderError::from)?
            }
            Version::V3_0 => std::str::from_utf8(without_newline).map_err(ParseHeaderError::from)?,
        };
        // numpy pads with spaces before the newline
        let arr_format: PyValue = header_str.trim_end().parse().map_err(ParseHeaderError::from)?;
        Ok(Self::from_py_value(arr_format)?)
    }

    fn to_py_value(&self) -> PyValue {
        PyValue::Dict(vec![
            (PyValue::String("descr".into()), self.type_descriptor.clone()),
            (PyValue::String("fortran_order".into()), PyValue::Boolean(self.fortran_order)),
            (
                PyValue::String("shape".into()),
                PyValue::Tuple(self.shape.iter().map(|&n| PyValue::Integer(n.into())).collect()),
            ),
        ])
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatHeaderError> {
        let mut arr_format = Vec::new();
        self.to_py_value().write_ascii(&mut arr_format)?;

        let (version, (total_len, formatted_header_len)) = [Version::V1_0, Version::V2_0]
            .into_iter()
            .find_map(|version| Some((version, version.compute_lengths(arr_format.len())?)))
            .ok_or(FormatHeaderError::HeaderTooLong)?;

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(MAGIC_STRING);
        out.extend_from_slice(&version.to_array());
        out.extend_from_slice(&formatted_header_len);
        out.extend_from_slice(&arr_format);
        out.resize(total_len - 1, b' ');
        out.push(b'\n');

        debug_assert_eq!(out.len() % HEADER_DIVISOR, 0);
        Ok(out)
    }

    pub(crate) fn write<W: io::Write>(&self, mut writer: W) -> Result<(), WriteHeaderError> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }
}

fn parse_shape(value: &PyValue) -> Option<Vec<usize>> {
    value.as_tuple()?.iter().map(|elem| elem.as_integer()?.to_usize()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(shape: &[usize]) -> Header {
        Header {
            type_descriptor: PyValue::String("<f8".into()),
            fortran_order: false,
            shape: shape.to_vec(),
        }
    }

    #[test]
    fn written_header_is_padded_and_parses_back() {
        let h = header(&[64, 64, 64]);
        let bytes = h.to_bytes().unwrap();
        assert_eq!(bytes.len() % HEADER_DIVISOR, 0);
        assert_eq!(&bytes[..6], MAGIC_STRING);
        assert_eq!(&bytes[6..8], &[1, 0]);
        assert_eq!(*bytes.last().unwrap(), b'\n');
        assert_eq!(Header::from_reader(&bytes[..]).unwrap(), h);
    }

    #[test]
    fn parses_numpy_written_header() {
        let dict = b"{'descr': '<i8', 'fortran_order': True, 'shape': (2, 3), }";
        let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
        let len = 128 - 10;
        bytes.extend_from_slice(&(len as u16).to_le_bytes());
        bytes.extend_from_slice(dict);
        bytes.resize(127, b' ');
        bytes.push(b'\n');
        let h = Header::from_reader(&bytes[..]).unwrap();
        assert_eq!(h.type_descriptor, PyValue::String("<i8".into()));
        assert!(h.fortran_order);
        assert_eq!(h.shape, vec![2, 3]);
        assert_eq!(h.element_count(), Some(6));
    }

    #[test]
    fn rejects_bad_magic() {
        let err = Header::from_reader(&b"\x93NUMPX\x01\x00\x00\x00"[..]).unwrap_err();
        assert!(matches!(err, ReadHeaderError::Parse(ParseHeaderError::MagicString)));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = Header::from_reader(&b"\x93NUMPY\x04\x00\x00\x00"[..]).unwrap_err();
        assert!(matches!(
            err,
            ReadHeaderError::Parse(ParseHeaderError::Version { major: 4, minor: 0 })
        ));
    }

    #[test]
    fn huge_declared_header_len_is_truncated() {
        let mut bytes = b"\x93NUMPY\x02\x00".to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(b"{'descr': '<f8'");
        let err = Header::from_reader(&bytes[..]).unwrap_err();
        assert!(matches!(err, ReadHeaderError::Parse(ParseHeaderError::Truncated)));
    }

    #[test]
    fn reports_missing_key() {
        let err = Header::from_py_value("{'descr': '<f8', 'fortran_order': False}".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, ParseHeaderError::MissingKey("shape")));
    }

    #[test]
    fn empty_shape_is_a_scalar() {
        assert_eq!(header(&[]).element_count(), Some(1));
        assert_eq!(header(&[usize::MAX, 2]).element_count(), None);
    }
}
