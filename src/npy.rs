mod elements;
mod header;

pub use self::{
    elements::{DType, Endianness, ParseBoolError},
    header::{FormatHeaderError, Header, ParseHeaderError, ReadHeaderError, WriteHeaderError},
};
use py_literal::Value as PyValue;
use std::{fs, io, path::Path};
use thiserror::Error;

/// Read an `.npy` file located at the specified path.
///
/// This is a convenience function for opening the file followed by
/// [`ReadNpyExt::read_npy`].
///
/// # Example
///
/// ```no_run
/// use ndarray::Array3;
/// use npy2csv::read_npy;
/// # use npy2csv::ReadNpyError;
///
/// let cloud: Array3<f64> = read_npy("pointcloud.npy")?;
/// # println!("cloud = {}", cloud);
/// # Ok::<_, ReadNpyError>(())
/// ```
pub fn read_npy<P, T>(path: P) -> Result<T, ReadNpyError>
where
    P: AsRef<Path>,
    T: ReadNpyExt,
{
    T::read_npy(io::BufReader::new(fs::File::open(path)?))
}

/// Reads only the header of the `.npy` file at `path`.
pub fn read_npy_header<P: AsRef<Path>>(path: P) -> Result<Header, ReadNpyError> {
    Ok(Header::from_reader(io::BufReader::new(fs::File::open(path)?))?)
}

/// Writes an array to an `.npy` file at the specified path.
///
/// This function will create the file if it does not exist, or overwrite it if
/// it does.
///
/// # Example
///
/// ```no_run
/// use ndarray::Array;
/// use npy2csv::write_npy;
/// # use npy2csv::WriteNpyError;
///
/// let cloud = Array::range(0., 262144., 1.).into_shape_with_order((64, 64, 64)).unwrap();
/// write_npy("pointcloud.npy", &cloud)?;
/// # Ok::<_, WriteNpyError>(())
/// ```
pub fn write_npy<P, T>(path: P, array: &T) -> Result<(), WriteNpyError>
where
    P: AsRef<Path>,
    T: WriteNpyExt,
{
    array.write_npy(io::BufWriter::new(fs::File::create(path)?))
}

/// An array element type that can be written to an `.npy` file.
pub trait WritableElement: Sized {
    /// Returns a descriptor of the type that can be used in the header.
    fn type_descriptor() -> PyValue;

    /// Writes a single instance of `Self` to the writer.
    fn write<W: io::Write>(&self, writer: W) -> Result<(), WriteDataError>;

    /// Writes a slice of `Self` to the writer.
    fn write_slice<W: io::Write>(slice: &[Self], writer: W) -> Result<(), WriteDataError>;
}

/// Extension trait for writing an array to `.npy` files.
///
/// The writer is flushed before returning. Wrap files in an
/// [`io::BufWriter`]: arrays that are neither C- nor Fortran-contiguous are
/// written one element at a time.
pub trait WriteNpyExt {
    /// Writes the array to `writer` in [`.npy`
    /// format](https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html).
    fn write_npy<W: io::Write>(&self, writer: W) -> Result<(), WriteNpyError>;
}

/// An error writing array data.
#[derive(Debug, Error)]
pub enum WriteDataError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An error writing a `.npy` file.
#[derive(Debug, Error)]
pub enum WriteNpyError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error formatting the header.
    #[error("error formatting header: {0}")]
    FormatHeader(#[from] FormatHeaderError),
}

impl From<WriteHeaderError> for WriteNpyError {
    fn from(err: WriteHeaderError) -> Self {
        match err {
            WriteHeaderError::Io(err) => Self::Io(err),
            WriteHeaderError::Format(err) => Self::FormatHeader(err),
        }
    }
}

impl From<WriteDataError> for WriteNpyError {
    fn from(err: WriteDataError) -> Self {
        match err {
            WriteDataError::Io(err) => Self::Io(err),
        }
    }
}

/// An array element type that can be read from an `.npy` file.
pub trait ReadableElement: Sized {
    /// Reads to the end of the `reader`, creating a `Vec` of length `len`.
    ///
    /// This method returns `Err(_)` in at least the following cases:
    ///
    /// * if the `type_desc` does not match `Self`
    /// * if the `reader` has fewer elements than `len`
    /// * if the `reader` has extra bytes after reading `len` elements
    fn read_to_end_exact_vec<R: io::Read>(
        reader: R,
        type_desc: &PyValue,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError>;
}

/// Extension trait for reading arrays from `.npy` files.
pub trait ReadNpyExt: Sized {
    /// Reads the array from `reader` in [`.npy`
    /// format](https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html).
    fn read_npy<R: io::Read>(reader: R) -> Result<Self, ReadNpyError>;
}

/// An error reading array data.
#[derive(Debug, Error)]
pub enum ReadDataError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(io::Error),
    /// An error parsing the booleans.
    #[error("error parsing data: {0}")]
    ParseBool(#[from] ParseBoolError),
    /// The type descriptor does not match the element type.
    #[error("incorrect descriptor ({0}) for this type")]
    WrongDescriptor(PyValue),
    /// The file does not contain all the data described in the header.
    #[error("reached EOF before reading all data")]
    MissingData,
    /// Extra bytes are present between the end of the data and the end of the
    /// file.
    #[error("file had {0} extra bytes before EOF")]
    ExtraBytes(usize),
}

impl From<io::Error> for ReadDataError {
    /// `UnexpectedEof` becomes `MissingData`; everything else is `Io`.
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::MissingData,
            _ => Self::Io(err),
        }
    }
}

/// An error reading a `.npy` file.
#[derive(Debug, Error)]
pub enum ReadNpyError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error parsing the file header.
    #[error("error parsing header: {0}")]
    ParseHeader(#[from] ParseHeaderError),
    /// An error parsing the booleans.
    #[error("error parsing data: {0}")]
    ParseBool(ParseBoolError),
    /// Overflow while computing the length of the array (in units of bytes or
    /// the number of elements) from the shape described in the file header.
    #[error("overflow computing length from shape")]
    LengthOverflow,
    /// An error caused by incorrect `Dimension` type.
    #[error("ndim {1} of array did not match Dimension type with NDIM = {0:?}")]
    WrongNdim(Option<usize>, usize),
    /// The type descriptor does not match the element type.
    #[error("incorrect descriptor ({0}) for this type")]
    WrongDescriptor(PyValue),
    /// The file does not contain all the data described in the header.
    #[error("reached EOF before reading all data")]
    MissingData,
    /// Extra bytes are present between the end of the data and the end of the
    /// file.
    #[error("file had {0} extra bytes before EOF")]
    ExtraBytes(usize),
}

impl From<ReadHeaderError> for ReadNpyError {
    fn from(err: ReadHeaderError) -> Self {
        match err {
            ReadHeaderError::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Self::ParseHeader(ParseHeaderError::Truncated)
            }
            ReadHeaderError::Io(err) => Self::Io(err),
            ReadHeaderError::Parse(err) => Self::ParseHeader(err),
        }
    }
}

impl From<ReadDataError> for ReadNpyError {
    fn from(err: ReadDataError) -> Self {
        match err {
            ReadDataError::Io(err) => Self::Io(err),
            ReadDataError::WrongDescriptor(desc) => Self::WrongDescriptor(desc),
            ReadDataError::MissingData => Self::MissingData,
            ReadDataError::ExtraBytes(nbytes) => Self::ExtraBytes(nbytes),
            ReadDataError::ParseBool(err) => Self::ParseBool(err),
        }
    }
}
