//! The `.npy` to CSV conversion pipeline.
use crate::{
    impl_ndarray::read_npy_data,
    npy::{DType, Header},
    table::{columns_for, reshape_rows, write_csv, ShapeError},
    ReadNpyError, ReadableElement,
};
use std::{
    fmt, fs,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
    time::Instant,
};
use thiserror::Error;

/// Input path used when none is given.
pub const DEFAULT_INPUT: &str = "pointcloud.npy";
/// Output path used when none is given.
pub const DEFAULT_OUTPUT: &str = "pointcloud.csv";
/// Row count of the output table used when none is given.
pub const DEFAULT_ROWS: usize = 64;

/// Where to read from, where to write to, and how many rows the table has.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertConfig {
    /// The `.npy` file to read.
    pub input: PathBuf,
    /// The CSV file to create or overwrite.
    pub output: PathBuf,
    /// Number of rows in the output table; the column count follows from the
    /// element count.
    pub rows: usize,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            rows: DEFAULT_ROWS,
        }
    }
}

/// What a successful conversion did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Shape of the array in the `.npy` file.
    pub source_shape: Vec<usize>,
    /// Element type of the array.
    pub dtype: DType,
    /// Rows written.
    pub rows: usize,
    /// Values per row.
    pub columns: usize,
}

impl ConvertSummary {
    /// Total number of values written.
    pub fn value_count(&self) -> usize {
        self.rows * self.columns
    }
}

/// An error converting a `.npy` file to CSV.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// Input path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The input is not a readable `.npy` file.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Input path.
        path: PathBuf,
        /// Underlying error.
        source: ReadNpyError,
    },
    /// The element count can't be split into the requested rows.
    #[error("{} has shape {shape:?}: {source}", path.display())]
    Shape {
        /// Input path.
        path: PathBuf,
        /// Shape found in the header.
        shape: Vec<usize>,
        /// Underlying error.
        source: ShapeError,
    },
    /// The output file could not be created.
    #[error("failed to create {}: {source}", path.display())]
    Create {
        /// Output path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// Writing the table failed part way.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },
}

/// Converts `config.input` to `config.output`, printing the progress notices
/// to standard output.
pub fn convert(config: &ConvertConfig) -> Result<ConvertSummary, ConvertError> {
    convert_with_progress(config, io::stdout().lock())
}

/// Converts `config.input` to `config.output`, writing the progress notices
/// to `progress`.
///
/// Shape problems are detected from the header alone, before the output file
/// is opened, so a failed conversion leaves any existing output untouched.
/// A failure while writing the table may leave a truncated file behind.
pub fn convert_with_progress<P: io::Write>(
    config: &ConvertConfig,
    mut progress: P,
) -> Result<ConvertSummary, ConvertError> {
    let started = Instant::now();
    let input = config.input.as_path();
    let read_err = |source: ReadNpyError| ConvertError::Read { path: input.to_owned(), source };

    let file = fs::File::open(input)
        .map_err(|source| ConvertError::Open { path: input.to_owned(), source })?;
    let mut reader = BufReader::new(file);
    let header = Header::from_reader(&mut reader).map_err(|e| read_err(e.into()))?;
    log::debug!("{}: header {header}", input.display());

    let (dtype, _) = DType::from_descriptor(&header.type_descriptor)
        .ok_or_else(|| read_err(ReadNpyError::WrongDescriptor(header.type_descriptor.clone())))?;
    let len = header.element_count().ok_or_else(|| read_err(ReadNpyError::LengthOverflow))?;
    let columns = columns_for(len, config.rows).map_err(|source| ConvertError::Shape {
        path: input.to_owned(),
        shape: header.shape.clone(),
        source,
    })?;

    // A closed progress sink doesn't fail the conversion.
    let _ = writeln!(
        progress,
        "Converting {} to {}, lowering the data size from {} to {}*{}.",
        input.display(),
        config.output.display(),
        ShapeProduct(&header.shape),
        config.rows,
        columns,
    );

    let job = Job { header: &header, reader, input, output: &config.output, rows: config.rows };
    match dtype {
        DType::Bool => job.run::<bool>(),
        DType::I8 => job.run::<i8>(),
        DType::I16 => job.run::<i16>(),
        DType::I32 => job.run::<i32>(),
        DType::I64 => job.run::<i64>(),
        DType::U8 => job.run::<u8>(),
        DType::U16 => job.run::<u16>(),
        DType::U32 => job.run::<u32>(),
        DType::U64 => job.run::<u64>(),
        DType::F32 => job.run::<f32>(),
        DType::F64 => job.run::<f64>(),
    }?;

    let _ = writeln!(progress, "Converted and stored.");
    log::debug!(
        "{} -> {}: {dtype} {:?} as {}x{columns} in {:?}",
        input.display(),
        config.output.display(),
        header.shape,
        config.rows,
        started.elapsed(),
    );
    Ok(ConvertSummary { source_shape: header.shape, dtype, rows: config.rows, columns })
}

/// The part of a conversion that depends on the element type.
struct Job<'a, R> {
    header: &'a Header,
    reader: R,
    input: &'a Path,
    output: &'a Path,
    rows: usize,
}

impl<R: io::Read> Job<'_, R> {
    fn run<A>(self) -> Result<(), ConvertError>
    where
        A: ReadableElement + Clone + fmt::Display,
    {
        let array = read_npy_data::<A, _>(self.header, self.reader)
            .map_err(|source| ConvertError::Read { path: self.input.to_owned(), source })?;
        log::trace!("loaded {} elements", array.len());

        // Already validated against the header
        let table = reshape_rows(&array, self.rows).map_err(|source| ConvertError::Shape {
            path: self.input.to_owned(),
            shape: self.header.shape.clone(),
            source,
        })?;

        let file = fs::File::create(self.output)
            .map_err(|source| ConvertError::Create { path: self.output.to_owned(), source })?;
        write_csv(&table, BufWriter::new(file))
            .map_err(|source| ConvertError::Write { path: self.output.to_owned(), source })
    }
}

/// Formats a shape as `64*64*64`.
struct ShapeProduct<'a>(&'a [usize]);

impl fmt::Display for ShapeProduct<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut axes = self.0.iter();
        match axes.next() {
            Some(first) => write!(f, "{first}")?,
            None => return f.write_str("1"),
        }
        for axis in axes {
            write!(f, "*{axis}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_product_formatting() {
        assert_eq!(ShapeProduct(&[64, 64, 64]).to_string(), "64*64*64");
        assert_eq!(ShapeProduct(&[100]).to_string(), "100");
        assert_eq!(ShapeProduct(&[]).to_string(), "1");
    }

    #[test]
    fn default_config_uses_pointcloud_paths() {
        let config = ConvertConfig::default();
        assert_eq!(config.input, Path::new("pointcloud.npy"));
        assert_eq!(config.output, Path::new("pointcloud.csv"));
        assert_eq!(config.rows, 64);
    }
}
