//! Reshaping arrays into fixed-row tables and writing them as CSV.
use ndarray::{prelude::*, Order};
use std::{fmt, io};
use thiserror::Error;

/// An error partitioning an array into a fixed number of rows.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// The requested row count is zero.
    #[error("cannot reshape into 0 rows")]
    ZeroRows,
    /// The array has no elements, so every row would be empty.
    #[error("cannot reshape an empty array into {rows} rows")]
    Empty {
        /// Requested row count.
        rows: usize,
    },
    /// The element count isn't a multiple of the row count.
    #[error("cannot reshape array of size {len} into shape ({rows}, -1)")]
    NotDivisible {
        /// Total number of elements.
        len: usize,
        /// Requested row count.
        rows: usize,
    },
}

/// Computes the column count for a table of `rows` rows holding `len`
/// elements.
pub fn columns_for(len: usize, rows: usize) -> Result<usize, ShapeError> {
    if rows == 0 {
        return Err(ShapeError::ZeroRows);
    }
    if len == 0 {
        return Err(ShapeError::Empty { rows });
    }
    if len % rows != 0 {
        return Err(ShapeError::NotDivisible { len, rows });
    }
    Ok(len / rows)
}

/// Views `array` as a `rows × (len / rows)` table, taking elements in
/// logical row-major order like `numpy.reshape(rows, -1)`.
///
/// Borrows when the array is already C-contiguous and copies otherwise.
pub fn reshape_rows<A, S, D>(
    array: &ArrayBase<S, D>,
    rows: usize,
) -> Result<CowArray<'_, A, Ix2>, ShapeError>
where
    A: Clone,
    S: ndarray::Data<Elem = A>,
    D: Dimension,
{
    let len = array.len();
    let columns = columns_for(len, rows)?;
    array
        .to_shape(((rows, columns), Order::RowMajor))
        .map_err(|_| ShapeError::NotDivisible { len, rows })
}

/// Line terminator of the platform: `\r\n` on Windows and `\n` elsewhere.
fn platform_terminator() -> csv::Terminator {
    if cfg!(windows) {
        csv::Terminator::CRLF
    } else {
        csv::Terminator::Any(b'\n')
    }
}

/// Writes `table` to `writer` as comma-separated text, one line per row,
/// without a header row or index column.
///
/// Values are rendered with their [`Display`](fmt::Display) implementation.
pub fn write_csv<A, S, W>(table: &ArrayBase<S, Ix2>, writer: W) -> Result<(), csv::Error>
where
    A: fmt::Display,
    S: ndarray::Data<Elem = A>,
    W: io::Write,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(platform_terminator())
        .from_writer(writer);
    for row in table.rows() {
        wtr.write_record(row.iter().map(ToString::to_string))?;
    }
    wtr.flush()?;
    Ok(())
}
