//! Convert NumPy `.npy` arrays into comma-separated tables.
//!
//! The conversion loads an array, views it as a table with a fixed number of
//! rows (the column count follows from the element count), and writes one CSV
//! line per row with no header row and no index column. It is the Rust
//! counterpart of
//!
//! ```python
//! pd.DataFrame(np.load("pointcloud.npy").reshape(64, -1)).to_csv(
//!     "pointcloud.csv", index=False, header=False)
//! ```
//!
//! ## Converting
//!
//! - [`convert`] / [`convert_with_progress`] with a [`ConvertConfig`]
//! - [`reshape_rows`] and [`write_csv`] for in-memory arrays
//!
//! ## Operate .npy Files
//!
//! - Reading
//!   - [`ReadNpyExt`] extension trait
//!   - [`read_npy`] convenience function
//!   - [`read_npy_header`] to inspect shape and element type only
//! - Writing
//!   - [`WriteNpyExt`] extension trait
//!   - [`write_npy`] convenience function
//!
//! ## Limitations
//!
//! - Parsing of `.npy` files is limited to files where the `descr` field of
//!   the [header dictionary] is a plain Python string literal.
//!
//! - The element traits ([`WritableElement`] and [`ReadableElement`]) are
//!   implemented for fixed-size integers up to 64 bits, `f32`, `f64` and
//!   [`bool`].
//!
//! - Values are written with their [`Display`](std::fmt::Display)
//!   implementation: floats with an integral value have no trailing `.0`
//!   (`1.0` is written as `1`) and never use exponent notation.
//!
//! [header dictionary]: https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html#format-version-1-0
#![warn(missing_docs)]

mod convert;
mod impl_ndarray;
mod npy;
mod table;

pub use crate::{
    convert::{
        convert, convert_with_progress, ConvertConfig, ConvertError, ConvertSummary,
        DEFAULT_INPUT, DEFAULT_OUTPUT, DEFAULT_ROWS,
    },
    npy::{
        read_npy, read_npy_header, write_npy, DType, Endianness, FormatHeaderError, Header,
        ParseBoolError, ParseHeaderError, ReadDataError, ReadNpyError, ReadNpyExt,
        ReadableElement, WritableElement, WriteDataError, WriteNpyError, WriteNpyExt,
    },
    table::{columns_for, reshape_rows, write_csv, ShapeError},
};
