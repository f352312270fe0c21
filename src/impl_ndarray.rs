use crate::{
    npy::Header, ReadNpyError, ReadNpyExt, ReadableElement, WritableElement, WriteNpyError,
    WriteNpyExt,
};
use ndarray::{prelude::*, Data, DataOwned, IntoDimension as _};
use std::{io, mem};

impl<A, S, D> WriteNpyExt for ArrayBase<S, D>
where
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    fn write_npy<W: io::Write>(&self, mut writer: W) -> Result<(), WriteNpyError> {
        let header = |fortran_order| Header {
            type_descriptor: A::type_descriptor(),
            fortran_order,
            shape: self.shape().to_owned(),
        };
        match self.as_slice_memory_order() {
            Some(data) if self.is_standard_layout() || self.t().is_standard_layout() => {
                header(!self.is_standard_layout()).write(&mut writer)?;
                A::write_slice(data, &mut writer)?;
            }
            _ => {
                header(false).write(&mut writer)?;
                for elem in self.iter() {
                    elem.write(&mut writer)?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}

impl<A, S, D> ReadNpyExt for ArrayBase<S, D>
where
    A: ReadableElement + Clone,
    S: DataOwned<Elem = A>,
    D: Dimension,
{
    fn read_npy<R: io::Read>(mut reader: R) -> Result<Self, ReadNpyError> {
        let header = Header::from_reader(&mut reader)?;
        let ndim = header.shape.len();
        let array = read_npy_data::<A, _>(&header, reader)?;
        ArrayBase::from_shape_vec(array.raw_dim(), array.into_raw_vec_and_offset().0)
            .map_err(|_| ReadNpyError::LengthOverflow)?
            .into_dimensionality()
            .map_err(|_| ReadNpyError::WrongNdim(D::NDIM, ndim))
    }
}

/// Reads the element data following an already-parsed `header` into an array
/// of dynamic dimension.
///
/// The returned array is always in standard (C) layout, so the logical
/// element order is the order of its backing `Vec`, regardless of the
/// `fortran_order` flag in the file.
pub(crate) fn read_npy_data<A, R>(header: &Header, reader: R) -> Result<ArrayD<A>, ReadNpyError>
where
    A: ReadableElement + Clone,
    R: io::Read,
{
    let shape = header.shape.clone().into_dimension();
    let len = shape_length_checked::<A>(&shape).ok_or(ReadNpyError::LengthOverflow)?;
    let data = A::read_to_end_exact_vec(reader, &header.type_descriptor, len)?;
    let array = ArrayD::from_shape_vec(shape.set_f(header.fortran_order), data)
        .map_err(|_| ReadNpyError::LengthOverflow)?;
    if array.is_standard_layout() {
        Ok(array)
    } else {
        Ok(array.as_standard_layout().into_owned())
    }
}

/// Computes the length associated with the shape (i.e. the product of the axis
/// lengths), where the element type is `A`.
///
/// Returns `None` if the number of elements or the length in bytes would
/// overflow `isize`.
fn shape_length_checked<A>(shape: &IxDyn) -> Option<usize> {
    const MAX: usize = isize::MAX as usize;
    let len = shape.size_checked()?;
    (len.checked_mul(mem::size_of::<A>())? < MAX).then_some(len)
}
