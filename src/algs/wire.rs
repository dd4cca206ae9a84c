//! Typed payload encoding for the communicator.
//!
//! Everything on the wire is a contiguous slice of a [`bytemuck::Pod`] type
//! (`f64`, `i32`, `u64`, [`Vector2D`](crate::geometry::Vector2D), ...). Receive
//! buffers are plain `Vec<u8>` with no alignment guarantee, so decoding copies.

use crate::mesh_error::FvError;
use bytemuck::Pod;
use std::mem::size_of;

/// View a typed slice as bytes for sending.
pub fn encode<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a received byte buffer into owned values.
pub fn decode<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, FvError> {
    let width = size_of::<T>();
    if width == 0 {
        return Ok(Vec::new());
    }
    if bytes.len() % width != 0 {
        return Err(FvError::Communication(format!(
            "payload of {} bytes is not a whole number of {}-byte elements",
            bytes.len(),
            width
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Decode exactly one value.
pub fn decode_one<T: Pod>(bytes: &[u8]) -> Result<T, FvError> {
    let mut v = decode::<T>(bytes)?;
    if v.len() != 1 {
        return Err(FvError::Communication(format!(
            "expected a single element, got {}",
            v.len()
        )));
    }
    Ok(v.remove(0))
}

/// Decode and check the element count.
pub fn decode_exact<T: Pod>(bytes: &[u8], expected: usize) -> Result<Vec<T>, FvError> {
    let v = decode::<T>(bytes)?;
    if v.len() != expected {
        return Err(FvError::Communication(format!(
            "expected {expected} elements, got {}",
            v.len()
        )));
    }
    Ok(v)
}
