//! Raw sample decoding.
//!
//! Raw bytes are turned into `f64` samples, honouring the stream byte order. 32-bit float
//! samples that carry a float sentinel pattern decode to the matching internal sentinel, and
//! 64-bit float sentinels are the internal sentinels already.

use crate::geometry::special_pixel::SpecialPixel;
use crate::geometry::{ByteOrder, PixelType};

macro_rules! decode_into {
    ($raw:expr, $out:expr, $order:expr, $ty:ty, $n:literal, $map:expr) => {
        for (chunk, slot) in $raw.chunks_exact($n).zip($out.iter_mut()) {
            let mut bytes = [0u8; $n];
            bytes.copy_from_slice(chunk);
            let value = match $order {
                ByteOrder::Lsb => <$ty>::from_le_bytes(bytes),
                ByteOrder::Msb => <$ty>::from_be_bytes(bytes),
            };
            *slot = $map(value);
        }
    };
}

/// Decode `out.len()` samples of `pixel_type` from `raw`.
///
/// `raw` must hold at least `out.len() · pixel_type.bytes()` bytes; extra bytes are ignored.
pub fn decode_samples(raw: &[u8], pixel_type: PixelType, order: ByteOrder, out: &mut [f64]) {
    match pixel_type {
        PixelType::U8 => {
            for (b, slot) in raw.iter().zip(out.iter_mut()) {
                *slot = f64::from(*b);
            }
        }
        PixelType::S8 => {
            for (b, slot) in raw.iter().zip(out.iter_mut()) {
                *slot = f64::from(*b as i8);
            }
        }
        PixelType::U16 => decode_into!(raw, out, order, u16, 2, f64::from),
        PixelType::S16 => decode_into!(raw, out, order, i16, 2, f64::from),
        PixelType::U32 => decode_into!(raw, out, order, u32, 4, f64::from),
        PixelType::S32 => decode_into!(raw, out, order, i32, 4, f64::from),
        PixelType::F32 => decode_into!(raw, out, order, u32, 4, decode_f32_bits),
        PixelType::F64 => decode_into!(raw, out, order, f64, 8, |v: f64| v),
    }
}

#[inline]
fn decode_f32_bits(bits: u32) -> f64 {
    match SpecialPixel::of_f32_bits(bits) {
        Some(special) => special.value(),
        None => f64::from(f32::from_bits(bits)),
    }
}

/// Decode one big- or little-endian integer of 1, 2 or 4 bytes.
pub fn decode_u32(raw: &[u8], order: ByteOrder) -> u32 {
    let fold = |acc: u32, b: &u8| (acc << 8) | u32::from(*b);
    match order {
        ByteOrder::Msb => raw.iter().fold(0, fold),
        ByteOrder::Lsb => raw.iter().rev().fold(0, fold),
    }
}
