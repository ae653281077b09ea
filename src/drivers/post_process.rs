//! Mission post-processing on in-memory cubes.
//!
//! Drivers that reshape their output (NEAR enlargement, Galileo summed-mode crop, MARCI framelet
//! flips) import into a [`MemoryCube`] first, transform it here, then copy it to the real output
//! with [`MemoryCube::write_to`].

use crate::constants::NULL8;
use crate::cube::{CubeSink, MemoryCube};
use crate::geometry::special_pixel::is_valid;
use crate::ingest_errors::IngestError;

/// A created cube shaped like `cube` with `samples` × `lines`, carrying its tables.
fn reshaped(cube: &MemoryCube, samples: usize, lines: usize) -> Result<MemoryCube, IngestError> {
    let mut out = MemoryCube::new();
    out.create(cube.path(), samples, lines, cube.bands(), cube.pixel_type())?;
    for table in cube.tables() {
        out.write_table(table.clone())?;
    }
    Ok(out)
}

/// Stretch `cube` to `lines` lines by nearest-line replication.
pub fn enlarge_lines(cube: &MemoryCube, lines: usize) -> Result<MemoryCube, IngestError> {
    let mut out = reshaped(cube, cube.samples(), lines)?;
    let ratio = cube.lines() as f64 / lines as f64;
    for band in 0..cube.bands() {
        for line in 0..lines {
            let source = (((line as f64 + 0.5) * ratio) as usize).min(cube.lines() - 1);
            out.line_mut(line, band).copy_from_slice(cube.line(source, band));
        }
    }
    Ok(out)
}

/// Upper-left `samples` × `lines` corner of `cube`.
pub fn crop_upper_left(
    cube: &MemoryCube,
    samples: usize,
    lines: usize,
) -> Result<MemoryCube, IngestError> {
    if samples > cube.samples() || lines > cube.lines() {
        return Err(IngestError::InvalidGeometry(format!(
            "cannot crop {samples}x{lines} out of {}x{}",
            cube.samples(),
            cube.lines()
        )));
    }
    let mut out = reshaped(cube, samples, lines)?;
    for band in 0..cube.bands() {
        for line in 0..lines {
            out.line_mut(line, band)
                .copy_from_slice(&cube.line(line, band)[..samples]);
        }
    }
    Ok(out)
}

/// Set every sample within `width` of an edge to NULL.
pub fn null_border(cube: &mut MemoryCube, width: usize) {
    let (samples, lines) = (cube.samples(), cube.lines());
    for band in 0..cube.bands() {
        for line in 0..lines {
            let buffer = cube.line_mut(line, band);
            if line < width || line + width >= lines {
                buffer.fill(NULL8);
            } else {
                let edge = width.min(samples);
                buffer[..edge].fill(NULL8);
                buffer[samples - edge..].fill(NULL8);
            }
        }
    }
}

/// Reverse the order of lines `start..start + count` of `band`.
pub fn flip_lines(cube: &mut MemoryCube, band: usize, start: usize, count: usize) {
    let (mut top, mut bottom) = (start, start + count);
    while top + 1 < bottom {
        bottom -= 1;
        let upper = cube.line(top, band).to_vec();
        let lower = cube.line(bottom, band).to_vec();
        cube.line_mut(top, band).copy_from_slice(&lower);
        cube.line_mut(bottom, band).copy_from_slice(&upper);
        top += 1;
    }
}

/// Pearson correlation of the sample pairs where both values are valid.
///
/// Return
/// ----------
/// * `None` when fewer than two pairs are valid or one side is constant.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter(|(x, y)| is_valid(**x) && is_valid(**y))
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a * var_b).sqrt())
}

#[cfg(test)]
mod test_post_process {
    use super::*;
    use crate::geometry::CubePixelType;
    use approx::assert_relative_eq;

    fn ramp(samples: usize, lines: usize) -> MemoryCube {
        let mut cube = MemoryCube::with_size(samples, lines, 1, CubePixelType::F32);
        for line in 0..lines {
            for sample in 0..samples {
                cube.set(sample, line, 0, (line * 100 + sample) as f64);
            }
        }
        cube
    }

    #[test]
    fn test_enlarge_lines() {
        let cube = ramp(2, 244);
        let big = enlarge_lines(&cube, 412).unwrap();
        assert_eq!(big.lines(), 412);
        assert_eq!(big.get(0, 0, 0), 0.0);
        assert_eq!(big.get(1, 411, 0), 24301.0);
        let sources: Vec<f64> = (0..412).map(|l| big.get(0, l, 0)).collect();
        assert!(sources.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_crop_and_border() {
        let cube = ramp(6, 6);
        let small = crop_upper_left(&cube, 3, 3).unwrap();
        assert_eq!(small.get(2, 2, 0), 202.0);
        assert!(crop_upper_left(&cube, 7, 1).is_err());

        let mut bordered = ramp(6, 6);
        null_border(&mut bordered, 2);
        assert_eq!(bordered.get(2, 2, 0), 202.0);
        assert_eq!(bordered.get(1, 3, 0).to_bits(), NULL8.to_bits());
        assert_eq!(bordered.get(3, 4, 0).to_bits(), NULL8.to_bits());
        assert_eq!(bordered.get(3, 3, 0), 303.0);
    }

    #[test]
    fn test_flip_lines() {
        let mut cube = ramp(1, 5);
        flip_lines(&mut cube, 0, 1, 3);
        let lines: Vec<f64> = (0..5).map(|l| cube.get(0, l, 0)).collect();
        assert_eq!(lines, vec![0.0, 300.0, 200.0, 100.0, 400.0]);
    }

    #[test]
    fn test_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(correlation(&a, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0);
        assert_relative_eq!(correlation(&a, &[8.0, 6.0, 4.0, 2.0]).unwrap(), -1.0);
        assert!(correlation(&a, &[NULL8, NULL8, NULL8, 1.0]).is_none());
        assert!(correlation(&a, &[5.0; 4]).is_none());
    }
}
