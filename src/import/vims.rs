//! Cassini VIMS qubes with sideplanes.
//!
//! VIMS EDR qubes are band-interleaved-by-line with suffix planes: after the core of every band
//! line comes one sideplane of `SUFFIX_ITEMS[0]` 4-byte items, and every line record ends with
//! `SUFFIX_ITEMS[1]` backplanes. The first sideplane item holds the background level of that
//! line, kept as the `SideplaneVis` / `SideplaneIr` tables.

use std::io::Read;

use super::sample_codec::{decode_samples, decode_u32};
use super::{ByteCursor, CancelToken, SampleMapper};
use crate::constants::HIS8;
use crate::cube::CubeSink;
use crate::geometry::special_pixel::is_valid;
use crate::geometry::GeometryDescriptor;
use crate::ingest_errors::IngestError;
use crate::label::Keyword;
use crate::table::{Field, FieldType, FieldValue, Table};

/// Bytes of one suffix item.
const SUFFIX_ITEM_BYTES: usize = 4;

/// Bands below this index belong to the visible channel.
pub const VIS_BANDS: usize = 96;

/// Instrument DN at which the detector saturates.
const SATURATION_DN: f64 = 4095.0;

fn sideplane_table(name: &str) -> Table {
    Table::new(
        name,
        vec![
            Field::new("Line", FieldType::Integer),
            Field::new("Band", FieldType::Integer),
            Field::new("Value", FieldType::Integer),
        ],
    )
    .with_keyword(Keyword::new("Association", "Lines"))
}

/// Read the BIL core of a VIMS qube, collecting sideplanes and skipping backplanes.
///
/// Valid samples at or above 4095 become HIS; for IR bands the sideplane value is added first.
///
/// Return
/// ----------
/// * `[SideplaneVis, SideplaneIr]`, with 1-based line and band numbers (IR bands numbered from 1).
pub(crate) fn read_vims_bil<R: Read, S: CubeSink + ?Sized>(
    geometry: &GeometryDescriptor,
    sideplane_items: usize,
    backplane_items: usize,
    cursor: &mut ByteCursor<R>,
    sink: &mut S,
    cancel: &CancelToken,
) -> Result<Vec<Table>, IngestError> {
    let (samples, lines, bands) = (geometry.samples(), geometry.lines(), geometry.bands());
    let mut raw = vec![0u8; geometry.pixel_line_bytes() as usize];
    let mut line_buf = vec![0.0; samples];
    let mut sideplane = vec![0u8; sideplane_items * SUFFIX_ITEM_BYTES];
    let backplanes = (backplane_items * SUFFIX_ITEM_BYTES * (samples + sideplane_items)) as u64;
    let mappers: Vec<SampleMapper> = (0..bands).map(|b| SampleMapper::new(geometry, b)).collect();

    let mut vis = sideplane_table("SideplaneVis");
    let mut ir = sideplane_table("SideplaneIr");

    for line in 0..lines {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled { band: 0, line });
        }
        for (band, mapper) in mappers.iter().enumerate() {
            cursor.read_exact(&mut raw)?;
            decode_samples(&raw, geometry.pixel_type(), geometry.byte_order(), &mut line_buf);
            mapper.map_line(&mut line_buf);

            if sideplane_items > 0 {
                cursor.read_exact(&mut sideplane)?;
                let value = decode_u32(&sideplane[..SUFFIX_ITEM_BYTES], geometry.byte_order()) as i32;
                let (table, band_number, offset) = if band < VIS_BANDS {
                    (&mut vis, band + 1, 0.0)
                } else {
                    (&mut ir, band + 1 - VIS_BANDS, f64::from(value))
                };
                table.push(vec![
                    FieldValue::Integer(line as i64 + 1),
                    FieldValue::Integer(band_number as i64),
                    FieldValue::Integer(i64::from(value)),
                ]);
                for v in line_buf.iter_mut().filter(|v| is_valid(**v)) {
                    if *v + offset >= SATURATION_DN {
                        *v = HIS8;
                    }
                }
            }
            sink.write_line(&line_buf, line, band)?;
        }
        cursor.take(backplanes, false)?;
    }
    Ok(vec![vis, ir])
}

#[cfg(test)]
mod test_vims {
    use super::*;
    use crate::cube::MemoryCube;
    use crate::geometry::{ByteOrder, CubePixelType, Organization, PixelType};
    use crate::import::{LayoutPolicy, PixelImporter};

    #[test]
    fn test_sideplanes_and_saturation() {
        // 2 samples, 1 line, 98 bands: bands 0..96 are VIS, 96 and 97 are IR.
        let bands = 98;
        let g = GeometryDescriptor::builder()
            .dimensions(2, 1, bands)
            .organization(Organization::Bil)
            .pixel_type(PixelType::S16)
            .byte_order(ByteOrder::Msb)
            .data_suffix_bytes(4)
            .data_trailer_bytes(4 * (2 + 1))
            .build()
            .unwrap();
        let mut stream = Vec::new();
        for band in 0..bands {
            let pixel: i16 = if band == 0 { 4095 } else { 4000 };
            stream.extend_from_slice(&pixel.to_be_bytes());
            stream.extend_from_slice(&100i16.to_be_bytes());
            stream.extend_from_slice(&(band as i32 * 10).to_be_bytes());
        }
        stream.extend_from_slice(&[0u8; 12]);

        let mut cube = MemoryCube::with_size(2, 1, bands, CubePixelType::F32);
        let summary = PixelImporter::new(
            &g,
            LayoutPolicy::VimsBilWithSideplanes {
                sideplane_items: 1,
                backplane_items: 1,
            },
        )
        .import(stream.as_slice(), &mut cube)
        .unwrap();
        assert_eq!(summary.bytes_consumed, stream.len() as u64);
        assert_eq!(summary.bytes_consumed, g.expected_bytes());

        // VIS band 0 saturates on its own value.
        assert_eq!(cube.get(0, 0, 0).to_bits(), HIS8.to_bits());
        assert_eq!(cube.get(0, 0, 1), 4000.0);
        // IR band 97 has sideplane 970: 4000 + 970 >= 4095.
        assert_eq!(cube.get(0, 0, 97).to_bits(), HIS8.to_bits());
        assert_eq!(cube.get(1, 0, 97), 100.0);

        let (vis, ir) = (&summary.tables[0], &summary.tables[1]);
        assert_eq!(vis.name, "SideplaneVis");
        assert_eq!(vis.len(), 96);
        assert_eq!(ir.len(), 2);
        assert_eq!(
            ir.records[1],
            vec![FieldValue::Integer(1), FieldValue::Integer(2), FieldValue::Integer(970)]
        );
    }
}
