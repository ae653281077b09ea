mod common;

use common::{attached_product, default_ingest, group, ingest_memory, pointer, temp_dir};

use pds2cube::cube::CubeInfo;
use pds2cube::geometry::CubePixelType;
use pds2cube::table::FieldValue;

fn image_label(lines: usize, samples: usize) -> String {
    format!(
        "PDS_VERSION_ID = PDS3\n\
RECORD_TYPE = UNDEFINED\n\
{}\n\
SPACECRAFT_NAME = MARS_GLOBAL_SURVEYOR\n\
TARGET_NAME = MARS\n\
OBJECT = IMAGE\n\
  LINES = {lines}\n\
  LINE_SAMPLES = {samples}\n\
  SAMPLE_TYPE = UNSIGNED_INTEGER\n\
  SAMPLE_BITS = 8\n\
END_OBJECT = IMAGE\n\
END\n",
        pointer("IMAGE")
    )
}

#[test]
fn test_same_input_gives_identical_cubes() {
    let (_guard, dir) = temp_dir();
    let data: Vec<u8> = (0..12).collect();
    let from = attached_product(&dir, "frame.img", &image_label(4, 3), &data);

    let ingest = default_ingest();
    let first = dir.join("first.cub");
    let second = dir.join("second.cub");
    let report = ingest.run(&from, &first).unwrap();
    ingest.run(&from, &second).unwrap();

    assert_eq!(report.driver, "pds");
    assert_eq!(report.outputs, vec![first.clone()]);
    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());

    let info = CubeInfo::open(&first).unwrap();
    assert_eq!((info.samples, info.lines, info.bands), (3, 4, 1));
    assert_eq!(info.pixel_type, CubePixelType::U8);
    assert_eq!(info.read_line(2, 0).unwrap(), vec![6.0, 7.0, 8.0]);
}

#[test]
fn test_single_pixel_product() {
    let (_guard, dir) = temp_dir();
    let from = attached_product(&dir, "dot.img", &image_label(1, 1), &[7]);

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    let cube = outputs.primary().unwrap();
    assert_eq!(report.driver, "pds");
    assert_eq!((cube.samples(), cube.lines(), cube.bands()), (1, 1, 1));
    assert_eq!(cube.get(0, 0, 0), 7.0);
    assert_eq!(
        group(cube, "Instrument").keyword("TargetName").unwrap().as_str().unwrap(),
        "MARS"
    );
}

#[test]
fn test_detached_relative_pointer() {
    let (_guard, dir) = temp_dir();
    let label = "PDS_VERSION_ID = PDS3\n\
^IMAGE = \"frame.img\"\n\
OBJECT = IMAGE\n\
  LINES = 2\n\
  LINE_SAMPLES = 2\n\
  SAMPLE_TYPE = UNSIGNED_INTEGER\n\
  SAMPLE_BITS = 8\n\
END_OBJECT = IMAGE\n\
END\n";
    let from = dir.join("frame.lbl");
    std::fs::write(&from, label).unwrap();
    std::fs::write(dir.join("frame.img"), [1u8, 2, 3, 4]).unwrap();

    let (_, outputs) = ingest_memory(&default_ingest(), &from);
    let cube = outputs.primary().unwrap();
    assert_eq!(cube.line(0, 0), &[1.0, 2.0]);
    assert_eq!(cube.line(1, 0), &[3.0, 4.0]);
}

#[test]
fn test_truncated_pixels_leave_no_output() {
    let (_guard, dir) = temp_dir();
    let from = attached_product(&dir, "short.img", &image_label(4, 4), &[1; 10]);
    let to = dir.join("short.cub");

    let err = default_ingest().run(&from, &to).unwrap_err();
    assert_eq!(err.kind(), "TruncatedPixelStream");
    assert!(!to.exists());
}

#[test]
fn test_bad_table_becomes_a_diagnostic() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
{}\n\
^SCLK_TABLE = \"sclk.dat\"\n\
^HK_TABLE = \"hk.tab\"\n\
OBJECT = IMAGE\n\
  LINES = 1\n\
  LINE_SAMPLES = 2\n\
  SAMPLE_TYPE = UNSIGNED_INTEGER\n\
  SAMPLE_BITS = 8\n\
END_OBJECT = IMAGE\n\
OBJECT = SCLK_TABLE\n\
  INTERCHANGE_FORMAT = BINARY\n\
  ROWS = 2\n\
  ROW_BYTES = 4\n\
  OBJECT = COLUMN\n\
    NAME = SCLK_COUNT\n\
    DATA_TYPE = LSB_INTEGER\n\
    START_BYTE = 1\n\
    BYTES = 4\n\
  END_OBJECT = COLUMN\n\
END_OBJECT = SCLK_TABLE\n\
OBJECT = HK_TABLE\n\
  INTERCHANGE_FORMAT = ASCII\n\
  ROWS = 2\n\
  ROW_BYTES = 6\n\
  OBJECT = COLUMN\n\
    NAME = COUNT\n\
    DATA_TYPE = ASCII_INTEGER\n\
    START_BYTE = 1\n\
    BYTES = 4\n\
  END_OBJECT = COLUMN\n\
END_OBJECT = HK_TABLE\n\
END\n",
        pointer("IMAGE")
    );
    let from = attached_product(&dir, "tables.img", &label, &[5, 6]);
    std::fs::write(dir.join("sclk.dat"), 1i32.to_le_bytes()).unwrap();
    std::fs::write(dir.join("hk.tab"), "  11\r\n  12\r\n").unwrap();

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].pointer, "^SCLK_TABLE");

    let cube = outputs.primary().unwrap();
    let hk = cube.table("HkTable").unwrap();
    assert_eq!(hk.records[1][0], FieldValue::Integer(12));
    assert!(cube.table("SclkTable").is_none());

    let skipped = group(cube, "Diagnostics").keyword("SkippedTable").unwrap();
    assert_eq!(skipped.get_str(0).unwrap(), "^SCLK_TABLE");
    assert_eq!(skipped.get_str(1).unwrap(), "BadTable");
    assert_eq!(cube.line(0, 0), &[5.0, 6.0]);
}
