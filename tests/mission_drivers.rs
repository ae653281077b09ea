mod common;

use approx::assert_relative_eq;

use common::{
    attached_bytes, attached_product, default_ingest, group, ingest_memory, number, pointer,
    temp_dir, text, FakeSpice, FixedDecompressor,
};
use pds2cube::config::{FlipMode, IngestConfigBuilder};
use pds2cube::constants::{HIS8, NULL8};
use pds2cube::drivers::{MemoryOutputs, OutputRole, OutputSet};
use pds2cube::geometry::{CubePixelType, DnRemap};
use pds2cube::ingest::Ingest;
use pds2cube::spice::utc_to_et;
use pds2cube::table::FieldValue;

fn sqroot(raw: u8) -> f64 {
    DnRemap::sqrt_inverse(4095.0).apply(f64::from(raw))
}

#[test]
fn test_ctx_summed_edr() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
         RECORD_BYTES = 24\n\
         {}\n\
         DATA_SET_ID = \"MRO-M-CTX-2-EDR-L0-V1.0\"\n\
         PRODUCT_ID = \"P01_001234_1234_XI_12N123W\"\n\
         SPACECRAFT_NAME = MARS_RECONNAISSANCE_ORBITER\n\
         INSTRUMENT_ID = CTX\n\
         TARGET_NAME = MARS\n\
         START_TIME = 2006-11-14T12:00:00.000\n\
         SPACECRAFT_CLOCK_START_COUNT = \"0847022876:071\"\n\
         SAMPLE_BIT_MODE_ID = SQROOT\n\
         SPATIAL_SUMMING = 2\n\
         EDIT_MODE_ID = 0\n\
         OBJECT = IMAGE\n\
           LINES = 3\n\
           LINE_SAMPLES = 24\n\
           SAMPLE_TYPE = UNSIGNED_INTEGER\n\
           SAMPLE_BITS = 8\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE")
    );
    // 7 prefix dark pixels, 7 image pixels, 9 suffix dark pixels and one pad byte per line
    let mut data = Vec::new();
    for line in 0..3u8 {
        data.extend(std::iter::repeat(5 + line).take(7));
        data.extend((0..7u8).map(|s| 100 + 10 * s + line));
        data.extend(std::iter::repeat(200).take(9));
        data.push(0);
    }
    let from = attached_product(&dir, "ctx.img", &label, &data);

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.driver, "ctx");
    assert!(report.diagnostics.is_empty());

    let cube = outputs.primary().unwrap();
    assert_eq!((cube.samples(), cube.lines(), cube.bands()), (7, 3, 1));
    assert_eq!(cube.pixel_type(), CubePixelType::S16);
    for line in 0..3 {
        for sample in 0..7 {
            let raw = 100 + 10 * sample as u8 + line as u8;
            assert_eq!(cube.get(sample, line, 0), sqroot(raw));
        }
    }

    assert_eq!(number(cube, "Instrument", "SpatialSumming"), 2.0);
    assert_eq!(number(cube, "Instrument", "SampleFirstPixel"), 0.0);
    assert_eq!(text(cube, "Instrument", "SampleBitModeId"), "SQROOT");
    assert_eq!(text(cube, "Archive", "DataSetId"), "MRO-M-CTX-2-EDR-L0-V1.0");
    assert_eq!(text(cube, "BandBin", "FilterName"), "BroadBand");
    assert_relative_eq!(number(cube, "BandBin", "Center"), 0.650);
    assert_eq!(group(cube, "BandBin").keyword("Center").unwrap().units(0), Some("micrometers"));
    assert_relative_eq!(number(cube, "BandBin", "Width"), 0.150);
    assert_eq!(number(cube, "Kernels", "NaifFrameCode"), -74021.0);

    let prefix = cube.table("CtxPrefixDark").unwrap();
    assert_eq!(prefix.len(), 3);
    assert_eq!(prefix.fields[0].size, 7);
    assert_eq!(
        prefix.records[2][0],
        FieldValue::Integers(vec![sqroot(7) as i64; 7])
    );
    let suffix = cube.table("CtxSuffixDark").unwrap();
    assert_eq!(suffix.fields[0].size, 9);
    assert_eq!(suffix.records[0][0], FieldValue::Integers(vec![sqroot(200) as i64; 9]));
    assert!(cube.original_label().is_some());
}

#[test]
fn test_ctx_rejects_other_bit_modes() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
         {}\n\
         DATA_SET_ID = \"MRO-M-CTX-2-EDR-L0-V1.0\"\n\
         SPACECRAFT_NAME = MARS_RECONNAISSANCE_ORBITER\n\
         INSTRUMENT_ID = CTX\n\
         START_TIME = 2006-11-14T12:00:00.000\n\
         SPACECRAFT_CLOCK_START_COUNT = \"0847022876:071\"\n\
         SAMPLE_BIT_MODE_ID = LIN\n\
         OBJECT = IMAGE\n\
           LINES = 1\n\
           LINE_SAMPLES = 40\n\
           SAMPLE_BITS = 8\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE")
    );
    let from = attached_product(&dir, "lin.img", &label, &[0; 40]);
    let mut outputs = MemoryOutputs::new("lin.cub");
    let err = default_ingest().run_into(&from, &mut outputs).unwrap_err();
    assert_eq!(err.kind(), "UnsupportedProduct");
    assert!(outputs.primary().is_none());
}

const HIRISE_FLAGS: &str = "(0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13)";

#[test]
fn test_hirise_rdr_equirectangular() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
         RECORD_BYTES = 3\n\
         {}\n\
         DATA_SET_ID = \"MRO-M-HIRISE-3-RDR-V1.1\"\n\
         PRODUCT_ID = PSP_001414_1780_RED_A_01_ORTHO\n\
         INSTRUMENT_HOST_NAME = \"MARS RECONNAISSANCE ORBITER\"\n\
         INSTRUMENT_ID = HIRISE\n\
         OBSERVATION_ID = PSP_001414_1780\n\
         TARGET_NAME = MARS\n\
         GROUP = INSTRUMENT_SETTING_PARAMETERS\n\
           MRO:SPECIAL_PROCESSING_FLAG = {HIRISE_FLAGS}\n\
           MRO:BINNING = {HIRISE_FLAGS}\n\
           MRO:TDI = {HIRISE_FLAGS}\n\
         END_GROUP = INSTRUMENT_SETTING_PARAMETERS\n\
         OBJECT = IMAGE_MAP_PROJECTION\n\
           MAP_PROJECTION_TYPE = EQUIRECTANGULAR\n\
           A_AXIS_RADIUS = 3390.0 <KM>\n\
           C_AXIS_RADIUS = 3390.0 <KM>\n\
           COORDINATE_SYSTEM_NAME = PLANETOCENTRIC\n\
           POSITIVE_LONGITUDE_DIRECTION = EAST\n\
           MAXIMUM_LATITUDE = -4.9 <DEG>\n\
           MINIMUM_LATITUDE = -5.1 <DEG>\n\
           EASTERNMOST_LONGITUDE = 137.6 <DEG>\n\
           WESTERNMOST_LONGITUDE = 137.4 <DEG>\n\
           MAP_SCALE = 0.25 <METERS/PIXEL>\n\
           MAP_RESOLUTION = 237068.0 <PIXEL/DEGREE>\n\
           MAP_PROJECTION_ROTATION = 0.0\n\
           LINE_PROJECTION_OFFSET = -1185340.0 <PIXEL>\n\
           SAMPLE_PROJECTION_OFFSET = 32603000.0 <PIXEL>\n\
           CENTER_LATITUDE = 0.0 <DEG>\n\
           CENTER_LONGITUDE = 180.0 <DEG>\n\
         END_OBJECT = IMAGE_MAP_PROJECTION\n\
         OBJECT = IMAGE\n\
           LINES = 2\n\
           LINE_SAMPLES = 3\n\
           SAMPLE_TYPE = MSB_UNSIGNED_INTEGER\n\
           SAMPLE_BITS = 8\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE")
    );
    let from = attached_product(&dir, "rdr.img", &label, &[10, 20, 30, 40, 50, 60]);

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.driver, "hirise_rdr");
    let cube = outputs.primary().unwrap();
    assert_eq!((cube.samples(), cube.lines()), (3, 2));
    assert_eq!(cube.get(2, 1, 0), 60.0);

    let permuted = ["0", "1", "2", "3", "5", "8", "10", "11", "12", "13", "6", "7", "4", "9"];
    let mosaic = group(cube, "Mosaic");
    for name in ["SpecialProcessingFlag", "cpmmSummingFlag", "cpmmTdiFlag"] {
        let values: Vec<&str> = mosaic.keyword(name).unwrap().texts().collect();
        assert_eq!(values, permuted, "{name}");
    }

    assert_eq!(text(cube, "Mapping", "ProjectionName"), "Equirectangular");
    assert_relative_eq!(number(cube, "Mapping", "EquatorialRadius"), 3396190.0);
    assert_relative_eq!(number(cube, "Mapping", "PolarRadius"), 3376200.0);
    assert_relative_eq!(number(cube, "Mapping", "CenterLatitudeRadius"), 3390000.0);
    assert_relative_eq!(number(cube, "Mapping", "PixelResolution"), 0.25);
    assert_eq!(text(cube, "Instrument", "InstrumentId"), "HIRISE");
}

fn galileo_label(frame_duration: f64) -> String {
    format!(
        "PDS_VERSION_ID = PDS3\n\
         RECORD_BYTES = 4\n\
         {}\n\
         DATA_SET_ID = \"GO-J-SSI-2-REDR-V1.0\"\n\
         SPACECRAFT_NAME = GALILEO_ORBITER\n\
         INSTRUMENT_ID = SSI\n\
         TARGET_NAME = EUROPA\n\
         IMAGE_TIME = 1996-12-19T06:52:57.000Z\n\
         FRAME_DURATION = {frame_duration} <SECONDS>\n\
         FILTER_NAME = CLEAR\n\
         /* Image Object /\n\
         OBJECT = IMAGE\n\
           LINES = 4\n\
           LINE_SAMPLES = 4\n\
           SAMPLE_BITS = 8\n\
           SAMPLE_TYPE = UNSIGNED_INTEGER\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE")
    )
}

fn galileo_pixels() -> Vec<u8> {
    (0..16u8).map(|i| 10 + i).collect()
}

#[test]
fn test_galileo_ssi_summed_frame() {
    let (_guard, dir) = temp_dir();
    let from = attached_product(&dir, "summed.img", &galileo_label(2.333), &galileo_pixels());

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.driver, "galileo_ssi");
    let cube = outputs.primary().unwrap();
    assert_eq!((cube.samples(), cube.lines()), (2, 2));
    assert_eq!(cube.line(0, 0), &[10.0, 11.0]);
    assert_eq!(cube.line(1, 0), &[14.0, 15.0]);
    assert_eq!(text(cube, "Instrument", "Summing"), "2");
    assert_relative_eq!(number(cube, "BandBin", "Center"), 0.611);
    assert_relative_eq!(number(cube, "BandBin", "Width"), 0.44);
    assert_eq!(group(cube, "BandBin").keyword("Width").unwrap().units(0), Some("micrometers"));
    assert_eq!(number(cube, "Kernels", "NaifFrameCode"), -77001.0);
}

#[test]
fn test_galileo_ssi_full_frame() {
    let (_guard, dir) = temp_dir();
    let from = attached_product(&dir, "full.img", &galileo_label(8.667), &galileo_pixels());

    let (_, outputs) = ingest_memory(&default_ingest(), &from);
    let cube = outputs.primary().unwrap();
    assert_eq!((cube.samples(), cube.lines()), (4, 4));
    assert_eq!(cube.get(3, 3, 0), 25.0);
    assert_eq!(text(cube, "Instrument", "Summing"), "1");
}

const MARCI_FILTERS: [&str; 5] = ["BLUE", "GREEN", "ORANGE", "RED", "NIR"];

#[test]
fn test_marci_even_odd_split() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
         RECORD_BYTES = 4\n\
         {}\n\
         SPACECRAFT_NAME = MARS_RECONNAISSANCE_ORBITER\n\
         INSTRUMENT_ID = MARCI\n\
         TARGET_NAME = MARS\n\
         START_TIME = 2008-01-01T00:00:00.000\n\
         SAMPLING_FACTOR = 2\n\
         FILTER_NAME = ({})\n\
         OBJECT = IMAGE\n\
           LINES = 80\n\
           LINE_SAMPLES = 4\n\
           SAMPLE_BITS = 8\n\
           SAMPLE_TYPE = UNSIGNED_INTEGER\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE"),
        MARCI_FILTERS.join(", ")
    );
    // Two framelets of five 8-line filter strips. The last line of framelet 0 matches the first
    // line of framelet 1, so the framelets are not flipped.
    let mut lines: Vec<[u8; 4]> = (0..80u8).map(|l| [50 + l; 4]).collect();
    lines[7] = [10, 50, 20, 90];
    lines[40] = [10, 50, 20, 90];
    lines[47] = [90, 20, 50, 10];
    let data: Vec<u8> = lines.concat();
    let from = attached_product(&dir, "marci.img", &label, &data);

    let config = IngestConfigBuilder::new().flip(FlipMode::Auto).build().unwrap();
    let (report, outputs) = ingest_memory(&Ingest::new(config), &from);
    assert_eq!(report.driver, "marci");
    assert_eq!(outputs.roles(), vec![OutputRole::Even, OutputRole::Odd]);

    let even = outputs.get(OutputRole::Even).unwrap();
    let odd = outputs.get(OutputRole::Odd).unwrap();
    assert_eq!((even.samples(), even.lines(), even.bands()), (4, 16, 5));
    assert_eq!((odd.samples(), odd.lines(), odd.bands()), (4, 16, 5));

    for filter in 0..5 {
        for row in 0..8 {
            let raw_even = &lines[filter * 8 + row];
            let raw_odd = &lines[(5 + filter) * 8 + row];
            assert_eq!(even.get(1, row, filter), sqroot(raw_even[1]));
            assert_eq!(odd.get(1, 8 + row, filter), sqroot(raw_odd[1]));
            assert_eq!(even.get(1, 8 + row, filter), NULL8);
            assert_eq!(odd.get(1, row, filter), NULL8);
        }
    }

    assert_eq!(text(even, "Instrument", "Framelets"), "Even");
    assert_eq!(text(odd, "Instrument", "Framelets"), "Odd");
    assert_eq!(text(odd, "Instrument", "DataFlipped"), "No");
    let filters: Vec<&str> = group(even, "BandBin").keyword("FilterName").unwrap().texts().collect();
    assert_eq!(filters, MARCI_FILTERS);
    assert_eq!(number(even, "Kernels", "NaifIkCode"), -74410.0);
    assert_eq!(number(odd, "Kernels", "NaifIkCode"), -74410.0);
}

#[test]
fn test_virtis_level2_housekeeping() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
         RECORD_BYTES = 880\n\
         {}\n\
         MISSION_ID = ROSETTA\n\
         INSTRUMENT_ID = VIRTIS\n\
         PROCESSING_LEVEL_ID = 2\n\
         ROSETTA:CHANNEL_ID = VIRTIS_M_IR\n\
         TARGET_NAME = \"67P/CHURYUMOV-GERASIMENKO 1 (1969 R1)\"\n\
         START_TIME = 2014-08-01T00:00:00.000\n\
         OBJECT = QUBE\n\
           AXES = 3\n\
           AXIS_NAME = (BAND, SAMPLE, LINE)\n\
           CORE_ITEMS = (2, 4, 3)\n\
           CORE_ITEM_BYTES = 2\n\
           CORE_ITEM_TYPE = MSB_INTEGER\n\
           SUFFIX_ITEMS = (0, 0, 0)\n\
           FRAME_PARAMETER = (1.0, 1, 1, 1)\n\
         END_OBJECT = QUBE\n\
         END\n",
        pointer("QUBE")
    );
    let scet_words = [0usize, 7, 19, 29, 58];
    let mut data = Vec::new();
    for line in 0..3u16 {
        for sample in 0..4u16 {
            for band in 0..2u16 {
                data.extend((100 * line + 10 * sample + band).to_be_bytes());
            }
        }
        let mut trailer = vec![0u16; 432];
        for word in scet_words {
            trailer[word + 1] = 1000 + line;
        }
        if line == 1 {
            trailer[0] = 65535;
        }
        data.extend(trailer.iter().flat_map(|w| w.to_be_bytes()));
    }
    let from = attached_product(&dir, "virtis.qub", &label, &data);

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.driver, "virtis");
    let cube = outputs.primary().unwrap();
    assert_eq!((cube.samples(), cube.lines(), cube.bands()), (4, 3, 2));
    // FrameParameter[3] = 1: every second line, starting with the first, is a dark scan
    assert_eq!(cube.get(0, 0, 0), NULL8);
    assert_eq!(cube.get(2, 2, 1), NULL8);
    assert_eq!(cube.get(3, 1, 1), 131.0);

    let housekeeping = cube.table("VIRTISHouseKeeping").unwrap();
    assert_eq!(housekeeping.len(), 2);
    assert_eq!(housekeeping.fields[0].name, "DataScet");
    assert_eq!(housekeeping.records[0][0], FieldValue::Double(1000.0));
    assert_eq!(housekeeping.records[1][0], FieldValue::Double(1002.0));
    assert_eq!(number(cube, "Kernels", "NaifFrameCode"), -226213.0);
}

fn voyager_label(open_comment: bool) -> String {
    format!(
        "PDS_VERSION_ID = PDS3\n\
         {}\
         RECORD_BYTES = 3\n\
         {}\n\
         SPACECRAFT_NAME = VOYAGER_1\n\
         INSTRUMENT_NAME = NARROW_ANGLE_CAMERA\n\
         PRODUCT_TYPE = DECOMPRESSED_RAW_IMAGE\n\
         TARGET_NAME = JUPITER\n\
         IMAGE_ID = \"0549J1-040\"\n\
         IMAGE_NUMBER = \"16368.48\"\n\
         IMAGE_TIME = 1979-03-05T12:00:00Z\n\
         EXPOSURE_DURATION = 0.96 <SECONDS>\n\
         SCAN_MODE_ID = \"1:1\"\n\
         SHUTTER_MODE_ID = NAONLY\n\
         FILTER_NAME = CLEAR\n\
         OBJECT = IMAGE\n\
           LINES = 2\n\
           LINE_SAMPLES = 3\n\
           SAMPLE_BITS = 8\n\
           SAMPLE_TYPE = UNSIGNED_INTEGER\n\
         END_OBJECT = IMAGE\n\
         END\n",
        if open_comment {
            "/* Voyager ISS image, expanded from its compressed archive form\n"
        } else {
            ""
        },
        pointer("IMAGE")
    )
}

#[test]
fn test_voyager_compressed_imq() {
    let (_guard, dir) = temp_dir();
    let decompressed = attached_bytes(&voyager_label(true), &[1, 2, 3, 4, 5, 6]);
    let from = dir.join("C1636848.IMQ");
    std::fs::write(&from, attached_bytes(&voyager_label(false), &[0xAB; 16])).unwrap();

    let start = utc_to_et("1979-03-05T12:00:01.234").unwrap();
    let ingest = default_ingest()
        .with_spice(FakeSpice::new(2).with_clock("2/16368:48", start))
        .with_decompressor(FixedDecompressor {
            product: decompressed,
        });
    let (report, outputs) = ingest_memory(&ingest, &from);
    assert_eq!(report.driver, "voyager");
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let cube = outputs.primary().unwrap();
    assert_eq!(cube.line(1, 0), &[4.0, 5.0, 6.0]);
    assert_eq!(text(cube, "Instrument", "StartTime"), "1979-03-05T12:00:01.234");
    assert_eq!(text(cube, "Instrument", "SpacecraftClockCount"), "1636848");
    assert_eq!(text(cube, "Instrument", "CameraState1"), "1");
    assert_eq!(number(cube, "Kernels", "NaifFrameCode"), -31101.0);
    assert_relative_eq!(number(cube, "BandBin", "Center"), 0.497);

    let reseaus = group(cube, "Reseaus");
    assert_eq!(reseaus.keyword("Line").unwrap().len(), 196);
    assert_eq!(reseaus.keyword("Status").unwrap().as_str().unwrap(), "Nominal");
}

#[test]
fn test_voyager_without_spice_keeps_label_time() {
    let (_guard, dir) = temp_dir();
    let from = attached_product(&dir, "C1636848.IMG", &voyager_label(true), &[1, 2, 3, 4, 5, 6]);

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.warnings.len(), 1);
    let cube = outputs.primary().unwrap();
    assert_eq!(text(cube, "Instrument", "StartTime"), "1979-03-05T12:00:00");
}

#[test]
fn test_voyager_imq_needs_a_decompressor() {
    let (_guard, dir) = temp_dir();
    let from = dir.join("C1636848.IMQ");
    std::fs::write(&from, attached_bytes(&voyager_label(false), &[0xAB; 16])).unwrap();

    let mut outputs = MemoryOutputs::new("c.cub");
    let err = default_ingest().run_into(&from, &mut outputs).unwrap_err();
    assert_eq!(err.kind(), "Collaborator");
}

#[test]
fn test_near_msi_square_pixels() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
         {}\n\
         SPACECRAFT_NAME = \"NEAR EARTH ASTEROID RENDEZVOUS\"\n\
         INSTRUMENT_ID = MSI\n\
         TARGET_NAME = EROS\n\
         START_TIME = 2000-05-01T12:00:00.000Z\n\
         SPACECRAFT_CLOCK_START_COUNT = \"157063318.856\"\n\
         FILTER_NUMBER = 1\n\
         DPU_DECK_TEMPERATURE = 290.5\n\
         OBJECT = IMAGE\n\
           LINES = 244\n\
           LINE_SAMPLES = 80\n\
           SAMPLE_TYPE = UNSIGNED_INTEGER\n\
           SAMPLE_BITS = 8\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE")
    );
    // every pixel of a raw line holds its line number
    let data: Vec<u8> = (0..244u8).flat_map(|line| std::iter::repeat(line).take(80)).collect();
    let from = attached_product(&dir, "msi.img", &label, &data);

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.driver, "near_msi");
    let cube = outputs.primary().unwrap();
    assert_eq!((cube.samples(), cube.lines(), cube.bands()), (80, 412, 1));

    for line in [0, 32, 379, 411] {
        assert!(cube.line(line, 0).iter().all(|v| v.to_bits() == NULL8.to_bits()), "line {line}");
    }
    for line in [33, 206, 378] {
        assert_eq!(cube.get(32, line, 0), NULL8);
        assert_eq!(cube.get(47, line, 0), NULL8);
    }
    assert_eq!(cube.get(33, 33, 0), 19.0);
    assert_eq!(cube.get(40, 206, 0), 122.0);
    assert_eq!(cube.get(46, 378, 0), 224.0);

    assert_eq!(text(cube, "Instrument", "StartTime"), "2000-05-01T12:00:00.000");
    assert_eq!(text(cube, "Instrument", "SpacecraftClockStartCount"), "157063318856");
    assert_eq!(
        text(cube, "Instrument", "OriginalSpacecraftClockStartCount"),
        "157063318.856"
    );
    assert_eq!(group(cube, "Instrument").keyword("DpuDeckTemperature").unwrap().units(0), Some("K"));
    assert_eq!(number(cube, "BandBin", "Center"), 550.0);
    assert_eq!(group(cube, "BandBin").keyword("Center").unwrap().units(0), Some("nm"));
    assert_eq!(number(cube, "Kernels", "NaifFrameCode"), -93001.0);
}

const VIMS_SAMPLES: usize = 2;
const VIMS_LINES: usize = 2;
const VIMS_BANDS: usize = 352;

fn vims_label() -> String {
    let centers = (0..VIMS_BANDS)
        .map(|b| format!("{:.3}", 0.35 + b as f64 * 0.01))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "PDS_VERSION_ID = PDS3\n\
         ^QUBE = \"vims.qub\"\n\
         SPACECRAFT_NAME = CASSINI_ORBITER\n\
         INSTRUMENT_ID = VIMS\n\
         TARGET_NAME = TITAN\n\
         START_TIME = 2004-07-02T04:00:00.000Z\n\
         SPACECRAFT_CLOCK_START_COUNT = \"1467446210.118\"\n\
         OBJECT = QUBE\n\
           AXES = 3\n\
           AXIS_NAME = (SAMPLE, BAND, LINE)\n\
           CORE_ITEMS = ({VIMS_SAMPLES}, {VIMS_BANDS}, {VIMS_LINES})\n\
           CORE_ITEM_BYTES = 2\n\
           CORE_ITEM_TYPE = SUN_INTEGER\n\
           SUFFIX_ITEMS = (1, 1, 0)\n\
           SUFFIX_BYTES = 4\n\
           SAMPLING_MODE_ID = (\"NORMAL\", \"HI-RES\")\n\
           EXPOSURE_DURATION = (160.0, 5000.0)\n\
           GAIN_MODE_ID = (LOW, HIGH)\n\
           GROUP = BAND_BIN\n\
             BAND_BIN_CENTER = ({centers})\n\
           END_GROUP = BAND_BIN\n\
         END_OBJECT = QUBE\n\
         END\n"
    )
}

/// Sample 0 of band `b` is `1000 + b` (4000 for band 200 of line 0), sample 1 is `2000 + line`.
/// Every band line ends with a sideplane holding the band index, every line record with one
/// backplane.
fn vims_pixels() -> Vec<u8> {
    let mut data = Vec::new();
    for line in 0..VIMS_LINES {
        for band in 0..VIMS_BANDS {
            let first = if line == 0 && band == 200 { 4000 } else { 1000 + band as i16 };
            data.extend(first.to_be_bytes());
            data.extend((2000 + line as i16).to_be_bytes());
            data.extend((band as i32).to_be_bytes());
        }
        data.extend([0xAB; 4 * (VIMS_SAMPLES + 1)]);
    }
    data
}

#[test]
fn test_vims_channels_and_sideplanes() {
    let (_guard, dir) = temp_dir();
    let from = dir.join("vims.lbl");
    std::fs::write(&from, vims_label()).unwrap();
    std::fs::write(dir.join("vims.qub"), vims_pixels()).unwrap();

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.driver, "vims");
    assert!(outputs.primary().is_none());
    let vis = outputs.get(OutputRole::Vis).unwrap();
    let ir = outputs.get(OutputRole::Ir).unwrap();
    assert_eq!((vis.samples(), vis.lines(), vis.bands()), (2, 2, 96));
    assert_eq!((ir.samples(), ir.lines(), ir.bands()), (2, 2, 256));

    assert_eq!(vis.get(0, 1, 5), 1005.0);
    assert_eq!(vis.get(1, 1, 95), 2001.0);
    assert_eq!(ir.get(0, 1, 0), 1096.0);
    assert_eq!(ir.get(1, 0, 255), 2000.0);
    // band 200 of line 0: 4000 plus its sideplane of 200 saturates
    assert_eq!(ir.get(0, 0, 104).to_bits(), HIS8.to_bits());
    assert_eq!(ir.get(0, 1, 104), 1200.0);

    for cube in [vis, ir] {
        let sideplane_vis = cube.table("SideplaneVis").unwrap();
        let sideplane_ir = cube.table("SideplaneIr").unwrap();
        assert_eq!(sideplane_vis.len(), VIMS_LINES * 96);
        assert_eq!(sideplane_ir.len(), VIMS_LINES * 256);
        assert_eq!(
            sideplane_ir.records[0],
            vec![FieldValue::Integer(1), FieldValue::Integer(1), FieldValue::Integer(96)]
        );
    }

    assert_eq!(text(vis, "Instrument", "Channel"), "VIS");
    assert_eq!(text(vis, "Instrument", "SamplingMode"), "HI-RES");
    assert_eq!(text(ir, "Instrument", "Channel"), "IR");
    assert_eq!(text(ir, "Instrument", "SamplingMode"), "NORMAL");
    assert_eq!(text(ir, "Instrument", "StartTime"), "2004-07-02T04:00:00.000");
    let original = group(ir, "BandBin").keyword("OriginalBand").unwrap();
    assert_eq!(original.len(), 256);
    assert_eq!(original.get_str(0).unwrap(), "97");
    assert_eq!(group(vis, "BandBin").keyword("Center").unwrap().get_str(0).unwrap(), "0.350");
    assert_eq!(number(vis, "Kernels", "NaifFrameCode"), -82370.0);
    assert_eq!(number(ir, "Kernels", "NaifFrameCode"), -82371.0);
}

#[test]
fn test_kaguya_mi_sample_offset_is_negated() {
    let (_guard, dir) = temp_dir();
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
         {}\n\
         MISSION_NAME = SELENE\n\
         INSTRUMENT_ID = \"MI-VIS\"\n\
         TARGET_NAME = MOON\n\
         PRODUCT_ID = MI_MAP_02_N65E328N64E329SC\n\
         FILTER_NAME = MV3\n\
         OBJECT = IMAGE_MAP_PROJECTION\n\
           MAP_PROJECTION_TYPE = EQUIRECTANGULAR\n\
           A_AXIS_RADIUS = 1737.4 <KM>\n\
           C_AXIS_RADIUS = 1737.4 <KM>\n\
           POSITIVE_LONGITUDE_DIRECTION = EAST\n\
           MINIMUM_LATITUDE = 64.0 <DEG>\n\
           MAXIMUM_LATITUDE = 65.0 <DEG>\n\
           MINIMUM_LONGITUDE = 328.0 <DEG>\n\
           MAXIMUM_LONGITUDE = 329.0 <DEG>\n\
           MAP_SCALE = 100.0 <METERS/PIXEL>\n\
           LINE_PROJECTION_OFFSET = 10.0 <PIXEL>\n\
           SAMPLE_PROJECTION_OFFSET = -5.0 <PIXEL>\n\
           CENTER_LATITUDE = 0.0 <DEG>\n\
           CENTER_LONGITUDE = 0.0 <DEG>\n\
         END_OBJECT = IMAGE_MAP_PROJECTION\n\
         OBJECT = IMAGE\n\
           LINES = 2\n\
           LINE_SAMPLES = 3\n\
           SAMPLE_TYPE = UNSIGNED_INTEGER\n\
           SAMPLE_BITS = 8\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE")
    );
    let from = attached_product(&dir, "mi.img", &label, &[1, 2, 3, 4, 5, 6]);

    let (report, outputs) = ingest_memory(&default_ingest(), &from);
    assert_eq!(report.driver, "kaguya_mi");
    let cube = outputs.primary().unwrap();
    assert_eq!((cube.samples(), cube.lines()), (3, 2));
    assert_eq!(cube.get(2, 1, 0), 6.0);

    // x = -(sample offset - 0.5) * resolution with the sample offset read as +5
    assert_relative_eq!(number(cube, "Mapping", "UpperLeftCornerX"), -450.0);
    assert_relative_eq!(number(cube, "Mapping", "UpperLeftCornerY"), 950.0);
    assert_relative_eq!(number(cube, "Mapping", "EquatorialRadius"), 1737400.0);
    assert_relative_eq!(number(cube, "Mapping", "PixelResolution"), 100.0);
    assert_eq!(text(cube, "Mapping", "ProjectionName"), "Equirectangular");
    assert_eq!(text(cube, "Instrument", "SpacecraftName"), "KAGUYA");
    assert_eq!(text(cube, "BandBin", "FilterName"), "MV3");
    assert_eq!(number(cube, "Kernels", "NaifFrameCode"), -131335.0);
}

fn apollo_label(mission: &str) -> String {
    format!(
        "PDS_VERSION_ID = PDS3\n\
         {}\n\
         MISSION_NAME = \"{mission}\"\n\
         INSTRUMENT_ID = METRIC\n\
         TARGET_NAME = MOON\n\
         START_TIME = 1971-08-01T12:00:00.000\n\
         IMAGE_NUMBER = 1234\n\
         OBJECT = IMAGE\n\
           LINES = 2\n\
           LINE_SAMPLES = 2\n\
           SAMPLE_TYPE = UNSIGNED_INTEGER\n\
           SAMPLE_BITS = 8\n\
         END_OBJECT = IMAGE\n\
         END\n",
        pointer("IMAGE")
    )
}

#[test]
fn test_apollo_frame_codes() {
    let (_guard, dir) = temp_dir();
    for (mission, spacecraft, code) in [
        ("APOLLO 15", "APOLLO_15", -915240.0),
        ("APOLLO 16", "APOLLO_16", -916240.0),
        ("APOLLO 17", "APOLLO_17", -917240.0),
    ] {
        let name = format!("{spacecraft}.img");
        let from = attached_product(&dir, &name, &apollo_label(mission), &[9, 8, 7, 6]);
        let (report, outputs) = ingest_memory(&default_ingest(), &from);
        assert_eq!(report.driver, "apollo");
        let cube = outputs.primary().unwrap();
        assert_eq!(cube.line(1, 0), &[7.0, 6.0]);
        assert_eq!(text(cube, "Instrument", "SpacecraftName"), spacecraft);
        assert_eq!(text(cube, "Instrument", "InstrumentId"), "METRIC");
        assert_eq!(number(cube, "Kernels", "NaifFrameCode"), code, "{mission}");
    }
}
