use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pds2cube::drivers::{DriverRegistry, ProductIdentity};
use pds2cube::label::parse_label;

/// CTX EDR label with the usual mix of quoted strings, units and sequences.
fn ctx_label() -> String {
    let mut text = String::from(
        "PDS_VERSION_ID = PDS3\n\
FILE_NAME = \"P01_001472_1747_XI_05S146W.IMG\"\n\
RECORD_TYPE = FIXED_LENGTH\n\
RECORD_BYTES = 5056\n\
FILE_RECORDS = 7169\n\
LABEL_RECORDS = 1\n\
^IMAGE = 2\n\
SPACECRAFT_NAME = MARS_RECONNAISSANCE_ORBITER\n\
INSTRUMENT_NAME = \"CONTEXT CAMERA\"\n\
INSTRUMENT_HOST_NAME = \"MARS RECONNAISSANCE ORBITER\"\n\
MISSION_PHASE_NAME = \"PRIMARY MAPPING\"\n\
TARGET_NAME = MARS\n\
INSTRUMENT_ID = CTX\n\
PRODUCER_ID = MRO_CTX_TEAM\n\
DATA_SET_ID = \"MRO-M-CTX-2-EDR-L0-V1.0\"\n\
PRODUCT_ID = \"P01_001472_1747_XI_05S146W\"\n\
SPACECRAFT_CLOCK_START_COUNT = \"0848201291:62\"\n\
START_TIME = 2006-11-17T03:27:53.118\n\
SAMPLING_FACTOR = 1\n\
SPATIAL_SUMMING = 1\n\
LINE_EXPOSURE_DURATION = 1.877 <MSEC>\n\
OFFSET_MODE_ID = \"196/190/181\"\n\
SAMPLE_BIT_MODE_ID = \"SQROOT\"\n\
EDIT_MODE_ID = \"0\"\n",
    );
    for i in 0..40 {
        text.push_str(&format!("/* housekeeping {i} */\nHK_{i} = ({i}, {}, \"{i}:{i}\")\n", i * 2));
    }
    text.push_str(
        "OBJECT = IMAGE\n\
  LINES = 7168\n\
  LINE_SAMPLES = 5056\n\
  LINE_PREFIX_BYTES = 0\n\
  LINE_SUFFIX_BYTES = 0\n\
  SAMPLE_TYPE = UNSIGNED_INTEGER\n\
  SAMPLE_BITS = 8\n\
  SAMPLE_BIT_MASK = 2#11111111#\n\
  CHECKSUM = 16#4CAE8AF5#\n\
END_OBJECT = IMAGE\n\
END\n",
    );
    text
}

fn bench_parse(c: &mut Criterion) {
    let text = ctx_label();
    c.bench_function("label_parsing/ctx_edr", |b| {
        b.iter(|| {
            let label = parse_label(black_box(text.as_bytes())).unwrap();
            black_box(label);
        })
    });
}

fn bench_identify(c: &mut Criterion) {
    let text = ctx_label();
    let registry = DriverRegistry::new();
    c.bench_function("label_parsing/identify_driver", |b| {
        b.iter(|| {
            let identity = ProductIdentity::sniff(black_box(&text));
            black_box(registry.select(&identity).unwrap().name());
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_parse, bench_identify
);
criterion_main!(benches);
