use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Row, Table};
use env_logger::{Builder, Env};
use log::info;

use pds2cube::cnet::{CnetCheck, ControlNet};
use pds2cube::config::{FlipMode, IngestConfigBuilder};
use pds2cube::cube::{CubeCache, CubeInfo, LabelOpener};
use pds2cube::decompress::ExternalDecompressor;
use pds2cube::geometry::{SpecialPixel, SpecialRange};
use pds2cube::ingest::{Ingest, IngestReport};
use pds2cube::ingest_errors::IngestError;
use pds2cube::label::fixups::VoyagerCamera;
use pds2cube::serial::{SerialNumberGenerator, SerialNumberList};

#[derive(Debug, Parser)]
#[command(
    name = "pds2cube",
    version,
    about = "Convert PDS3 products into cubes",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    ingest: IngestArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest a PDS product (the default command)
    Ingest(IngestArgs),
    /// Print the serial and observation numbers of cubes
    Serial {
        #[arg(required = true)]
        cubes: Vec<Utf8PathBuf>,
    },
    /// Check a control network against the cubes it ties together
    Cnetcheck(CnetCheckArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CameraArg {
    Nac,
    Wac,
}

#[derive(Debug, Args)]
struct IngestArgs {
    /// PDS label of the product
    from: Option<Utf8PathBuf>,
    /// Output cube
    to: Option<Utf8PathBuf>,

    /// Force a driver instead of detecting it from the label
    #[arg(long)]
    driver: Option<String>,

    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    setnullrange: Option<Vec<f64>>,
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    setlrsrange: Option<Vec<f64>>,
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    setlisrange: Option<Vec<f64>>,
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    sethisrange: Option<Vec<f64>>,
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    sethrsrange: Option<Vec<f64>>,

    /// MARCI framelet flip: auto, yes or no
    #[arg(long, default_value = "auto")]
    flip: FlipMode,
    /// MARCI color offset, in framelets
    #[arg(long, default_value_t = 0)]
    color_offset: usize,

    /// Line prefix bytes, replacing the label value
    #[arg(long)]
    prefix: Option<u64>,
    /// Line suffix bytes, replacing the label value
    #[arg(long)]
    suffix: Option<u64>,

    /// Do not attach the input label to the cube
    #[arg(long)]
    no_original_label: bool,
    /// Directory of translation files overriding the built-in ones
    #[arg(long)]
    translations: Option<Utf8PathBuf>,
    /// Voyager camera of labels without INSTRUMENT_NAME
    #[arg(long, value_enum)]
    camera: Option<CameraArg>,
    /// Program expanding compressed products, run as PROGRAM INPUT OUTPUT
    #[arg(long)]
    decompressor: Option<Utf8PathBuf>,
    /// Show a progress bar while streaming pixels
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Args)]
struct CnetCheckArgs {
    /// Control network in PVL form
    cnet: Utf8PathBuf,
    /// File listing the cubes, one path per line
    fromlist: Utf8PathBuf,
    /// Coverage ratio under which a cube is reported
    #[arg(long, default_value_t = 0.0)]
    tolerance: f64,
    /// Prefix of the report files
    #[arg(long, default_value = "")]
    prefix: String,
    /// Field delimiter of the report files
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// Also check ignored points and measures
    #[arg(long)]
    keep_ignored: bool,
}

fn special_range(values: &Option<Vec<f64>>) -> Option<SpecialRange> {
    match values.as_deref() {
        Some([min, max]) => Some(SpecialRange::new(*min, *max)),
        _ => None,
    }
}

/// One-line diagnostic naming the input and the error kind.
fn diagnostic(input: &Utf8Path, error: IngestError) -> anyhow::Error {
    anyhow!("[{input}] {}: {error}", error.kind())
}

fn report_table(report: &IngestReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("Driver"), Cell::new("Item"), Cell::new("Detail")]);
    for output in &report.outputs {
        table.add_row(Row::from(vec![
            Cell::new(report.driver),
            Cell::new("output"),
            Cell::new(output),
        ]));
    }
    for diagnostic in &report.diagnostics {
        table.add_row(Row::from(vec![
            Cell::new(report.driver),
            Cell::new(format!("skipped table {}", diagnostic.pointer)),
            Cell::new(&diagnostic.error),
        ]));
    }
    for warning in &report.warnings {
        table.add_row(Row::from(vec![
            Cell::new(report.driver),
            Cell::new("warning"),
            Cell::new(warning),
        ]));
    }
    table
}

fn run_ingest(args: IngestArgs) -> Result<()> {
    let (Some(from), Some(to)) = (args.from.as_deref(), args.to.as_deref()) else {
        bail!("usage: pds2cube FROM TO [OPTIONS]");
    };

    let mut builder = IngestConfigBuilder::new()
        .flip(args.flip)
        .color_offset(args.color_offset)
        .keep_original_label(!args.no_original_label)
        .show_progress(args.progress && cfg!(feature = "progress"));
    let ranges = [
        (SpecialPixel::Null, &args.setnullrange),
        (SpecialPixel::Lrs, &args.setlrsrange),
        (SpecialPixel::Lis, &args.setlisrange),
        (SpecialPixel::His, &args.sethisrange),
        (SpecialPixel::Hrs, &args.sethrsrange),
    ];
    for (special, values) in ranges {
        if let Some(range) = special_range(values) {
            builder = builder.special_range(special, range);
        }
    }
    if let Some(driver) = args.driver {
        builder = builder.driver(driver);
    }
    if let Some(bytes) = args.prefix {
        builder = builder.prefix_bytes(bytes);
    }
    if let Some(bytes) = args.suffix {
        builder = builder.suffix_bytes(bytes);
    }
    if let Some(dir) = args.translations {
        builder = builder.translation_dir(dir);
    }
    if let Some(camera) = args.camera {
        builder = builder.camera(match camera {
            CameraArg::Nac => VoyagerCamera::Narrow,
            CameraArg::Wac => VoyagerCamera::Wide,
        });
    }
    let config = builder.build().map_err(|e| diagnostic(from, e))?;

    let mut ingest = Ingest::new(config);
    if let Some(program) = args.decompressor {
        ingest = ingest.with_decompressor(ExternalDecompressor::new(program));
    }
    let report = ingest.run(from, to).map_err(|e| diagnostic(from, e))?;
    println!("{}", report_table(&report));
    Ok(())
}

fn run_serial(cubes: Vec<Utf8PathBuf>) -> Result<()> {
    let generator = SerialNumberGenerator::builtin()?;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("File"),
        Cell::new("SerialNumber"),
        Cell::new("ObservationNumber"),
    ]);
    for path in &cubes {
        let info = CubeInfo::open(path).map_err(|e| diagnostic(path, e))?;
        let serial = generator.serial_number_or_filename(&info.label, path);
        let observation = generator
            .observation_number(&info.label)
            .unwrap_or_else(|_| serial.clone());
        table.add_row(Row::from(vec![
            Cell::new(path),
            Cell::new(serial),
            Cell::new(observation),
        ]));
    }
    println!("{table}");
    Ok(())
}

fn run_cnetcheck(args: CnetCheckArgs) -> Result<()> {
    let delimiter = u8::try_from(args.delimiter)
        .map_err(|_| anyhow!("delimiter [{}] is not a single byte", args.delimiter))?;
    let net = ControlNet::from_file(&args.cnet).map_err(|e| diagnostic(&args.cnet, e))?;
    let serials = SerialNumberList::from_list_file(SerialNumberGenerator::builtin()?, &args.fromlist)
        .map_err(|e| diagnostic(&args.fromlist, e))?;
    let mut cache = CubeCache::new(LabelOpener);

    let check = CnetCheck {
        ignore: !args.keep_ignored,
        tolerance: args.tolerance,
        delimiter,
    };
    let report = check
        .run(&net, &serials, &mut cache)
        .map_err(|e| diagnostic(&args.cnet, e))?;
    for path in report.write_files(&args.prefix, check.delimiter)? {
        info!("Wrote {path}");
    }
    print!("{}", report.summary(&args.prefix));
    println!("{}", report.results_group());
    Ok(())
}

fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Ingest(args)) => run_ingest(args),
        Some(Command::Serial { cubes }) => run_serial(cubes),
        Some(Command::Cnetcheck(args)) => run_cnetcheck(args),
        None => run_ingest(cli.ingest),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("pds2cube: {error:#}");
            ExitCode::FAILURE
        }
    }
}
