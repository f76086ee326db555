//! `arcspec` command line: nightly CCD reduction, spectral extraction with
//! wavelength calibration, lamp recommendations and request tallies.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use arcspec::config::Config;
use arcspec::extract::{extract_aperture, find_target, spatial_profile};
use arcspec::io;
use arcspec::lamps::LampCatalog;
use arcspec::reduce::{self, ObsType};
use arcspec::requests;
use arcspec::wavelength::{detect_lines, linearize, read_line_list, WavelengthSolution};
use arcspec::{Frame, Spectrum};

/// Long-slit CCD reduction and wavelength calibration.
#[derive(Parser, Debug)]
#[command(name = "arcspec")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML); built-in defaults apply when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reduce a night of raw frames (overscan, trim, bias, flat)
    Redccd {
        /// Raw frame container, or a directory of containers
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Extract spectra from reduced frames and fit a wavelength solution
    Redspec {
        /// Reduced frame container (from redccd)
        input: PathBuf,

        /// CSV line list with pixel,wavelength columns
        #[arg(short, long)]
        lines: Option<PathBuf>,

        /// Print line candidates detected in the comparison spectrum
        #[arg(short, long)]
        detect: bool,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Look up comparison-lamp recommendations
    Lamps {
        /// Grating line density, e.g. 400
        #[arg(short, long)]
        grating: Option<u16>,

        /// Wavelength mode, e.g. M1
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Scan and tally observer grating requests
    #[command(subcommand)]
    Gratings(GratingsCommands),
}

#[derive(Subcommand, Debug)]
enum GratingsCommands {
    /// Walk night directories and write one record per requested grating
    Scan {
        /// Root holding YYYY-MM-DD night directories
        root: PathBuf,

        /// Records CSV to write
        #[arg(short, long, default_value = "records.csv")]
        out: PathBuf,
    },

    /// Count records per offered grating and print a histogram
    Tally {
        /// Records CSV from `gratings scan`
        records: PathBuf,

        /// Also write the counts as CSV
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Redccd { input, out } => redccd(&config, &input, &out),
        Commands::Redspec {
            input,
            lines,
            detect,
            out,
        } => redspec(&config, &input, lines.as_deref(), detect, &out),
        Commands::Lamps { grating, mode } => lamps(grating, mode.as_deref()),
        Commands::Gratings(command) => gratings(command),
    }
}

// ---------------------------------------------------------------------------
// redccd
// ---------------------------------------------------------------------------

fn redccd(config: &Config, input: &Path, out: &Path) -> Result<()> {
    let frames = load_input(input)?;
    println!("loaded {} raw frame(s) from {}", frames.len(), input.display());
    print!("{}", reduce::classify(&frames));

    let reduced =
        reduce::reduce_night(&frames, &config.reduction).context("night reduction failed")?;

    let (masters, science): (Vec<Frame>, Vec<Frame>) = reduced.into_iter().partition(|frame| {
        matches!(
            frame.header.get_str("OBSTYPE"),
            Some("MBIAS") | Some("MFLAT")
        )
    });

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    if masters.is_empty() {
        log::warn!("no master calibrations produced");
    } else {
        let path = out.join("masters.parquet");
        io::save_frames(&path, &masters).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {} master frame(s) to {}", masters.len(), path.display());
    }

    if science.is_empty() {
        log::warn!("no object or comparison frames reduced");
    } else {
        let path = out.join(format!("{}frames.parquet", config.reduction.output_prefix));
        io::save_frames(&path, &science).with_context(|| format!("writing {}", path.display()))?;
        println!(
            "wrote {} reduced frame(s) to {}",
            science.len(),
            path.display()
        );
    }
    Ok(())
}

fn load_input(input: &Path) -> Result<Vec<Frame>> {
    let frames = if input.is_dir() {
        io::load_directory(input)
    } else {
        io::load_frames(input)
    };
    frames.with_context(|| format!("loading {}", input.display()))
}

// ---------------------------------------------------------------------------
// redspec
// ---------------------------------------------------------------------------

fn redspec(
    config: &Config,
    input: &Path,
    lines: Option<&Path>,
    detect: bool,
    out: &Path,
) -> Result<()> {
    let frames =
        io::load_frames(input).with_context(|| format!("loading {}", input.display()))?;

    let object = frames
        .iter()
        .find(|f| obstype_of(f) == Some(ObsType::Object))
        .with_context(|| format!("no object frame in {}", input.display()))?;
    let comp = frames
        .iter()
        .find(|f| obstype_of(f) == Some(ObsType::Comp));

    let spectral = &config.spectral;
    let profile = spatial_profile(object);
    let target = find_target(&profile)
        .with_context(|| format!("locating the target on {}", object.id()))?;
    println!(
        "target on {} at row {:.2} (FWHM {:.2})",
        object.id(),
        target.center,
        target.fwhm
    );

    let background = spectral.background.then_some(spectral.background_offset);
    let mut object_spectrum =
        extract_aperture(object, target.center, spectral.aperture_half_width, background)?;

    // Arc light fills the slit, so the comparison aperture mirrors the
    // object's but never subtracts background.
    let mut comp_spectrum = match comp {
        Some(frame) => Some(extract_aperture(
            frame,
            target.center,
            spectral.aperture_half_width,
            None,
        )?),
        None => {
            log::warn!("no comparison frame in {}", input.display());
            None
        }
    };

    if detect {
        let Some(spectrum) = &comp_spectrum else {
            bail!("--detect needs a comparison frame in the container");
        };
        let candidates = detect_lines(spectrum, spectral.detect_threshold_sigma);
        println!(
            "{} line candidate(s) above {} sigma on {}:",
            candidates.len(),
            spectral.detect_threshold_sigma,
            spectrum.id()
        );
        println!("{:>10} {:>12}", "pixel", "peak");
        for line in &candidates {
            println!("{:>10.3} {:>12.1}", line.pixel, line.peak);
        }
        return Ok(());
    }

    if let Some(list) = lines {
        let (pixels, wavelengths) =
            read_line_list(list).with_context(|| format!("reading {}", list.display()))?;
        let solution =
            WavelengthSolution::fit(&pixels, &wavelengths, spectral.model, spectral.degree)?;
        println!(
            "fitted {:?} solution on {} line(s), rms {:.4}",
            spectral.model, solution.npoints, solution.rms
        );
        println!("{:>10} {:>12} {:>10}", "pixel", "wavelength", "residual");
        for ((pixel, wavelength), residual) in
            pixels.iter().zip(&wavelengths).zip(&solution.residuals)
        {
            println!("{pixel:>10.3} {wavelength:>12.3} {residual:>10.4}");
        }

        object_spectrum = linearize(&object_spectrum, solution.model())?;
        if let Some(spectrum) = comp_spectrum.take() {
            comp_spectrum = Some(linearize(&spectrum, solution.model())?);
        }
    } else {
        log::warn!("no line list given; spectra stay in pixel space");
    }

    let mut spectra: Vec<Spectrum> = vec![object_spectrum];
    spectra.extend(comp_spectrum);

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let path = out.join("spectra.parquet");
    io::save_spectra(&path, &spectra).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {} spectra to {}", spectra.len(), path.display());
    Ok(())
}

fn obstype_of(frame: &Frame) -> Option<ObsType> {
    frame
        .header
        .get_str("OBSTYPE")
        .and_then(ObsType::from_keyword)
}

// ---------------------------------------------------------------------------
// lamps
// ---------------------------------------------------------------------------

fn lamps(grating: Option<u16>, mode: Option<&str>) -> Result<()> {
    let catalog = LampCatalog::embedded();

    let Some(grating) = grating else {
        let known: Vec<String> = catalog.gratings().iter().map(u16::to_string).collect();
        println!("gratings: {}", known.join(", "));
        println!("lamps: {}", catalog.lamps().join(", "));
        return Ok(());
    };

    let Some(rows) = catalog.table(grating) else {
        let known: Vec<String> = catalog.gratings().iter().map(u16::to_string).collect();
        bail!("no lamp table for grating {grating} (known: {})", known.join(", "));
    };

    if let Some(mode) = mode {
        let Some(row) = rows.iter().find(|r| r.mode().eq_ignore_ascii_case(mode)) else {
            let modes: Vec<&str> = rows.iter().map(|r| r.mode()).collect();
            bail!(
                "grating {grating} has no mode '{mode}' (known: {})",
                modes.join(", ")
            );
        };
        println!("grating {grating} l/mm, mode {} ({})", row.mode(), row.range());
        for (lamp, rating) in row.ratings() {
            println!("  {lamp:<8} {rating}");
        }
        match catalog.best_for(grating, mode) {
            Some(lamp) => println!("use: {lamp}"),
            None => println!("no usable lamp for this mode"),
        }
        return Ok(());
    }

    print!("{:<8} {:<14}", "mode", "range");
    for lamp in catalog.lamps() {
        print!(" {lamp:>7}");
    }
    println!();
    for row in rows {
        print!("{:<8} {:<14}", row.mode(), row.range());
        for lamp in catalog.lamps() {
            let cell = catalog
                .rating(grating, row.mode(), lamp)
                .map(|rating| rating.as_str())
                .unwrap_or("-");
            print!(" {cell:>7}");
        }
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// gratings
// ---------------------------------------------------------------------------

fn gratings(command: GratingsCommands) -> Result<()> {
    match command {
        GratingsCommands::Scan { root, out } => {
            let records = requests::scan_requests(&root)
                .with_context(|| format!("scanning {}", root.display()))?;
            requests::write_records_csv(&out, &records)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("wrote {} record(s) to {}", records.len(), out.display());
            Ok(())
        }
        GratingsCommands::Tally { records, out } => {
            let records = requests::read_records_csv(&records)
                .with_context(|| format!("reading {}", records.display()))?;
            let tally = requests::tally(&records);
            print!("{}", requests::render_tally(&tally));
            println!("total: {}", tally.total());
            if tally.off_axis() > 0 {
                println!("off-axis (300 l/mm): {}", tally.off_axis());
            }
            if let Some(path) = out {
                requests::write_tally_csv(&path, &tally)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("wrote counts to {}", path.display());
            }
            Ok(())
        }
    }
}
