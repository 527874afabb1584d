//! Reverbmeter - room reverberation time measurement
//!
//! Command line front end: analyzes a recorded decay and prints RT60 per band.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reverbmeter::audio::spectrum::Spectrum;
use reverbmeter::input::load_signal;
use reverbmeter::{BandScheme, Estimator, EstimatorConfig, Method, Rt60Report};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "reverbmeter",
    version = reverbmeter::VERSION,
    about = "Estimate room reverberation time (RT60) from a recorded decay"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate RT60 per frequency band
    Analyze {
        /// WAV file containing the decay
        file: PathBuf,
        /// Band scheme: octave, third-octave or broad
        #[arg(long)]
        scheme: Option<BandScheme>,
        /// Decay range: T20, T30, T60 or EDT
        #[arg(long)]
        method: Option<Method>,
        /// Write the report as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
        /// Config file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Analyze every channel separately instead of the downmix
        #[arg(long)]
        per_channel: bool,
    },
    /// Show the dominant frequencies of a file
    Spectrum {
        file: PathBuf,
        /// Number of spectral peaks to list
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Print the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
        /// Config file (defaults to the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reverbmeter=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            file,
            scheme,
            method,
            json,
            config,
            per_channel,
        } => run_analyze(&file, scheme, method, json, config, per_channel),
        Commands::Spectrum { file, top } => run_spectrum(&file, top),
        Commands::Config { init, path } => run_config(init, path),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EstimatorConfig> {
    match path {
        // An explicitly named file must be valid
        Some(path) => EstimatorConfig::read(&path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(EstimatorConfig::load_from(&reverbmeter::default_config_path())),
    }
}

fn run_analyze(
    file: &Path,
    scheme: Option<BandScheme>,
    method: Option<Method>,
    json: Option<PathBuf>,
    config: Option<PathBuf>,
    per_channel: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let scheme = scheme.unwrap_or_else(|| config.scheme.clone());
    let method = method.unwrap_or(config.method);
    let estimator = Estimator::new(config)?;

    let signal = load_signal(file)?;
    println!(
        "{}: {} Hz, {} channel(s), {:.2} s",
        file.display(),
        signal.sample_rate(),
        signal.channels(),
        signal.duration_secs()
    );

    let reports: Vec<Rt60Report> = if per_channel {
        estimator.estimate_per_channel(&signal, &scheme, method)?
    } else {
        vec![estimator.estimate(&signal, &scheme, method)?]
    };

    for report in &reports {
        println!();
        if let Some(channel) = report.channel {
            println!("Channel {}", channel + 1);
        }
        if let Some(freq) = report.dominant_frequency_hz {
            println!("Dominant frequency: {:.1} Hz", freq);
        }
        println!("{}", report);
    }

    if let Some(path) = json {
        let document = if reports.len() == 1 {
            serde_json::to_string_pretty(&reports[0])?
        } else {
            serde_json::to_string_pretty(&reports)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, document)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }

    Ok(())
}

fn run_spectrum(file: &Path, top: usize) -> Result<()> {
    let signal = load_signal(file)?;
    let spectrum = Spectrum::analyze(&signal);

    println!("Duration: {:.2} s", signal.duration_secs());
    match spectrum.dominant_frequency() {
        Some(freq) => println!("Dominant frequency: {:.1} Hz", freq),
        None => println!("Dominant frequency: undefined (silent input)"),
    }
    for (rank, peak) in spectrum.peaks(top).iter().enumerate() {
        println!(
            "  {:>2}. {:>9.1} Hz  {:.3e}",
            rank + 1,
            peak.frequency_hz,
            peak.magnitude
        );
    }
    Ok(())
}

fn run_config(init: bool, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(reverbmeter::default_config_path);
    let config = if init {
        let config = EstimatorConfig::default();
        config.save(&path)?;
        println!("Wrote default configuration to {}", path.display());
        config
    } else {
        EstimatorConfig::load_from(&path)
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
