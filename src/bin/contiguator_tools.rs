use chrono::Local;
use clap::{Parser, ValueEnum};
use contiguator_tools::{
    about,
    embl_writer::{DEFAULT_OUTPUT_PATH, OutputConfig},
    error::ToolError,
    feature_location::OffsetPolicy,
    pipeline::{self, Config, RunSummary},
};
use log::LevelFilter;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    version = about::CONTIGUATOR_TOOLS_VERSION,
    about = about::CONTIGUATOR_TOOLS_ABOUT,
    long_about = None,
    after_help = "Reads the first record of a CONTIGuator PseudoContig.embl file, appends every \
                  sequence of Excluded.fsa as a Contig feature and writes the result as EMBL."
)]
struct Cli {
    /// Path to PseudoContig.embl
    #[arg(value_name = "EMBL")]
    embl: String,

    /// Path to Excluded.fsa
    #[arg(value_name = "FASTA")]
    fasta: String,

    /// Output PseudoContig_Excluded.embl to this file and location
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT_PATH)]
    out: String,

    /// Be loud and noisy
    #[arg(short, long)]
    verbose: bool,

    /// Where appending resumes when the last feature is on the reverse strand
    #[arg(long, value_enum, default_value_t = OffsetPolicyArg::Legacy)]
    offset_policy: OffsetPolicyArg,

    /// Reject EMBL files holding more than one record
    #[arg(long)]
    strict: bool,

    /// Print a JSON summary of the run
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OffsetPolicyArg {
    /// Resume at the start of a reverse-strand feature
    Legacy,
    /// Always resume at the end of the last feature
    End,
}

impl From<OffsetPolicyArg> for OffsetPolicy {
    fn from(arg: OffsetPolicyArg) -> Self {
        match arg {
            OffsetPolicyArg::Legacy => OffsetPolicy::Legacy,
            OffsetPolicyArg::End => OffsetPolicy::End,
        }
    }
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            embl: self.embl.clone(),
            fasta: self.fasta.clone(),
            output: OutputConfig::new(Some(self.out.clone())),
            offset_policy: self.offset_policy.into(),
            strict_single_record: self.strict,
        }
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}

fn timestamp() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

fn print_json(summary: &RunSummary) -> Result<(), ToolError> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn run(cli: &Cli) -> Result<(), ToolError> {
    let summary = pipeline::run(&cli.config())?;
    if cli.json {
        print_json(&summary)?;
    } else if cli.verbose {
        println!("{}", summary.embl);
        println!(
            "Appended {} excluded contig(s) at offset {}; wrote '{}'",
            summary.appended.len(),
            summary.append_offset,
            summary.output
        );
    }
    Ok(())
}

fn error_report(e: &ToolError) -> String {
    format!("ERROR, UNEXPECTED EXCEPTION\nERROR: {e}")
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let started = Instant::now();
    if cli.verbose {
        println!("Executing @ {}", timestamp());
    }
    if let Err(e) = run(&cli) {
        eprintln!("{}", error_report(&e));
        std::process::exit(1);
    }
    if cli.verbose {
        println!("Ended @ {}", timestamp());
        println!(
            "Exec time minutes {:.6}",
            started.elapsed().as_secs_f64() / 60.0
        );
    }
}
