use clap::Parser;
use std::{path::PathBuf, process};
use stem_transcriber_core::{
    load_config, set_progress_callback, Pipeline, PipelineConfig, PipelineProgress,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stem-transcriber")]
#[command(about = "Split a mix into stems and transcribe every part", long_about = None)]
#[command(version)]
struct Cli {
    /// Input audio file
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the job's artifacts
    #[arg(short, long)]
    output: PathBuf,

    /// Job identifier echoed in the result (generated when omitted)
    #[arg(long)]
    job_id: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only print the result line and warnings
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(cli) {
        Ok(line) => {
            println!("{line}");
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };

    if !cli.quiet {
        setup_progress_callback();
        eprintln!("🎵 Stem Transcriber");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Input:  {}", cli.input.display());
        eprintln!("Output: {}", cli.output.display());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let pipeline = Pipeline::with_default_models(config);
    let result = pipeline.run(&cli.input, &cli.output, cli.job_id)?;

    Ok(result.to_json_line()?)
}

fn init_tracing(quiet: bool) {
    let default = if quiet {
        "stem_transcriber_core=warn"
    } else {
        "stem_transcriber_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn setup_progress_callback() {
    set_progress_callback(|progress| match progress {
        PipelineProgress::Stage(stage) => {
            let stage_name = match stage {
                "separate" => "Separating stems",
                "derive" => "Deriving guitar / residual tracks",
                "assemble" => "Assembling result",
                _ => stage,
            };
            eprintln!("⏳ {}", stage_name);
        }
        PipelineProgress::Track { slug, done, total } => {
            eprintln!("🎼 {}/{} {}", done, total, slug);
        }
        PipelineProgress::Finished => {
            eprintln!("✅ Done");
        }
    });
}
