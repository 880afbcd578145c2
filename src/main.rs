//! audioproc - Audio File Processor

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use audioproc::{
    init_logging, Args, AudioInfo, AudioProcError, Config, Frontend, JobRunner, OutputFormat, Result,
    SubmitOutcome,
};

fn main() {
    let args = Args::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Console stand-in for the interactive window
struct ConsoleFrontend {
    output: Option<PathBuf>,
    saved_to: Option<PathBuf>,
    processing: bool,
    failed: bool,
}

impl ConsoleFrontend {
    fn new(output: Option<PathBuf>) -> Self {
        Self { output, saved_to: None, processing: false, failed: false }
    }
}

impl Frontend for ConsoleFrontend {
    fn update_info(&mut self, info: &AudioInfo) {
        println!("{}", info);
    }

    fn update_progress(&mut self, percent: u8) {
        if self.processing {
            println!("Progress: {}%", percent);
        }
    }

    fn notify_success(&mut self) {
        println!("=== Processing Complete ===");
        if let Some(path) = &self.saved_to {
            println!("Saved to: {}", path.display());
        }
    }

    fn notify_error(&mut self, message: &str) {
        self.failed = true;
        eprintln!("Error: {}", message);
    }

    fn ask_save_path(&mut self, _format: OutputFormat, suggested: &Path) -> Option<PathBuf> {
        let path = self.output.clone().unwrap_or_else(|| suggested.to_path_buf());
        self.saved_to = Some(path.clone());
        Some(path)
    }

    fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }
}

/// Returns false when the job was rejected or failed; the error was already printed.
fn run(args: Args) -> Result<bool> {
    if let Some(path) = &args.write_default_config {
        Config::create_default_config(path)?;
        println!("Default config written to {}", path.display());
        return Ok(true);
    }

    let config = Config::from_args_and_config(&args)?;
    init_logging(config.verbose);

    if config.verbose {
        println!("{}", audioproc::get_library_info());
        println!();
    }

    let input = args.input.clone().ok_or(AudioProcError::NoFileSelected)?;
    if !input.exists() {
        return Err(AudioProcError::load(format!("Input file does not exist: {}", input.display())));
    }
    if !audioproc::audio::decoder::is_supported_input(&input) {
        log::warn!(
            "{} does not have a known audio extension ({}), trying anyway",
            input.display(),
            audioproc::audio::SUPPORTED_INPUT_EXTENSIONS.join(", ")
        );
    }

    let mut runner = JobRunner::new(config.backend());
    let mut frontend = ConsoleFrontend::new(args.output.clone());

    println!("=== audioproc ===");
    println!("Input: {}", input.display());
    if runner.load(&input, &mut frontend).is_err() {
        return Ok(false);
    }

    if args.info_only {
        return Ok(true);
    }

    println!("Format: {}", config.format());
    println!("=================\n");

    match runner.submit(&config.to_processing_params(), &mut frontend) {
        SubmitOutcome::Started => {
            runner.wait_until_idle(&mut frontend);
            Ok(!frontend.failed)
        }
        SubmitOutcome::Cancelled => {
            eprintln!("Error: No output path given");
            Ok(false)
        }
        SubmitOutcome::Busy | SubmitOutcome::Rejected => Ok(false),
    }
}
