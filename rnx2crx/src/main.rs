//! Command line tool to compress RINEX observation data
mod cli;
use cli::Cli;

use crinex::prelude::*;
use crinex::MAX_LINE_LEN;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use thiserror::Error;

#[derive(Error, Debug)]
enum AppError {
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("invalid file name \"{0}\": the extension should be [.??o] or [.rnx]")]
    InvalidFileName(String),
    #[error("file name exceeds {MAX_LINE_LEN} characters")]
    FileNameTooLong,
    #[error("compression error: {0}")]
    Compression(#[from] crinex::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::new();
    match run(&cli) {
        Ok(Some(summary)) if summary.warnings > 0 => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        },
    }
}

/// None when the user declined to overwrite an existing output file.
fn run(cli: &Cli) -> Result<Option<Summary>, AppError> {
    let mut compressor = Compressor::new()
        .skip_strange_epochs(cli.skip())
        .with_crinex(Crinex::default().with_prog(&format!("rnx2crx v{}", env!("CARGO_PKG_VERSION"))));
    if let Some(every) = cli.every() {
        compressor = compressor.reinitialize_every(every);
    }

    match cli.input_path() {
        None => {
            // filter mode
            let stdin = io::stdin().lock();
            let stdout = io::stdout().lock();
            let summary = compressor.run(stdin, BufWriter::new(stdout))?;
            Ok(Some(summary))
        },
        Some(path) => {
            if path.len() >= MAX_LINE_LEN {
                return Err(AppError::FileNameTooLong);
            }
            let input = open_input(path)?;
            if cli.to_stdout() {
                let stdout = io::stdout().lock();
                let summary = compressor.run(input, BufWriter::new(stdout))?;
                return Ok(Some(summary));
            }
            let output_path = output_name(path)?;
            if Path::new(&output_path).exists() && !cli.force() && !confirm_overwrite(&output_path)?
            {
                return Ok(None);
            }
            let output = BufWriter::new(File::create(&output_path)?);
            let summary = compressor.run(input, output)?;
            println!("{} generated", output_path);
            Ok(Some(summary))
        },
    }
}

fn open_input(path: &str) -> Result<BufferedReader<BufReader<File>>, AppError> {
    let fd = BufReader::new(File::open(path)?);
    if path.ends_with(".gz") {
        Ok(BufferedReader::gzip(fd))
    } else {
        Ok(BufferedReader::plain(fd))
    }
}

/// Derives the output name: `.??o -> .??d` (case of the last letter
/// preserved) or `.rnx -> .crx` (case of the triplet preserved).
fn output_name(input: &str) -> Result<String, AppError> {
    let plain = input.strip_suffix(".gz").unwrap_or(input);
    let (stem, ext) = match plain.rfind('.') {
        Some(dot) => plain.split_at(dot),
        None => return Err(AppError::InvalidFileName(input.to_string())),
    };
    let ext = &ext[1..];
    if ext.len() == 3 && ext.ends_with('o') {
        Ok(format!("{}.{}d", stem, &ext[..2]))
    } else if ext.len() == 3 && ext.ends_with('O') {
        Ok(format!("{}.{}D", stem, &ext[..2]))
    } else if ext == "rnx" {
        Ok(format!("{}.crx", stem))
    } else if ext == "RNX" {
        Ok(format!("{}.CRX", stem))
    } else {
        Err(AppError::InvalidFileName(input.to_string()))
    }
}

fn confirm_overwrite(path: &str) -> Result<bool, AppError> {
    eprint!("The file {} already exists. Overwrite?(n) ", path);
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim_start().starts_with('y'))
}

#[cfg(test)]
mod test {
    use super::output_name;

    #[test]
    fn name_derivation() {
        assert_eq!(output_name("ajac3550.21o").unwrap(), "ajac3550.21d");
        assert_eq!(output_name("AJAC3550.21O").unwrap(), "AJAC3550.21D");
        assert_eq!(output_name("station.rnx").unwrap(), "station.crx");
        assert_eq!(output_name("STATION.RNX").unwrap(), "STATION.CRX");
        assert_eq!(output_name("station.rnx.gz").unwrap(), "station.crx");
        assert!(output_name("station.txt").is_err());
        assert!(output_name("station").is_err());
    }
}
