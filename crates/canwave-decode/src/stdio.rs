use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use eyre::WrapErr;

fn is_stdio(path: &Option<PathBuf>) -> bool {
    path.as_ref().is_none_or(|p| p.as_os_str() == "-")
}

/// Get a writer for the given path; stdout if `-` or `None`
///
/// Not buffered, because [csv::Writer] is
pub fn get_output_writer(output: &Option<PathBuf>) -> eyre::Result<Box<dyn Write>> {
    match output {
        Some(path) if !is_stdio(output) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("Failed to create output file: {path:?}"))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(std::io::stdout())),
    }
}

/// Get a reader for the given path; stdin if `-` or `None`
pub fn get_input_reader(input: &Option<PathBuf>) -> eyre::Result<Box<dyn Read>> {
    match input {
        Some(path) if !is_stdio(input) => {
            let file =
                File::open(path).wrap_err_with(|| format!("Failed to open input file: {path:?}"))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(std::io::stdin())),
    }
}
