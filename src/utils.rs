use flate2::read::GzDecoder;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Read normal or compressed files seamlessly
/// Uses the presence of a `.gz` extension to decide
/// `-` means stdin
pub fn reader(filename: &str) -> io::Result<Box<dyn BufRead>> {
    if filename == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let path = Path::new(filename);
    let file = fs::File::open(path).map_err(|why| {
        io::Error::new(
            why.kind(),
            format!("couldn't open {}: {}", path.display(), why),
        )
    })?;

    if path.extension() == Some(OsStr::new("gz")) {
        Ok(Box::new(BufReader::with_capacity(
            128 * 1024,
            GzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(128 * 1024, file)))
    }
}

/// A file, or stdout when there is no filename
pub fn writer(filename: Option<&str>) -> io::Result<Box<dyn Write>> {
    match filename {
        None | Some("-") => Ok(Box::new(BufWriter::new(io::stdout()))),
        Some(f) => Ok(Box::new(BufWriter::new(fs::File::create(f)?))),
    }
}
