//! Command history, one line per executed command, appended to a dot-file
//! in the user's home directory.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Location of the history file, when a home directory exists. Sessions
/// without one (containers, stripped environments) simply skip history.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".simpledb_history"))
}

/// Appends a line to the history file, creating it on first use.
pub fn append_history(line: &str, path: &PathBuf) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", line.trim())?;
    writer.flush()?;
    Ok(())
}

/// Loads the command history. Returns an empty vector if the file cannot
/// be opened or read.
pub fn load_history(path: &PathBuf) -> Vec<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Vec::new(),
    };

    let reader = BufReader::new(file);
    reader
        .lines()
        .filter_map(|line| {
            line.ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .collect()
}

/// Ensures the history file exists, creating it if necessary.
pub fn ensure_history_file(path: &PathBuf) -> io::Result<()> {
    if !path.exists() {
        File::create(path)?;
    }
    Ok(())
}
