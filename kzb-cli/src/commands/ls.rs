//! `kzb ls`: list files of the merged directory.

use glob::Pattern;
use serde::Serialize;

use kzb::config::ConfigFile;
use kzb::{Directory, FileEntry};

use super::common::{format_flags, load_directory, ContainerArgs};
use crate::error::CliError;

/// One file in JSON output.
#[derive(Debug, Serialize, PartialEq)]
struct FileRecord<'a> {
    path: &'a str,
    #[serde(rename = "type")]
    file_type: &'static str,
    tag: i32,
    size: u32,
    flags: u32,
    source: String,
}

impl<'a> FileRecord<'a> {
    fn new(directory: &Directory, file: &'a FileEntry) -> Self {
        let source = directory
            .source(file.source())
            .map(|s| s.description())
            .unwrap_or_default();
        Self {
            path: file.path(),
            file_type: file.file_type().name(),
            tag: file.file_type().tag(),
            size: file.size(),
            flags: file.flags(),
            source,
        }
    }
}

pub fn run(
    args: &ContainerArgs,
    config: &ConfigFile,
    pattern: Option<&str>,
    json: bool,
) -> Result<(), CliError> {
    let pattern = pattern.map(Pattern::new).transpose()?;
    let loader = load_directory(args, config)?;
    let directory = loader.directory();

    let files = matching_files(directory, pattern.as_ref());

    if json {
        let records: Vec<FileRecord> = files
            .iter()
            .map(|file| FileRecord::new(directory, file))
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for file in &files {
        println!(
            "{:<14} {:>10}  {:<16} {}",
            file.file_type().to_string(),
            file.size(),
            format_flags(file),
            file.path()
        );
    }
    println!();
    println!("{} file(s)", files.len());
    Ok(())
}

/// Files whose path matches `pattern`, or all files.
fn matching_files<'a>(directory: &'a Directory, pattern: Option<&Pattern>) -> Vec<&'a FileEntry> {
    directory
        .root()
        .all_files()
        .into_iter()
        .filter(|file| pattern.map_or(true, |p| p.matches(file.path())))
        .collect()
}
