//! `kzb info`: loaded containers and directory totals.

use kzb::config::ConfigFile;
use kzb::loader::LoadedContainer;

use super::common::{load_directory, ContainerArgs};
use crate::error::CliError;

pub fn run(args: &ContainerArgs, config: &ConfigFile) -> Result<(), CliError> {
    let loader = load_directory(args, config)?;

    println!("Containers");
    println!("==========");
    for (index, container) in loader.loaded().iter().enumerate() {
        println!();
        print_container(index + 1, container);
    }

    let directory = loader.directory();
    let root = directory.root();
    println!();
    println!("Directory");
    println!("=========");
    println!("  Sources:        {}", directory.source_count());
    println!("  Folders:        {}", root.folder_count_recursive());
    println!("  Files:          {}", root.file_count_recursive());
    println!("  Shortcuts:      {}", directory.shortcuts().len());
    println!("  File flag mask: {:#x}", directory.file_flag_mask());

    Ok(())
}

fn print_container(number: usize, container: &LoadedContainer) {
    println!("{}. {}", number, container.description);
    if let Some(header) = &container.header {
        let [major, minor, patch, build] = header.tool_version;
        let skew = if header.version_matches() { "" } else { " (version skew)" };
        println!("  Format version: {}{}", header.format_version, skew);
        println!("  Tool version:   {}.{}.{}.{}", major, minor, patch, build);
        println!("  Byte order:     {}", header.payload_endianness());
        println!("  Declared size:  {} bytes", header.file_size);
    }
    println!("  Files:          {}", container.file_count);
    println!("  Deletions:      {}", container.deleted_count);

    let timings = &container.timings;
    println!(
        "  Load time:      {:.2?} (header {:.2?}, folders {:.2?}, files {:.2?}, shortcuts {:.2?})",
        timings.total(),
        timings.header,
        timings.folders,
        timings.files,
        timings.shortcuts
    );
}
