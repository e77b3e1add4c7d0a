//! Integration tests for container directories.
//!
//! These tests build containers with the writer and verify the complete flow:
//! - parsing into a folder tree and reference table
//! - merging patches, including overwrites and tombstones
//! - shortcut and library lookups
//! - loading from files and list files
//!
//! Run with: `cargo test --test directory_integration`

use std::collections::HashSet;
use std::fs;

use tempfile::TempDir;

use kzb::directory::MAX_FOLDER_DEPTH;
use kzb::path::escape_name;
use kzb::writer::{ContainerBuilder, PayloadBuilder};
use kzb::{Directory, DirectoryError, DirectoryLoader, Endianness, FileType, Library};

// ============================================================================
// Helper Functions
// ============================================================================

/// Container with one binary file per path whose payload is the given text.
fn container(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = ContainerBuilder::new();
    for (path, payload) in files {
        builder
            .add_file(path, FileType::Binary, 0, PayloadBuilder::new().bytes(payload.as_bytes()))
            .unwrap();
    }
    builder.build().unwrap()
}

fn directory(files: &[(&str, &str)]) -> Directory {
    Directory::from_memory(container(files)).unwrap()
}

fn file_paths(directory: &Directory) -> Vec<String> {
    directory
        .root()
        .all_files()
        .into_iter()
        .map(|file| file.path().to_string())
        .collect()
}

/// Path of a file below `depth` nested folders named `d`.
fn nested_path(depth: usize) -> String {
    format!("{}leaf", "d/".repeat(depth))
}

fn read(directory: &Directory, path: &str) -> String {
    let file = directory.get_file(path).unwrap();
    String::from_utf8(directory.read_file(file).unwrap()).unwrap()
}

/// A small project: materials referenced by meshes, a library and a shortcut.
fn project() -> Vec<u8> {
    let mut builder = ContainerBuilder::new();
    builder
        .add_file("Materials/Red", FileType::Material, 0, PayloadBuilder::new().u32(0xFF0000))
        .unwrap()
        .add_file(
            "Objects/Box",
            FileType::Mesh,
            0,
            PayloadBuilder::new()
                .u32(2)
                .reference("Materials/Red")
                .reference("Textures/Wood"),
        )
        .unwrap()
        .add_file("Mesh Data/Box", FileType::Mesh, 0, PayloadBuilder::new())
        .unwrap()
        .add_file("Readme", FileType::Binary, 0, PayloadBuilder::new().bytes(b"hello"))
        .unwrap()
        .add_shortcut("TheBox", "Objects/Box")
        .unwrap()
        .add_folder("Empty/")
        .add_external("Textures/Wood");
    builder.build().unwrap()
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_folder_accounting() {
    let directory = Directory::from_memory(project()).unwrap();
    let root = directory.root();

    // Materials, Objects, Mesh Data, Shortcuts, Empty
    assert_eq!(root.folder_count_recursive(), 5);
    assert_eq!(root.file_count_recursive(), 5);
    assert!(directory.get_folder("Empty/").unwrap().is_empty());
    assert_eq!(root.files().len(), 1);
}

#[test]
fn test_reference_table_lists_every_file_and_external() {
    let directory = Directory::from_memory(project()).unwrap();
    let source = directory.sources().next().unwrap();

    let references = source.references();
    assert_eq!(references[0], None);

    let paths: HashSet<&str> = references[1..]
        .iter()
        .map(|path| path.as_deref().unwrap())
        .collect();
    let expected: HashSet<&str> = [
        "Materials/Red",
        "Objects/Box",
        "Mesh Data/Box",
        "Shortcuts/TheBox",
        "Readme",
        "Textures/Wood",
    ]
    .into_iter()
    .collect();
    assert_eq!(paths, expected);
    assert_eq!(references.len(), expected.len() + 1);

    for file in directory.root().all_files() {
        assert!(paths.contains(file.path()), "missing {}", file.path());
    }
}

#[test]
fn test_root_file_path_is_its_name() {
    let directory = Directory::from_memory(project()).unwrap();
    let readme = directory.get_file("Readme").unwrap();
    assert_eq!(readme.path(), "Readme");
    assert_eq!(read(&directory, "Readme"), "hello");
}

#[test]
fn test_references_resolve_to_paths() {
    let directory = Directory::from_memory(project()).unwrap();
    let mesh = directory.get_file("Objects/Box").unwrap();
    assert_eq!(mesh.file_type(), FileType::Mesh);

    assert_eq!(
        directory.file_references(mesh).unwrap(),
        vec![
            Some("Materials/Red".to_string()),
            Some("Textures/Wood".to_string())
        ]
    );

    let mut stream = directory.open_file(mesh).unwrap();
    assert_eq!(stream.read_u32().unwrap(), 2);
    assert_eq!(
        directory.read_reference(&mut stream, mesh).unwrap().as_deref(),
        Some("Materials/Red")
    );
}

#[test]
fn test_escaped_names() {
    let path = format!("Objects/{}", escape_name("a/b"));
    let directory = directory(&[(path.as_str(), "slash")]);

    let file = directory.get_file("Objects/a//b").unwrap();
    assert_eq!(file.name(), "a/b");
    assert_eq!(file.path(), "Objects/a//b");
    assert!(directory.get_folder("Objects/").unwrap().file("a/b").is_some());
    assert!(matches!(
        directory.get_file("Objects/a/b"),
        Err(DirectoryError::FolderNotFound(_))
    ));
}

#[test]
fn test_little_endian_payloads() {
    let mut builder = ContainerBuilder::new();
    builder
        .little_endian(true)
        .add_file("Values/x", FileType::Binary, 0, PayloadBuilder::new().u32(0x0102_0304))
        .unwrap();
    let directory = Directory::from_memory(builder.build().unwrap()).unwrap();

    let header = directory.header().unwrap();
    assert!(header.is_little_endian());
    assert_eq!(header.payload_endianness(), Endianness::Little.normalize());

    let file = directory.get_file("Values/x").unwrap();
    assert_eq!(directory.read_file(file).unwrap(), vec![4, 3, 2, 1]);
    assert_eq!(directory.open_file(file).unwrap().read_u32().unwrap(), 0x0102_0304);
}

#[test]
fn test_garbage_is_corrupt() {
    let err = Directory::from_memory(b"not a container at all".to_vec()).unwrap_err();
    assert!(matches!(err, DirectoryError::CorruptContainer(_)), "{err}");
}

#[test]
fn test_truncated_container_fails() {
    let bytes = project();
    for len in [0, 3, 20, bytes.len() / 2] {
        assert!(
            Directory::from_memory(bytes[..len].to_vec()).is_err(),
            "prefix of {len} bytes parsed"
        );
    }
}

#[test]
fn test_folder_named_with_separator() {
    let mut builder = ContainerBuilder::new();
    builder
        .add_file("a//b/file", FileType::Binary, 0, PayloadBuilder::new().bytes(b"inner"))
        .unwrap()
        .add_file("a/b", FileType::Binary, 0, PayloadBuilder::new().bytes(b"plain"))
        .unwrap();
    let directory = Directory::from_memory(builder.build().unwrap()).unwrap();

    let folder = directory.get_folder("a//b/").unwrap();
    assert_eq!(folder.name(), "a/b");
    assert!(directory.root().subfolder("a/b").is_some());
    assert!(directory.root().subfolder("a").is_some());

    let file = directory.get_file("a//b/file").unwrap();
    assert_eq!(file.name(), "file");
    assert_eq!(file.path(), "a//b/file");
    assert_eq!(read(&directory, "a//b/file"), "inner");
    assert_eq!(read(&directory, "a/b"), "plain");

    assert!(directory
        .sources()
        .next()
        .unwrap()
        .references()
        .iter()
        .any(|path| path.as_deref() == Some("a//b/file")));
}

#[test]
fn test_deeply_nested_container_is_corrupt() {
    let empty = ContainerBuilder::new().build().unwrap();
    let header_size = u32::from_be_bytes([empty[8], empty[9], empty[10], empty[11]]) as usize;

    // Directory block, then 200,000 folders that each open one subfolder.
    let mut bytes = empty[..header_size].to_vec();
    bytes.extend_from_slice(&u32::MAX.to_be_bytes());
    bytes.extend_from_slice(&0u32.to_be_bytes());
    for _ in 0..200_000 {
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&1u32.to_be_bytes());
    }

    let err = Directory::from_memory(bytes).unwrap_err();
    assert!(matches!(err, DirectoryError::CorruptContainer(_)), "{err}");
}

#[test]
fn test_nesting_limit_with_merge_and_delete() {
    let deepest = nested_path(MAX_FOLDER_DEPTH);
    let mut target = directory(&[(deepest.as_str(), "old"), ("top", "1")]);
    assert_eq!(target.root().folder_count_recursive(), MAX_FOLDER_DEPTH);

    target.merge(directory(&[(deepest.as_str(), "new")])).unwrap();
    assert_eq!(read(&target, &deepest), "new");

    let mut builder = ContainerBuilder::new();
    builder.delete(deepest.clone());
    target
        .merge(Directory::from_memory(builder.build().unwrap()).unwrap())
        .unwrap();
    assert_eq!(file_paths(&target), vec!["top".to_string()]);

    let too_deep = nested_path(MAX_FOLDER_DEPTH + 1);
    let err = Directory::from_memory(container(&[(too_deep.as_str(), "x")])).unwrap_err();
    assert!(matches!(err, DirectoryError::CorruptContainer(_)), "{err}");
}

// ============================================================================
// Lookups
// ============================================================================

#[test]
fn test_shortcut_redirects_lookup() {
    let directory = Directory::from_memory(project()).unwrap();
    assert_eq!(
        directory.shortcuts().get("TheBox").map(String::as_str),
        Some("Objects/Box")
    );
    assert_eq!(directory.actual_path("TheBox"), "Objects/Box");
    assert_eq!(directory.get_file("TheBox").unwrap().path(), "Objects/Box");
}

#[test]
fn test_non_alias_paths_are_literal() {
    let directory = Directory::from_memory(project()).unwrap();
    assert_eq!(directory.actual_path("Objects/Box"), "Objects/Box");

    let shortcut = directory.get_file("Shortcuts/TheBox").unwrap();
    assert_eq!(shortcut.file_type(), FileType::Shortcut);
    assert!(matches!(
        directory.get_file("Nothing"),
        Err(DirectoryError::FileNotFound(_))
    ));
}

#[test]
fn test_library_lookup() {
    let directory = Directory::from_memory(project()).unwrap();
    let mesh = directory
        .get_file_from_library(Library::Meshes, "Mesh Data/Box")
        .unwrap();
    assert_eq!(mesh.path(), "Mesh Data/Box");

    let err = directory
        .get_file_from_library(Library::Animations, "Animation Data/Spin")
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_library_lookup_rejects_paths_outside_library() {
    let directory = Directory::from_memory(project()).unwrap();
    for path in ["Box", "Objects/Box", "Mesh Data/"] {
        let err = directory
            .get_file_from_library(Library::Meshes, path)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotInLibrary { .. }), "{path}: {err}");
    }
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_merge_empty_is_identity() {
    let mut target = Directory::from_memory(project()).unwrap();
    let files = file_paths(&target);
    let shortcuts = target.shortcuts().clone();
    let folders = target.root().folder_count_recursive();

    target.merge(Directory::new()).unwrap();

    assert_eq!(file_paths(&target), files);
    assert_eq!(target.shortcuts(), &shortcuts);
    assert_eq!(target.root().folder_count_recursive(), folders);
    assert_eq!(target.source_count(), 1);
    assert_eq!(read(&target, "Readme"), "hello");
    assert_eq!(target.get_file("TheBox").unwrap().path(), "Objects/Box");
}

#[test]
fn test_merge_unites_folders() {
    let mut target = directory(&[("A/x", "1"), ("B/y", "2")]);
    target.merge(directory(&[("A/z", "3"), ("C/w", "4")])).unwrap();

    let a = target.get_folder("A/").unwrap();
    assert_eq!(a.files().keys().collect::<Vec<_>>(), vec!["x", "z"]);
    assert_eq!(target.root().folder_count_recursive(), 3);
    assert_eq!(target.root().file_count_recursive(), 4);
    assert_eq!(read(&target, "C/w"), "4");
}

#[test]
fn test_merge_overwrites_in_place() {
    let mut target = directory(&[("A/x", "old"), ("A/y", "keep")]);
    let patch = directory(&[("A/x", "new!")]);
    let patch_source = patch.sources().next().unwrap().id();

    target.merge(patch).unwrap();

    let a = target.get_folder("A/").unwrap();
    assert_eq!(a.files().keys().collect::<Vec<_>>(), vec!["x", "y"]);
    let x = target.get_file("A/x").unwrap();
    assert_eq!(x.source(), patch_source);
    assert_eq!(read(&target, "A/x"), "new!");
    assert_eq!(read(&target, "A/y"), "keep");
}

#[test]
fn test_tombstones_delete_files() {
    let mut target = directory(&[("A/x", "1"), ("A/y", "2")]);
    let mut builder = ContainerBuilder::new();
    builder.delete("A/x");
    target
        .merge(Directory::from_memory(builder.build().unwrap()).unwrap())
        .unwrap();

    assert!(target.get_file("A/x").unwrap_err().is_not_found());
    assert_eq!(read(&target, "A/y"), "2");
}

#[test]
fn test_unknown_tombstone_fails_without_changes() {
    let mut target = directory(&[("A/x", "1")]);
    let mut builder = ContainerBuilder::new();
    builder
        .add_file("A/x", FileType::Binary, 0, PayloadBuilder::new().bytes(b"2"))
        .unwrap()
        .delete("B/gone");
    let patch = Directory::from_memory(builder.build().unwrap()).unwrap();

    let err = target.merge(patch).unwrap_err();
    assert!(matches!(err, DirectoryError::ObjectNotFound { .. }));
    assert_eq!(read(&target, "A/x"), "1");
    assert_eq!(target.source_count(), 1);
}

#[test]
fn test_patch_shortcuts_are_merged() {
    let mut target = directory(&[("A/x", "1")]);
    let mut builder = ContainerBuilder::new();
    builder
        .add_file("B/y", FileType::Binary, 0, PayloadBuilder::new().bytes(b"2"))
        .unwrap()
        .add_shortcut("Why", "B/y")
        .unwrap();
    target
        .merge(Directory::from_memory(builder.build().unwrap()).unwrap())
        .unwrap();

    assert_eq!(read(&target, "Why"), "2");
}

// ============================================================================
// Loading from disk
// ============================================================================

#[test]
fn test_resource_backed_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("project.kzb");
    fs::write(&path, project()).unwrap();

    let directory = Directory::from_resource(&path).unwrap();
    let source = directory.sources().next().unwrap();
    assert_eq!(source.description(), path.display().to_string());
    assert_eq!(read(&directory, "Readme"), "hello");

    let mesh = directory.get_file("TheBox").unwrap();
    let description = directory.file_debug_description(mesh).unwrap();
    assert!(description.starts_with("Box (Source: "), "{description}");
}

#[test]
fn test_missing_resource() {
    let dir = TempDir::new().unwrap();
    assert!(Directory::from_resource(dir.path().join("missing.kzb")).is_err());
}

#[test]
fn test_loader_applies_list_in_order() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("base.kzb"), container(&[("A/x", "1"), ("A/y", "2")])).unwrap();

    let mut patch = ContainerBuilder::new();
    patch
        .add_file("A/x", FileType::Binary, 0, PayloadBuilder::new().bytes(b"3"))
        .unwrap()
        .delete("A/y");
    fs::write(dir.path().join("patch.kzb"), patch.build().unwrap()).unwrap();
    fs::write(dir.path().join("containers.txt"), "base.kzb\npatch.kzb\n").unwrap();

    let loader = DirectoryLoader::from_list_file(dir.path().join("containers.txt")).unwrap();
    let loaded = loader.loaded();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[1].deleted_count, 1);

    let directory = loader.into_directory();
    assert_eq!(read(&directory, "A/x"), "3");
    assert!(directory.get_file("A/y").is_err());
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every file written into a container can be found and read back.
        #[test]
        fn prop_all_files_readable(paths in prop::collection::hash_set("[A-C]/[a-e]{1,4}", 1..12)) {
            let files: Vec<(&str, &str)> = paths.iter().map(|p| (p.as_str(), p.as_str())).collect();
            let directory = directory(&files);

            prop_assert_eq!(directory.root().file_count_recursive(), paths.len());
            for path in &paths {
                prop_assert_eq!(read(&directory, path), path.clone());
            }
        }

        /// Merging is a union of the file paths of both sides.
        #[test]
        fn prop_merge_is_union(
            left in prop::collection::hash_set("[A-C]/[a-e]{1,3}", 0..8),
            right in prop::collection::hash_set("[A-C]/[a-e]{1,3}", 0..8),
        ) {
            let left_files: Vec<(&str, &str)> = left.iter().map(|p| (p.as_str(), "l")).collect();
            let right_files: Vec<(&str, &str)> = right.iter().map(|p| (p.as_str(), "r")).collect();

            let mut target = directory(&left_files);
            target.merge(directory(&right_files)).unwrap();

            let merged: HashSet<String> = target
                .root()
                .all_files()
                .into_iter()
                .map(|f| f.path().to_string())
                .collect();
            let expected: HashSet<String> = left.union(&right).cloned().collect();
            prop_assert_eq!(merged, expected);

            for path in &right {
                prop_assert_eq!(read(&target, path), "r");
            }
        }
    }
}
