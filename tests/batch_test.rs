//! Atomicity and ordering tests for the file batch orchestrator

#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tidyfmt::batch::{build_pool, format_files};
use tidyfmt::reader::read_map;
use tidyfmt::{Config, Formatter, OpOptions, TextFormatter};

fn engine() -> TextFormatter {
    TextFormatter::new(Config::default()).unwrap()
}

fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_success_matches_engine_output() {
    let dir = TempDir::new().unwrap();
    let before = "\t(a  \r\n\n\n\n\n  b)\t\n";
    let path = write(dir.path(), "a.txt", before.as_bytes());
    let expected = engine().format(before, "a.txt").unwrap();

    let result = format_files(&[path.clone()], &engine(), None);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.changed, 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), expected);
}

#[test]
fn test_failed_file_is_byte_for_byte_unchanged() {
    let dir = TempDir::new().unwrap();
    let before = b"(b]\t  \r\n\n\n";
    let path = write(dir.path(), "b.txt", before);

    let result = format_files(&[path.clone()], &engine(), None);
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_invalid_utf8_is_a_read_failure() {
    let dir = TempDir::new().unwrap();
    let before = [b'(', 0xff, 0xfe, b')', b' ', b'\n'];
    let path = write(dir.path(), "bin.txt", &before);

    let result = format_files(&[path.clone()], &engine(), None);
    assert_eq!(result.exit_code, 1);
    assert!(result.diagnostics[0].contains("unable to read"));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_directory_is_a_read_failure() {
    let dir = TempDir::new().unwrap();
    let result = format_files(&[dir.path().to_path_buf()], &engine(), None);
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.diagnostics.len(), 1);
}

#[test]
fn test_already_formatted_files_are_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "a.txt", b"(a)\n\n(b)\n");
    let result = format_files(&[path.clone()], &engine(), None);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.formatted, 1);
    assert_eq!(result.changed, 0);
}

#[test]
fn test_parallel_diagnostics_follow_input_order() {
    let dir = TempDir::new().unwrap();
    let files: Vec<PathBuf> = (0..32)
        .map(|i| {
            let contents = if i % 3 == 0 { "(x))\n" } else { "(x)  \n" };
            write(dir.path(), &format!("{i:02}.txt"), contents.as_bytes())
        })
        .collect();
    let op = OpOptions::extract(&read_map("{:jobs 4}").unwrap());
    let pool = build_pool(&op, files.len()).unwrap();

    let result = format_files(&files, &engine(), Some(&pool));
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.failed, 11);
    assert_eq!(result.formatted, 21);

    let failed: Vec<String> = files
        .iter()
        .step_by(3)
        .map(|p| format!("Failed to format file: {}:", p.display()))
        .collect();
    assert_eq!(result.diagnostics.len(), failed.len());
    for (line, prefix) in result.diagnostics.iter().zip(&failed) {
        assert!(line.starts_with(prefix), "{line}");
    }
    for (i, file) in files.iter().enumerate() {
        let expected = if i % 3 == 0 { "(x))\n" } else { "(x)\n" };
        assert_eq!(fs::read_to_string(file).unwrap(), expected);
    }
}

#[cfg(unix)]
#[test]
fn test_permissions_survive_rewrite() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "script.txt", b"(a)  \n");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o754)).unwrap();

    let result = format_files(&[path.clone()], &engine(), None);
    assert_eq!(result.changed, 1);
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o754);
}

#[cfg(unix)]
#[test]
fn test_symlink_target_is_rewritten_and_link_kept() {
    let dir = TempDir::new().unwrap();
    let real = write(dir.path(), "real.txt", b"(a)   \n");
    let link = dir.path().join("link.txt");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let result = format_files(&[link.clone()], &engine(), None);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.changed, 1);
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_to_string(&real).unwrap(), "(a)\n");
}
