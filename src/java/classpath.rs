use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Suffix marking a pattern whose directory is walked recursively for jars.
pub const RECURSIVE_MARKER: &str = "/**";

/// Resolves classpath patterns relative to `basedir`, preserving pattern order.
///
/// A file pattern is taken as-is, a directory contributes its regular files
/// (not recursive) and a `dir/**` pattern contributes every `*.jar` below
/// `dir`. Missing or unreadable entries are logged and skipped.
pub fn create_classpath(basedir: &str, patterns: &[String]) -> Vec<String> {
    let mut classpath = Vec::new();

    for pattern in patterns {
        let joined = join_pattern(basedir, pattern);

        if let Some(root) = joined.strip_suffix(RECURSIVE_MARKER) {
            let mut jars = Vec::new();
            match walk_jars(Path::new(root), &mut jars) {
                Ok(()) => classpath.extend(jars.iter().map(|jar| jar.display().to_string())),
                Err(err) => warn!("cannot walk classpath directory {joined}: {err}"),
            }
            continue;
        }

        let path = PathBuf::from(&joined);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("classpath entry {joined} does not exist");
                continue;
            }
            Err(err) => {
                warn!("classpath entry {joined} could not be read: {err}");
                continue;
            }
        };

        if metadata.is_dir() {
            match regular_files(&path) {
                Ok(files) => classpath.extend(files.iter().map(|file| file.display().to_string())),
                Err(err) => warn!("cannot list classpath directory {joined}: {err}"),
            }
        } else if metadata.is_file() {
            classpath.push(joined);
        }
    }

    classpath
}

fn join_pattern(basedir: &str, pattern: &str) -> String {
    let joined = if basedir.is_empty() {
        pattern.to_string()
    } else {
        format!(
            "{}/{}",
            basedir.trim_end_matches('/'),
            pattern.trim_start_matches('/')
        )
    };

    if joined.len() > 1 && !joined.ends_with(RECURSIVE_MARKER) {
        joined.trim_end_matches('/').to_string()
    } else {
        joined
    }
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(children)
}

fn regular_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for child in sorted_entries(dir)? {
        if fs::symlink_metadata(&child)?.file_type().is_file() {
            files.push(child);
        }
    }
    Ok(files)
}

fn walk_jars(dir: &Path, jars: &mut Vec<PathBuf>) -> io::Result<()> {
    for child in sorted_entries(dir)? {
        let metadata = fs::symlink_metadata(&child)?;
        if metadata.is_dir() {
            walk_jars(&child, jars)?;
        } else if child.extension().is_some_and(|ext| ext == "jar") {
            jars.push(child);
        }
    }
    Ok(())
}
