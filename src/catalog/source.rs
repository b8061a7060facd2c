//! Label source discovery and parsing.
//!
//! A source is either a directory (walked recursively) or a glob pattern.
//! Globs are translated to an anchored regex and matched against every file
//! under the pattern's literal prefix directory.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::error::CatalogError;

/// Splits the raw contents of a label file into labels.
///
/// Entries are comma-separated and trimmed; empty entries are dropped.
/// Repeated labels are kept as-is.
pub fn parse_labels(content: &str) -> Vec<String> {
    content
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns true when the source string contains glob metacharacters.
pub fn is_glob(source: &str) -> bool {
    source.contains(['*', '?', '['])
}

/// Translates a glob pattern into an anchored regex.
///
/// `**` matches across directory separators, `*` and `?` do not.
/// Character classes (`[abc]`, negated `[!abc]`) map to regex classes.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, CatalogError> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                // "**/" also matches zero directories
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| CatalogError::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: "unterminated character class".to_string(),
                    })?;
                out.push('[');
                for (n, &ch) in chars[i + 1..close].iter().enumerate() {
                    match ch {
                        '!' if n == 0 => out.push_str("^/"),
                        '^' if n == 0 => out.push_str("\\^"),
                        '\\' => out.push_str("\\\\"),
                        '[' => out.push_str("\\["),
                        _ => out.push(ch),
                    }
                }
                out.push(']');
                i = close + 1;
                continue;
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    out.push('$');
    Regex::new(&out).map_err(|e| CatalogError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Longest leading run of path components without glob metacharacters.
fn literal_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in pattern.split('/') {
        if is_glob(component) {
            break;
        }
        if component.is_empty() && root.as_os_str().is_empty() {
            root.push("/");
            continue;
        }
        root.push(component);
    }
    if root.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        root
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == extension)
}

/// Resolves a source specification to a sorted list of label files.
///
/// Directories yield every file with the given extension. Glob patterns
/// yield every regular file matching the pattern. An empty result is an error.
pub fn resolve_sources(source: &str, extension: &str) -> Result<Vec<PathBuf>, CatalogError> {
    let mut files = Vec::new();

    if is_glob(source) {
        let matcher = glob_to_regex(source)?;
        let root = literal_root(source);
        if !root.exists() {
            return Err(CatalogError::MissingSource(root.display().to_string()));
        }
        // Walking "." yields "./"-prefixed paths the pattern does not carry.
        let strip_dot = !source.starts_with("./") && root == Path::new(".");
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let candidate = if strip_dot {
                path.strip_prefix(".").unwrap_or(path)
            } else {
                path
            };
            if matcher.is_match(&candidate.to_string_lossy()) {
                files.push(path.to_path_buf());
            }
        }
    } else {
        let root = Path::new(source);
        if !root.exists() {
            return Err(CatalogError::MissingSource(source.to_string()));
        }
        if root.is_file() {
            files.push(root.to_path_buf());
        } else {
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = entry?;
                if entry.file_type().is_file() && has_extension(entry.path(), extension) {
                    files.push(entry.into_path());
                }
            }
        }
    }

    if files.is_empty() {
        return Err(CatalogError::NoSources {
            source_spec: source.to_string(),
            extension: extension.to_string(),
        });
    }

    files.sort();
    Ok(files)
}
