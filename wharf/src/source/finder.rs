use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use walkdir::WalkDir;

use crate::error::WharfResult;
use crate::source::file;

/// Finds pending file drops in the input directory.
///
/// Only the directory itself is scanned; the `archive` subdirectory and
/// anything deeper is never picked up. Matches are ordered by the batch date
/// in their names so older drops of the same entity are processed first.
pub struct ExtractFinder {
    input_dir: PathBuf,
    patterns: Vec<String>,
}

impl ExtractFinder {
    /// Creates a finder over `input_dir` with `*`-wildcard file name patterns.
    pub fn new(input_dir: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            input_dir: input_dir.into(),
            patterns,
        }
    }

    /// Returns the matching files, oldest batch date first.
    ///
    /// Files whose name carries no parseable batch date come first, ordered by
    /// name; name order also breaks ties between same-date drops.
    pub fn find(&self) -> WharfResult<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.input_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.matches(entry.path()) {
                found.push(entry.into_path());
            }
        }

        found.sort_by_cached_key(|path| sort_key(path));
        Ok(found)
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        self.patterns
            .iter()
            .any(|pattern| matches_pattern(name, pattern))
    }
}

/// Orders drops by the batch date in their file names.
///
/// The `<ddmmyyyy>` suffix does not sort chronologically as text, so the date
/// is parsed out and the bare name kept only as a tiebreaker.
fn sort_key(path: &Path) -> (Option<NaiveDate>, PathBuf) {
    let date = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| file::parse_file_name(name).ok())
        .map(|(_, date)| date);
    (date, path.to_path_buf())
}

/// Matches a file name against a pattern where `*` spans any run of characters.
fn matches_pattern(name: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return name == pattern;
    }

    let first = segments[0];
    let last = segments[segments.len() - 1];
    if !name.starts_with(first) || !name.ends_with(last) {
        return false;
    }

    let mut rest = &name[first.len()..name.len() - last.len()];
    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(position) => rest = &rest[position + segment.len()..],
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(matches_pattern("cards_05042024.csv", "cards_*.csv"));
        assert!(matches_pattern("cards_05042024.csv", "*.csv"));
        assert!(matches_pattern("cards_05042024.csv", "cards_05042024.csv"));
        assert!(matches_pattern("cards_a_b.csv", "cards_*_*.csv"));
        assert!(!matches_pattern("cards_05042024.txt", "cards_*.csv"));
        assert!(!matches_pattern("accounts_05042024.csv", "cards_*.csv"));
        assert!(!matches_pattern("cards", "cards_*.csv"));
    }

    #[test]
    fn finder_skips_subdirectories_and_sorts() {
        let dir = std::env::temp_dir().join(format!("wharf-finder-{}", std::process::id()));
        let archive = dir.join("archive");
        fs::create_dir_all(&archive).unwrap();
        fs::write(dir.join("cards_02012024.csv"), "").unwrap();
        fs::write(dir.join("cards_01012024.csv"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();
        fs::write(archive.join("cards_31122023.csv.backup"), "").unwrap();

        let finder = ExtractFinder::new(&dir, vec!["cards_*.csv".into()]);
        let found = finder.find().unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["cards_01012024.csv", "cards_02012024.csv"]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn drops_are_ordered_by_batch_date_not_name() {
        let dir = std::env::temp_dir().join(format!("wharf-finder-dates-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        // Name order would put the February drop first.
        fs::write(dir.join("cards_02022024.csv"), "").unwrap();
        fs::write(dir.join("cards_05012024.csv"), "").unwrap();

        let finder = ExtractFinder::new(&dir, vec!["cards_*.csv".into()]);
        let found = finder.find().unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["cards_05012024.csv", "cards_02022024.csv"]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
