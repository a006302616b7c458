use crate::HarvestError;
use std::io;
use std::path::Path;

/// One profile URL to harvest
///
/// Targets are opaque to the engine: they are only sliced, never rewritten.
pub type Target = String;

/// Reads a newline-delimited list file
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub fn read_list_file(path: &Path) -> io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Loads the ordered target sequence for a run
pub fn load_targets(path: &Path) -> Result<Vec<Target>, HarvestError> {
    let targets = read_list_file(path).map_err(|source| HarvestError::Targets {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_list_file_filters() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "https://soundcloud.com/a\n\n# skipped\n  https://soundcloud.com/b  \r\n#also\nhttps://soundcloud.com/c"
        )
        .unwrap();
        file.flush().unwrap();

        let lines = read_list_file(file.path()).unwrap();
        assert_eq!(
            lines,
            vec![
                "https://soundcloud.com/a",
                "https://soundcloud.com/b",
                "https://soundcloud.com/c"
            ]
        );
    }

    #[test]
    fn test_load_targets_missing_file() {
        let err = load_targets(Path::new("/nonexistent/users.txt")).unwrap_err();
        assert!(matches!(err, HarvestError::Targets { .. }));
    }
}
