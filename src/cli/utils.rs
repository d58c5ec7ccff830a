use camino::Utf8Path;
use simple_error::{SimpleResult, bail};

/// Check a required input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_required_filename(filename: &Utf8Path, label: &str) -> SimpleResult<()> {
    if filename.as_str().is_empty() {
        bail!("Must specify {} file", label);
    }
    check_existing_file(filename, label)
}

/// Check an optional input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_optional_filename(filename: Option<&Utf8Path>, label: &str) -> SimpleResult<()> {
    match filename {
        Some(x) => check_existing_file(x, label),
        None => Ok(()),
    }
}

fn check_existing_file(filename: &Utf8Path, label: &str) -> SimpleResult<()> {
    if !filename.exists() {
        bail!("Can't find specified {} file: '{}'", label, filename);
    }
    if !filename.is_file() {
        bail!(
            "Specified {} file path does not appear to be a file: '{}'",
            label,
            filename
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_filenames() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let filename = Utf8Path::from_path(file.path()).unwrap();
        assert!(check_required_filename(filename, "test").is_ok());
        assert!(check_required_filename(Utf8Path::new(""), "test").is_err());

        let dir = tempfile::tempdir().unwrap();
        let dirname = Utf8Path::from_path(dir.path()).unwrap();
        assert!(check_required_filename(dirname, "test").is_err());
        let missing = dirname.join("not_there");
        assert!(check_optional_filename(Some(missing.as_path()), "test").is_err());
        assert!(check_optional_filename(None, "test").is_ok());
    }
}
