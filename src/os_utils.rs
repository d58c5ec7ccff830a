//! Filesystem and process-level setup
//!

use camino::Utf8Path;

/// Create the directory and any missing parents
///
/// Nothing is done if the directory already exists.
///
/// * `label` - describes the directory in the error message
///
pub fn create_dir_all(dir: &Utf8Path, label: &str) {
    if dir.is_dir() {
        return;
    }
    if let Err(e) = std::fs::create_dir_all(dir) {
        panic!("Can't create new {} directory at '{}': {}", label, dir, e);
    }
}

/// Raise the open file soft limit to the hard limit where supported
///
/// Each worker thread holds its own alignment file handle, so the default limit can be low for
/// large thread counts. Failure is silently ignored.
///
pub fn attempt_max_open_file_limit() {
    use rlimit::Resource;

    if let Ok((soft, hard)) = Resource::NOFILE.get()
        && soft < hard
    {
        rlimit::setrlimit(Resource::NOFILE, hard, hard).unwrap_or_default();
    }
}
