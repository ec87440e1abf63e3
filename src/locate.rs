use color_eyre::eyre::{Context, Result};
use glob::glob;
use log::debug;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One discovered log: where it lives and which sample it belongs to.
#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub sample: String,
}

// tool-report suffixes stripped when inferring a sample name from a filename
const REPORT_SUFFIXES: &[&str] = &["Log.final.out", ".kreport", ".report", ".txt"];

/// Finds log files under `root` whose filename matches `pattern`, plus their
/// gzipped variants. Paths come back sorted so runs are deterministic.
pub fn find_log_files(root: &Path, pattern: &str) -> Result<Vec<LogFile>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for pattern in [pattern.to_string(), format!("{pattern}.gz")] {
        let full_pattern = root.join("**").join(&pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();
        let matches = glob(&full_pattern)
            .wrap_err_with(|| format!("Invalid log file pattern: {full_pattern}"))?;
        paths.extend(
            matches
                .filter_map(std::result::Result::ok)
                .filter(|path| path.is_file()),
        );
    }
    paths.sort();
    paths.dedup();

    debug!("Found {} files matching '{pattern}'", paths.len());
    Ok(paths
        .into_iter()
        .map(|path| LogFile {
            sample: sample_name(&path),
            path,
        })
        .collect())
}

/// Infers the sample name from a log filename by stripping compression and
/// tool-report suffixes. Files named after the tool alone (e.g. a bare
/// `Log.final.out`) take their parent directory's name instead.
pub fn sample_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name = file_name.as_str();
    if let Some(stripped) = name.strip_suffix(".gz") {
        name = stripped;
    }
    loop {
        let before = name;
        for suffix in REPORT_SUFFIXES {
            if let Some(stripped) = name.strip_suffix(suffix) {
                name = stripped;
            }
        }
        name = name.trim_end_matches(['.', '_', '-']);
        if name == before {
            break;
        }
    }

    if !name.is_empty() {
        return name.to_string();
    }
    path.parent()
        .and_then(|dir| dir.file_name())
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or(file_name)
}

/// Reads a log to a string, transparently decompressing gzipped files.
/// The handle is scoped to this call and released on return either way.
pub fn read_log(path: &Path) -> Result<String> {
    let (mut reader, format) = match niffler::from_path(path) {
        Ok(pair) => pair,
        // too short for compression sniffing means an empty or tiny log
        Err(niffler::Error::FileTooShort) => return Ok(String::new()),
        Err(err) => {
            return Err(err)
                .wrap_err_with(|| format!("Failed to open log file: {}", path.display()))
        }
    };
    debug!(
        "Detected input compression type for file {} as: {format:?}",
        path.display()
    );

    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .wrap_err_with(|| format!("Failed to read log file: {}", path.display()))?;
    Ok(content)
}
