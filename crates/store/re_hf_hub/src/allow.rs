use std::path::{Path, PathBuf};

use crate::HubError;

/// What gets uploaded from a `LeRobot` dataset folder.
pub const LEROBOT_DATASET_PATTERNS: &[&str] = &["data/**", "videos/**", "meta/**", "README.md"];

/// Glob patterns, matched against `/`-separated paths relative to the uploaded folder.
///
/// A file is uploaded if it matches any of the patterns.
#[derive(Debug, Clone)]
pub struct AllowList {
    patterns: Vec<glob::Pattern>,
}

impl AllowList {
    pub fn new(patterns: &[&str]) -> Result<Self, HubError> {
        let patterns = patterns
            .iter()
            .map(|pattern| glob::Pattern::new(pattern))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_allowed(&self, path_in_repo: &str) -> bool {
        const OPTIONS: glob::MatchOptions = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path_in_repo, OPTIONS))
    }
}

/// A local file, and where it goes in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadFile {
    pub path_in_repo: String,
    pub local_path: PathBuf,
    pub size: u64,
}

/// All files below `folder` that are allowed, in file name order.
pub(crate) fn collect_upload_files(
    folder: &Path,
    allow: &AllowList,
) -> Result<Vec<UploadFile>, HubError> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(folder)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path_in_repo = path_in_repo(folder, entry.path())?;
        if !allow.is_allowed(&path_in_repo) {
            re_log::trace!("Not uploading {path_in_repo}");
            continue;
        }

        let size = entry.metadata()?.len();

        files.push(UploadFile {
            path_in_repo,
            local_path: entry.into_path(),
            size,
        });
    }

    Ok(files)
}

fn path_in_repo(folder: &Path, path: &Path) -> Result<String, HubError> {
    let relative = path
        .strip_prefix(folder)
        .map_err(|_err| HubError::NonUtf8Path(path.to_owned()))?;

    let components = relative
        .components()
        .map(|component| {
            component
                .as_os_str()
                .to_str()
                .ok_or_else(|| HubError::NonUtf8Path(path.to_owned()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(components.join("/"))
}
