use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize as _;
use serde_json::{Map, Value};

use crate::{EpisodeIndex, LeRobotError, RemovalSet};

const EPISODE_INDEX_FIELD: &str = "episode_index";
const TOTAL_EPISODES_FIELD: &str = "total_episodes";

/// Used when the indentation of a document can't be detected.
const DEFAULT_INDENT: &str = "    ";

/// The outcome of [`rewrite_episode_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRewrite {
    pub path: PathBuf,
    pub kept: usize,
    pub dropped: usize,
}

/// The outcome of [`update_total_episodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeCount {
    pub before: usize,
    pub after: usize,
}

/// A line of a `.jsonl` stream, and the episode it belongs to.
struct EpisodeRecord {
    fields: Map<String, Value>,
    episode: EpisodeIndex,
}

/// Parses every record of a line-delimited JSON stream of episode records.
///
/// Blank lines are skipped. Every other line must be a JSON object with an integer
/// `episode_index`.
fn load_episode_records(path: &Path) -> Result<Vec<EpisodeRecord>, LeRobotError> {
    let contents = std::fs::read_to_string(path).map_err(LeRobotError::io(path))?;

    let malformed = |line: usize, reason: String| LeRobotError::MalformedRecord {
        path: path.to_owned(),
        line,
        reason,
    };

    let mut records = Vec::new();
    for (line_idx, line) in contents.lines().enumerate() {
        let line_number = line_idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => return Err(malformed(line_number, "expected a JSON object".to_owned())),
            Err(err) => return Err(malformed(line_number, err.to_string())),
        };

        let episode = fields
            .get(EPISODE_INDEX_FIELD)
            .and_then(Value::as_u64)
            .and_then(|index| usize::try_from(index).ok())
            .map(EpisodeIndex)
            .ok_or_else(|| {
                malformed(
                    line_number,
                    format!("missing or invalid `{EPISODE_INDEX_FIELD}`"),
                )
            })?;

        records.push(EpisodeRecord { fields, episode });
    }

    Ok(records)
}

/// The `episode_index` of every record in a `.jsonl` stream.
pub fn read_episode_indices(path: &Path) -> Result<BTreeSet<EpisodeIndex>, LeRobotError> {
    Ok(load_episode_records(path)?
        .into_iter()
        .map(|record| record.episode)
        .collect())
}

/// Drops the records of removed episodes and renumbers the rest.
///
/// All other fields are kept as they are, and so is the order of the records.
/// The stream is replaced atomically, so it is left untouched if anything fails.
pub fn rewrite_episode_stream(
    path: &Path,
    removal: &RemovalSet,
) -> Result<StreamRewrite, LeRobotError> {
    let records = load_episode_records(path)?;
    let total = records.len();

    let mut contents = Vec::new();
    let mut kept = 0;
    for EpisodeRecord {
        mut fields,
        episode,
    } in records
    {
        let Some(new_episode) = removal.new_index(episode) else {
            continue;
        };

        // Replaces the value in place, so the key keeps its position.
        fields.insert(EPISODE_INDEX_FIELD.to_owned(), Value::from(new_episode.0));

        serde_json::to_writer(&mut contents, &fields).map_err(|source| LeRobotError::Json {
            path: path.to_owned(),
            source,
        })?;
        contents.push(b'\n');
        kept += 1;
    }

    write_atomically(path, &contents)?;

    Ok(StreamRewrite {
        path: path.to_owned(),
        kept,
        dropped: total - kept,
    })
}

/// Subtracts `removed` from `total_episodes` in `info.json`.
///
/// The document is written back pretty-printed with its original indentation,
/// keeping all other fields in their original order.
pub fn update_total_episodes(path: &Path, removed: usize) -> Result<EpisodeCount, LeRobotError> {
    let text = std::fs::read_to_string(path).map_err(LeRobotError::io(path))?;
    let mut info: Value = serde_json::from_str(&text).map_err(|source| LeRobotError::Json {
        path: path.to_owned(),
        source,
    })?;

    let missing_field = || LeRobotError::MissingField {
        path: path.to_owned(),
        field: TOTAL_EPISODES_FIELD,
    };

    let fields = info.as_object_mut().ok_or_else(missing_field)?;
    let before = fields
        .get(TOTAL_EPISODES_FIELD)
        .and_then(Value::as_u64)
        .and_then(|total| usize::try_from(total).ok())
        .ok_or_else(missing_field)?;

    let after = before.checked_sub(removed).unwrap_or_else(|| {
        re_log::warn!(
            "{} claims {before} episode(s) but {removed} were removed; clamping to 0",
            path.display()
        );
        0
    });
    fields.insert(TOTAL_EPISODES_FIELD.to_owned(), Value::from(after));

    let indent = detect_indent(&text);
    let mut contents = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut contents, formatter);
    info.serialize(&mut serializer)
        .map_err(|source| LeRobotError::Json {
            path: path.to_owned(),
            source,
        })?;
    if text.ends_with('\n') {
        contents.push(b'\n');
    }

    write_atomically(path, &contents)?;

    Ok(EpisodeCount { before, after })
}

/// The leading whitespace of the first indented line, which is one level deep.
fn detect_indent(text: &str) -> &str {
    text.lines()
        .skip(1)
        .map(|line| {
            let content = line.trim_start_matches([' ', '\t']);
            &line[..line.len() - content.len()]
        })
        .find(|indent| !indent.is_empty())
        .unwrap_or(DEFAULT_INDENT)
}

/// Writes to a temporary file next to `path`, then renames it over `path`.
///
/// The permissions of an existing `path` are carried over.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), LeRobotError> {
    let dir = path
        .parent()
        .ok_or_else(|| LeRobotError::InvalidRoot(path.to_owned()))?;

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(LeRobotError::io(dir))?;
    file.write_all(contents)
        .and_then(|()| file.as_file().sync_all())
        .map_err(LeRobotError::io(file.path()))?;

    if let Ok(metadata) = std::fs::metadata(path) {
        std::fs::set_permissions(file.path(), metadata.permissions())
            .map_err(LeRobotError::io(file.path()))?;
    }

    file.persist(path)
        .map_err(|err| LeRobotError::IO(err.error, path.to_owned()))?;

    Ok(())
}
