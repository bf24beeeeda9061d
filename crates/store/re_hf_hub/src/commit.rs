use std::io::Read as _;
use std::path::Path;

use base64::Engine as _;
use sha2::Digest as _;

use crate::HubError;

/// How many leading bytes of a file the Hub looks at to decide how it should be uploaded.
pub(crate) const SAMPLE_SIZE: u64 = 512;

/// One change to the repository, as part of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommitOperation {
    /// A (small) file sent inline with the commit.
    Regular {
        path_in_repo: String,
        content: Vec<u8>,
    },

    /// A file that has already been uploaded to LFS storage.
    Lfs {
        path_in_repo: String,
        oid: String,
        size: u64,
    },
}

impl CommitOperation {
    pub fn path_in_repo(&self) -> &str {
        match self {
            Self::Regular { path_in_repo, .. } | Self::Lfs { path_in_repo, .. } => path_in_repo,
        }
    }
}

#[derive(serde::Serialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
enum CommitLine<'a> {
    Header {
        summary: &'a str,
        description: &'a str,
    },
    File {
        content: String,
        path: &'a str,
        encoding: &'static str,
    },
    LfsFile {
        path: &'a str,
        algo: &'static str,
        oid: &'a str,
    },
}

/// The body of a commit request: one JSON object per line, header first.
pub(crate) fn commit_payload(
    summary: &str,
    operations: &[CommitOperation],
) -> Result<Vec<u8>, HubError> {
    let header = CommitLine::Header {
        summary,
        description: "",
    };

    let lines = operations.iter().map(|operation| match operation {
        CommitOperation::Regular {
            path_in_repo,
            content,
        } => CommitLine::File {
            content: base64::engine::general_purpose::STANDARD.encode(content),
            path: path_in_repo,
            encoding: "base64",
        },
        CommitOperation::Lfs {
            path_in_repo, oid, ..
        } => CommitLine::LfsFile {
            path: path_in_repo,
            algo: "sha256",
            oid,
        },
    });

    let mut payload = Vec::new();
    for line in std::iter::once(header).chain(lines) {
        serde_json::to_writer(&mut payload, &line)?;
        payload.push(b'\n');
    }
    Ok(payload)
}

/// Hex-encoded sha256 of the file's content, which is its LFS object id.
pub(crate) fn sha256_file(path: &Path) -> Result<String, HubError> {
    let mut file = std::fs::File::open(path).map_err(HubError::io(path))?;
    let mut hasher = sha2::Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(HubError::io(path))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Base64 of the first [`SAMPLE_SIZE`] bytes of the file.
pub(crate) fn sample(path: &Path) -> Result<String, HubError> {
    let file = std::fs::File::open(path).map_err(HubError::io(path))?;
    let mut head = Vec::new();
    file.take(SAMPLE_SIZE)
        .read_to_end(&mut head)
        .map_err(HubError::io(path))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(head))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_payload() {
        let operations = [
            CommitOperation::Regular {
                path_in_repo: "meta/info.json".to_owned(),
                content: b"{}".to_vec(),
            },
            CommitOperation::Lfs {
                path_in_repo: "data/chunk-000/episode_000000.parquet".to_owned(),
                oid: "abc123".to_owned(),
                size: 7,
            },
        ];

        let payload = commit_payload("Remove episodes [1]", &operations).unwrap();
        let payload = String::from_utf8(payload).unwrap();

        similar_asserts::assert_eq!(
            payload,
            concat!(
                r#"{"key":"header","value":{"summary":"Remove episodes [1]","description":""}}"#,
                "\n",
                r#"{"key":"file","value":{"content":"e30=","path":"meta/info.json","encoding":"base64"}}"#,
                "\n",
                r#"{"key":"lfsFile","value":{"path":"data/chunk-000/episode_000000.parquet","algo":"sha256","oid":"abc123"}}"#,
                "\n",
            )
        );
    }

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello world").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sample_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![0_u8; 2048]).unwrap();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(sample(&path).unwrap())
            .unwrap();
        assert_eq!(decoded.len(), SAMPLE_SIZE as usize);

        let small = dir.path().join("small.txt");
        std::fs::write(&small, "abc").unwrap();
        assert_eq!(sample(&small).unwrap(), "YWJj");
    }

    #[test]
    fn test_sha256_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            sha256_file(&dir.path().join("nope")),
            Err(HubError::IO(_, _))
        ));
    }
}
