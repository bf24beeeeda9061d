use std::collections::HashMap;
use std::path::Path;

use itertools::Itertools as _;

use crate::allow::{UploadFile, collect_upload_files};
use crate::commit::{CommitOperation, commit_payload, sample, sha256_file};
use crate::{AllowList, DatasetRegistry, HubConfig, HubError, RepoId};

/// How many files are sent to the preupload and LFS batch endpoints at once.
const BATCH_SIZE: usize = 256;

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

type Response = ureq::http::Response<ureq::Body>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoCreation {
    Created,
    AlreadyExists,
}

/// The result of [`HubClient::upload_folder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    /// Where the commit can be seen, if one was made.
    pub commit_url: Option<String>,

    /// Number of files in the commit.
    pub num_files: usize,
}

/// Talks to the Hugging Face Hub over HTTP.
pub struct HubClient {
    config: HubConfig,
    agent: ureq::Agent,
}

impl HubClient {
    pub fn new(config: HubConfig) -> Result<Self, HubError> {
        url::Url::parse(config.endpoint())
            .map_err(|err| HubError::InvalidEndpoint(config.endpoint().to_owned(), err))?;

        // Non-2xx responses are turned into errors by us, so that we get to see the body.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self { config, agent })
    }

    pub fn from_env() -> Result<Self, HubError> {
        Self::new(HubConfig::from_env())
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Creates a dataset repository, unless it already exists.
    pub fn create_dataset_repo(
        &self,
        repo: &RepoId,
        private: bool,
    ) -> Result<RepoCreation, HubError> {
        let url = self.url("/api/repos/create");

        re_log::info!("Creating dataset repo {repo}…");
        let response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(CreateRepoRequest {
                kind: "dataset",
                name: repo.name(),
                organization: repo.namespace(),
                private,
            })?;

        if response.status().as_u16() == 409 {
            re_log::info!("Dataset repo {repo} already exists");
            return Ok(RepoCreation::AlreadyExists);
        }

        check_status(&url, response)?;
        Ok(RepoCreation::Created)
    }

    /// Uploads every allowed file in `folder` to the `main` branch, as a single commit.
    pub fn upload_folder(
        &self,
        repo: &RepoId,
        folder: &Path,
        allow: &AllowList,
        commit_message: &str,
    ) -> Result<CommitInfo, HubError> {
        let repo = self.resolve_namespace(repo)?;

        let files = collect_upload_files(folder, allow)?;
        if files.is_empty() {
            re_log::warn!("Nothing to upload in {}", folder.display());
            return Ok(CommitInfo::default());
        }

        re_log::info!("Uploading {} files to {repo}…", files.len());

        let modes = self.preupload(&repo, &files)?;

        let mut operations = Vec::with_capacity(files.len());
        for file in &files {
            match modes.get(&file.path_in_repo) {
                Some(Verdict { should_ignore: true, .. }) => {
                    re_log::debug!("The Hub ignores {}", file.path_in_repo);
                }

                Some(Verdict {
                    upload_mode: UploadMode::Regular,
                    ..
                }) => {
                    let content = std::fs::read(&file.local_path)
                        .map_err(HubError::io(&file.local_path))?;
                    operations.push(CommitOperation::Regular {
                        path_in_repo: file.path_in_repo.clone(),
                        content,
                    });
                }

                Some(Verdict {
                    upload_mode: UploadMode::Lfs,
                    ..
                })
                | None => {
                    operations.push(CommitOperation::Lfs {
                        path_in_repo: file.path_in_repo.clone(),
                        oid: sha256_file(&file.local_path)?,
                        size: file.size,
                    });
                }
            }
        }

        self.upload_lfs_objects(&repo, &files, &operations)?;

        let commit_url = self.commit(&repo, commit_message, &operations)?;
        re_log::info!("Upload complete: {}", commit_url.as_deref().unwrap_or("(no url)"));

        Ok(CommitInfo {
            commit_url,
            num_files: operations.len(),
        })
    }

    /// Repositories without a namespace belong to whoever owns the token.
    fn resolve_namespace(&self, repo: &RepoId) -> Result<RepoId, HubError> {
        if repo.namespace().is_some() {
            return Ok(repo.clone());
        }

        let url = self.url("/api/whoami-v2");
        let response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer()?)
            .call()?;
        let whoami: WhoAmI = check_status(&url, response)?.body_mut().read_json()?;

        Ok(repo.in_namespace(&whoami.name))
    }

    /// Asks the Hub which files should go through LFS.
    fn preupload(
        &self,
        repo: &RepoId,
        files: &[UploadFile],
    ) -> Result<HashMap<String, Verdict>, HubError> {
        let url = self.url(&format!("/api/datasets/{repo}/preupload/main"));

        let mut verdicts = HashMap::with_capacity(files.len());
        for batch in files.chunks(BATCH_SIZE) {
            let files = batch
                .iter()
                .map(|file| {
                    Ok(PreuploadFile {
                        path: &file.path_in_repo,
                        size: file.size,
                        sample: sample(&file.local_path)?,
                    })
                })
                .collect::<Result<Vec<_>, HubError>>()?;

            let response = self
                .agent
                .post(&url)
                .header("Authorization", &self.bearer()?)
                .send_json(PreuploadRequest { files })?;
            let response: PreuploadResponse =
                check_status(&url, response)?.body_mut().read_json()?;

            verdicts.extend(
                response
                    .files
                    .into_iter()
                    .map(|verdict| (verdict.path.clone(), verdict)),
            );
        }

        Ok(verdicts)
    }

    /// Uploads the LFS objects the Hub doesn't have yet.
    fn upload_lfs_objects(
        &self,
        repo: &RepoId,
        files: &[UploadFile],
        operations: &[CommitOperation],
    ) -> Result<(), HubError> {
        let url = self.url(&format!("/datasets/{repo}.git/info/lfs/objects/batch"));

        let local_paths: HashMap<&str, &Path> = files
            .iter()
            .map(|file| (file.path_in_repo.as_str(), file.local_path.as_path()))
            .collect();

        let lfs_objects = operations
            .iter()
            .filter_map(|operation| match operation {
                CommitOperation::Lfs {
                    path_in_repo,
                    oid,
                    size,
                } => Some((path_in_repo.as_str(), oid.as_str(), *size)),
                CommitOperation::Regular { .. } => None,
            })
            .collect_vec();

        for batch in lfs_objects.chunks(BATCH_SIZE) {
            let request = LfsBatchRequest {
                operation: "upload",
                transfers: ["basic"],
                objects: batch
                    .iter()
                    .map(|&(_, oid, size)| LfsObject { oid, size })
                    .collect(),
                hash_algo: "sha256",
                reference: LfsRef {
                    name: "refs/heads/main",
                },
            };

            let response = self
                .agent
                .post(&url)
                .header("Authorization", &self.bearer()?)
                .header("Accept", LFS_CONTENT_TYPE)
                .header("Content-Type", LFS_CONTENT_TYPE)
                .send(&serde_json::to_vec(&request)?[..])?;
            let response: LfsBatchResponse =
                check_status(&url, response)?.body_mut().read_json()?;

            for object in response.objects {
                // The same content can live at several paths.
                let Some(&(path_in_repo, _, _)) =
                    batch.iter().find(|(_, oid, _)| *oid == object.oid)
                else {
                    re_log::warn!("Unexpected LFS object {} in batch response", object.oid);
                    continue;
                };

                if let Some(error) = object.error {
                    return Err(HubError::LfsRejected {
                        path: path_in_repo.to_owned(),
                        message: format!("{} ({})", error.message, error.code),
                    });
                }

                let Some(upload) = object.actions.as_ref().and_then(|a| a.upload.as_ref()) else {
                    re_log::debug!("{path_in_repo} is already on the Hub");
                    continue;
                };

                let Some(local_path) = local_paths.get(path_in_repo) else {
                    continue;
                };
                self.upload_lfs_object(path_in_repo, local_path, upload)?;

                if let Some(verify) = object.actions.as_ref().and_then(|a| a.verify.as_ref()) {
                    self.verify_lfs_object(verify, &object.oid, object.size)?;
                }
            }
        }

        Ok(())
    }

    fn upload_lfs_object(
        &self,
        path_in_repo: &str,
        local_path: &Path,
        upload: &LfsAction,
    ) -> Result<(), HubError> {
        re_log::debug!("Uploading {path_in_repo} to LFS storage…");

        // Single PUT, so files are limited to 5 GB.
        let content = std::fs::read(local_path).map_err(HubError::io(local_path))?;

        let mut request = self.agent.put(&upload.href);
        for (name, value) in &upload.header {
            request = request.header(name.as_str(), value.as_str());
        }
        check_status(&upload.href, request.send(&content[..])?)?;

        Ok(())
    }

    fn verify_lfs_object(&self, verify: &LfsAction, oid: &str, size: u64) -> Result<(), HubError> {
        let mut request = self
            .agent
            .post(&verify.href)
            .header("Authorization", &self.bearer()?)
            .header("Accept", LFS_CONTENT_TYPE)
            .header("Content-Type", LFS_CONTENT_TYPE);
        for (name, value) in &verify.header {
            request = request.header(name.as_str(), value.as_str());
        }

        let body = serde_json::to_vec(&LfsObject { oid, size })?;
        check_status(&verify.href, request.send(&body[..])?)?;

        Ok(())
    }

    fn commit(
        &self,
        repo: &RepoId,
        summary: &str,
        operations: &[CommitOperation],
    ) -> Result<Option<String>, HubError> {
        let url = self.url(&format!("/api/datasets/{repo}/commit/main"));

        re_log::debug!(
            "Committing {}",
            operations.iter().map(CommitOperation::path_in_repo).join(", ")
        );

        let payload = commit_payload(summary, operations)?;
        let response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer()?)
            .header("Content-Type", "application/x-ndjson")
            .send(&payload[..])?;
        let response: CommitResponse = check_status(&url, response)?.body_mut().read_json()?;

        re_log::debug!("Commit {}", response.commit_oid.as_deref().unwrap_or("?"));
        Ok(response.commit_url)
    }

    /// `{endpoint}{path}`
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.endpoint())
    }

    fn bearer(&self) -> Result<String, HubError> {
        let token = self.config.token().ok_or(HubError::MissingToken)?;
        Ok(format!("Bearer {token}"))
    }
}

impl DatasetRegistry for HubClient {
    fn ensure_dataset_repo(&self, repo: &RepoId, private: bool) -> Result<RepoCreation, HubError> {
        self.create_dataset_repo(repo, private)
    }

    fn upload_folder(
        &self,
        repo: &RepoId,
        folder: &Path,
        allow: &AllowList,
        commit_message: &str,
    ) -> Result<CommitInfo, HubError> {
        Self::upload_folder(self, repo, folder, allow, commit_message)
    }
}

fn check_status(url: &str, mut response: Response) -> Result<Response, HubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(HubError::Status {
        url: url.to_owned(),
        status: status.as_u16(),
        body,
    })
}

#[derive(serde::Serialize)]
struct CreateRepoRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
    private: bool,
}

#[derive(serde::Deserialize)]
struct WhoAmI {
    name: String,
}

#[derive(serde::Serialize)]
struct PreuploadRequest<'a> {
    files: Vec<PreuploadFile<'a>>,
}

#[derive(serde::Serialize)]
struct PreuploadFile<'a> {
    path: &'a str,
    size: u64,
    sample: String,
}

#[derive(serde::Deserialize)]
struct PreuploadResponse {
    files: Vec<Verdict>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Verdict {
    path: String,
    upload_mode: UploadMode,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum UploadMode {
    Regular,
    Lfs,
}

#[derive(serde::Serialize)]
struct LfsBatchRequest<'a> {
    operation: &'static str,
    transfers: [&'static str; 1],
    objects: Vec<LfsObject<'a>>,
    hash_algo: &'static str,
    #[serde(rename = "ref")]
    reference: LfsRef,
}

#[derive(serde::Serialize)]
struct LfsObject<'a> {
    oid: &'a str,
    size: u64,
}

#[derive(serde::Serialize)]
struct LfsRef {
    name: &'static str,
}

#[derive(serde::Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObjectResponse>,
}

#[derive(serde::Deserialize)]
struct LfsObjectResponse {
    oid: String,
    size: u64,
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(serde::Deserialize)]
struct LfsActions {
    #[serde(default)]
    upload: Option<LfsAction>,
    #[serde(default)]
    verify: Option<LfsAction>,
}

#[derive(serde::Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(serde::Deserialize)]
struct LfsObjectError {
    code: i64,
    message: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    commit_url: Option<String>,
    #[serde(default)]
    commit_oid: Option<String>,
}
