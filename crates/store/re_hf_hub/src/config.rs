use std::path::PathBuf;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Where the Hub is, and who we are to it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HubConfig {
    endpoint: Option<String>,
    token: Option<String>,
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("endpoint", &self.endpoint())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HubConfig {
    /// Reads the configuration the same way the Hugging Face tooling does.
    ///
    /// The endpoint comes from `HF_ENDPOINT`.
    /// The token comes from `HF_TOKEN` or `HUGGING_FACE_HUB_TOKEN`, or else from the token file
    /// written by `huggingface-cli login`: `HF_TOKEN_PATH`, `$HF_HOME/token`, or
    /// `~/.cache/huggingface/token`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), home::home_dir())
    }

    /// Like [`Self::from_env`], with explicit environment variables and home directory.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>, home_dir: Option<PathBuf>) -> Self {
        let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let endpoint = non_empty("HF_ENDPOINT");

        let token = non_empty("HF_TOKEN")
            .or_else(|| non_empty("HUGGING_FACE_HUB_TOKEN"))
            .or_else(|| {
                let path = token_path(&non_empty, home_dir)?;
                match std::fs::read_to_string(&path) {
                    Ok(token) => Some(token),
                    Err(err) => {
                        re_log::debug!("No token at {}: {err}", path.display());
                        None
                    }
                }
            })
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty());

        Self { endpoint, token }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The base URL of the Hub, without trailing slash.
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

fn token_path(env: &impl Fn(&str) -> Option<String>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = env("HF_TOKEN_PATH") {
        return Some(path.into());
    }
    if let Some(hf_home) = env("HF_HOME") {
        return Some(PathBuf::from(hf_home).join("token"));
    }

    let cache_dir = env("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".cache")))?;
    Some(cache_dir.join("huggingface").join("token"))
}
