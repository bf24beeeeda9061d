use crate::HubError;

/// The longest repository name the Hub accepts.
const MAX_NAME_LEN: usize = 96;

/// A repository on the Hub: `name`, or `namespace/name`.
///
/// Without a namespace, the repository belongs to the owner of the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    namespace: Option<String>,
    name: String,
}

impl RepoId {
    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The same repository name, under another namespace.
    pub(crate) fn in_namespace(&self, namespace: &str) -> Self {
        Self {
            namespace: Some(namespace.to_owned()),
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl std::str::FromStr for RepoId {
    type Err = HubError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| HubError::InvalidRepoId {
            id: id.to_owned(),
            reason,
        };

        let (namespace, name) = match id.split_once('/') {
            Some((namespace, name)) => (Some(namespace), name),
            None => (None, id),
        };

        if name.contains('/') {
            return Err(invalid("expected `name` or `namespace/name`"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(invalid("the name is longer than 96 characters"));
        }

        for segment in namespace.into_iter().chain(std::iter::once(name)) {
            check_segment(segment).map_err(invalid)?;
        }

        Ok(Self {
            namespace: namespace.map(ToOwned::to_owned),
            name: name.to_owned(),
        })
    }
}

fn check_segment(segment: &str) -> Result<(), &'static str> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';

    if segment.is_empty() {
        return Err("empty namespace or name");
    }
    if !segment.chars().all(|c| is_word(c) || c == '-' || c == '.') {
        return Err("only letters, digits, '-', '_' and '.' are allowed");
    }
    if !segment.starts_with(is_word) || !segment.ends_with(is_word) {
        return Err("must start and end with a letter, digit or '_'");
    }
    if segment.contains("--") || segment.contains("..") {
        return Err("'--' and '..' are not allowed");
    }

    Ok(())
}
