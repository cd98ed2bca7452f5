//! Data model for the registry: content hashes, snapshots, project paths,
//! and the project/file records that make up a snapshot's tree.

use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading metadata: {0}")]
    IO(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Missing required field `{0}` in protato.root.yaml")]
    MissingField(String),
}

/// An opaque content identifier: the hex string of the underlying
/// content-addressed store's hash function applied to an object's bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(String);

impl Hash {
    pub fn new(hex: impl Into<String>) -> Hash {
        Hash(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 7 characters, the conventional short form.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(7).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl From<String> for Hash {
    fn from(value: String) -> Self {
        Hash(value)
    }
}

impl From<&str> for Hash {
    fn from(value: &str) -> Self {
        Hash(value.to_string())
    }
}

/// A Hash identifying a commit in the registry. An omitted snapshot (`None`
/// at the call site, not represented here) means "resolve now from
/// FETCH_HEAD, fall back to HEAD" — see `Cache::snapshot`.
pub type Snapshot = Hash;

/// A slash-separated, hierarchical path such as `team/service`.
/// `a/b/c` is considered inside `a/b`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectPath(String);

impl ProjectPath {
    pub fn new(path: impl Into<String>) -> ProjectPath {
        let mut path = path.into();
        while path.ends_with('/') {
            path.pop();
        }
        ProjectPath(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parent path, or `None` if this is already a root segment.
    /// Matches the walk-up rule in `Cache::lookup_project`: parent of `.`
    /// or of a single segment is itself, which stops the climb.
    pub fn parent(&self) -> Option<ProjectPath> {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => Some(ProjectPath::new(parent)),
            None => None,
        }
    }

    /// True if `self` is `other` or a descendant of `other` (`a/b/c` is
    /// inside `a/b`).
    pub fn is_inside(&self, other: &ProjectPath) -> bool {
        self.0 == other.0 || self.0.starts_with(&format!("{}/", other.0))
    }

    /// True if `self` is a strict descendant of `other`.
    pub fn is_strict_descendant_of(&self, other: &ProjectPath) -> bool {
        self.0 != other.0 && self.is_inside(other)
    }

    pub fn join(&self, sub: &str) -> ProjectPath {
        ProjectPath::new(format!("{}/{}", self.0, sub))
    }

    /// This path with the leading `prefix/` stripped, or `None` if it is
    /// not rooted under `prefix`.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectPath({})", self.0)
    }
}

/// A project's metadata, serialized as `protato.root.yaml` at
/// `protos/<ProjectPath>/protato.root.yaml`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    pub path: ProjectPath,
    /// The upstream source commit the snapshot was built from.
    pub commit: String,
    /// Canonical HTTPS URL of the source repo.
    pub repository_url: String,
}

#[derive(Serialize, Deserialize)]
struct RootYamlGit {
    commit: String,
    url: String,
}

#[derive(Serialize, Deserialize)]
struct RootYaml {
    git: RootYamlGit,
}

impl Project {
    pub const METADATA_FILE_NAME: &'static str = "protato.root.yaml";

    /// Parses a `protato.root.yaml` document. `path` is supplied by the
    /// caller (it is not carried in the YAML itself).
    pub fn from_yaml_str(yaml: &str, path: ProjectPath) -> Result<Project, ParseError> {
        let doc: RootYaml = serde_yaml::from_str(yaml)?;
        Ok(Project {
            path,
            commit: doc.git.commit,
            repository_url: doc.git.url,
        })
    }

    /// Structured YAML emission that preserves the `git.commit`/`git.url`
    /// key names for on-wire compatibility with readers of the hand-written
    /// format this superseded.
    pub fn to_yaml_string(&self) -> Result<String, ParseError> {
        let doc = RootYaml {
            git: RootYamlGit {
                commit: self.commit.clone(),
                url: self.repository_url.clone(),
            },
        };
        Ok(serde_yaml::to_string(&doc)?)
    }
}

/// A `.proto` file inside a project at a given snapshot. `path` is relative
/// to the project root.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectFile {
    pub snapshot: Snapshot,
    pub project: ProjectPath,
    pub path: PathBuf,
    pub hash: Hash,
}

impl ProjectFile {
    /// Full registry-relative path: `protos/<project>/<path>`.
    pub fn registry_path(&self) -> String {
        format!("protos/{}/{}", self.project, self.path.display())
    }
}

/// File mode, git object type, hash and path of a single tree entry, as
/// produced by the repository adapter's `read_tree`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    pub kind: ObjectKind,
    pub hash: Hash,
    pub path: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

pub const REGULAR_FILE_MODE: u32 = 0o100644;

/// A file to be written by `SetProject`. Exactly one of `local_path` or
/// `content` is supplied at construction time: `FromDisk` reads bytes lazily
/// from the filesystem at write time, `Inline` carries bytes that were
/// already computed in memory (used when imports were rewritten before
/// upload).
#[derive(Clone, Debug)]
pub enum LocalProjectFile {
    FromDisk { path: PathBuf, local_path: PathBuf },
    Inline { path: PathBuf, content: Vec<u8> },
}

impl LocalProjectFile {
    pub fn path(&self) -> &Path {
        match self {
            LocalProjectFile::FromDisk { path, .. } => path,
            LocalProjectFile::Inline { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hash_short_form() {
        let h = Hash::new("0123456789abcdef");
        assert_eq!(h.short(), "0123456");
    }

    #[test]
    fn hash_short_form_when_shorter_than_seven() {
        let h = Hash::new("ab");
        assert_eq!(h.short(), "ab");
    }

    #[test]
    fn project_path_parent_walk_up() {
        let p = ProjectPath::new("team/svc/sub");
        assert_eq!(p.parent().unwrap().as_str(), "team/svc");
        assert_eq!(p.parent().unwrap().parent().unwrap().as_str(), "team");
        assert!(p.parent().unwrap().parent().unwrap().parent().is_none());
    }

    #[test]
    fn project_path_is_inside() {
        let ancestor = ProjectPath::new("team/svc");
        assert!(ProjectPath::new("team/svc/sub/leaf").is_inside(&ancestor));
        assert!(ProjectPath::new("team/svc").is_inside(&ancestor));
        assert!(!ProjectPath::new("team/other").is_inside(&ancestor));
        assert!(!ProjectPath::new("team/svc2").is_inside(&ancestor));
    }

    #[test]
    fn project_path_strict_descendant() {
        let ancestor = ProjectPath::new("a/b");
        assert!(ProjectPath::new("a/b/x").is_strict_descendant_of(&ancestor));
        assert!(!ProjectPath::new("a/b").is_strict_descendant_of(&ancestor));
    }

    #[test]
    fn project_roundtrips_through_yaml() {
        let project = Project {
            path: ProjectPath::new("team/svc"),
            commit: "deadbeef".to_string(),
            repository_url: "https://github.com/org/svc".to_string(),
        };
        let yaml = project.to_yaml_string().unwrap();
        let parsed = Project::from_yaml_str(&yaml, project.path.clone()).unwrap();
        assert_eq!(parsed, project);
    }

    #[test]
    fn project_yaml_uses_expected_key_names() {
        let project = Project {
            path: ProjectPath::new("team/svc"),
            commit: "deadbeef".to_string(),
            repository_url: "https://github.com/org/svc".to_string(),
        };
        let yaml = project.to_yaml_string().unwrap();
        assert!(yaml.contains("commit: deadbeef"));
        assert!(yaml.contains("url: https://github.com/org/svc"));
    }
}
