//! The registry cache: a bare git repository on disk mirroring a remote
//! schema registry, opened once per process per URL and held behind a
//! single mutex plus a cross-process advisory file lock.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::{debug, info};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{
    author::{Author, AuthorError},
    flock::{self, FileLock},
    model::{Hash, LocalProjectFile, ObjectKind, ParseError, Project, ProjectFile, ProjectPath, Snapshot, REGULAR_FILE_MODE},
    repository::{
        self, CloneOptions, CommitTreeConfig, FetchConfig, OpenOptions, PushConfig, ReadTreeOptions, Repository,
        RepositoryError, TreeUpsert, UpdateTreeConfig, WriteObjectOptions,
    },
    settings::Settings,
};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("project not found: {0}")]
    NotFound(ProjectPath),
    #[error("snapshot {0} not present in the local cache")]
    SnapshotMissing(Snapshot),
    #[error("claim conflict: {0}")]
    ClaimConflict(String),
    #[error("SetProject requires an author and none was supplied")]
    MissingAuthor,
    #[error("cache is busy: {0}")]
    CacheBusy(#[from] flock::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("malformed metadata: {0}")]
    MalformedMetadata(#[from] ParseError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Author(#[from] AuthorError),
}

pub type Result<T> = std::result::Result<T, CacheError>;

pub struct LookupProjectResponse {
    pub project: Project,
    pub tree_hash: Hash,
}

pub struct SetProjectRequest {
    pub project: Project,
    pub files: Vec<LocalProjectFile>,
    pub author: Option<Author>,
    pub snapshot: Option<Snapshot>,
}

pub struct SetProjectResponse {
    pub snapshot: Snapshot,
    pub files_changed: usize,
}

/// Directory name for a registry URL: the hex of the first 8 bytes of
/// SHA-256(url), giving a 16-character name.
fn hash_dir_name(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

pub struct Cache<R: Repository> {
    repo: Mutex<R>,
    _lock: FileLock,
    url: String,
    dir: PathBuf,
    default_branch_candidates: Vec<String>,
}

impl Cache<repository::Git2Repository> {
    /// Opens (cloning if absent) the bare cache repository for `registry_url`
    /// under `cache_dir`, and takes the exclusive advisory lock.
    pub fn open(cache_dir: &Path, registry_url: &str, settings: &Settings) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let dir = cache_dir.join(hash_dir_name(registry_url));
        let repo = if dir.exists() {
            debug!("Opening existing cache at {}", dir.display());
            repository::open(&dir, &OpenOptions { bare: true })?
        } else {
            info!("Cloning {} into {}", registry_url, dir.display());
            repository::clone(
                registry_url,
                &dir,
                &CloneOptions {
                    bare: true,
                    no_tags: true,
                    depth: Some(1),
                },
            )?
        };
        let lock = FileLock::acquire(&dir.join(".protato.lock"))?;
        Ok(Cache {
            repo: Mutex::new(repo),
            _lock: lock,
            url: registry_url.to_string(),
            dir,
            default_branch_candidates: settings.default_branch_candidates.clone(),
        })
    }
}

impl<R: Repository> Cache<R> {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Releases the cache lock. Dropping the `Cache` has the same effect;
    /// this exists for callers that want the release to be explicit.
    pub fn close(self) {}

    fn repo(&self) -> std::sync::MutexGuard<'_, R> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Prefers `FETCH_HEAD` (present after a fetch), falls back to `HEAD`.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let repo = self.repo();
        match repo.rev_hash("FETCH_HEAD") {
            Ok(hash) => Ok(hash),
            Err(_) => Ok(repo.rev_hash("HEAD")?),
        }
    }

    pub fn get_snapshot(&self) -> Result<Snapshot> {
        self.snapshot()
    }

    pub fn refresh_and_get_snapshot(&self) -> Result<Snapshot> {
        self.refresh()?;
        self.snapshot()
    }

    /// Only checks `main` and `master` against HEAD; any other primary
    /// branch falls through to `main`. Not extended beyond this on purpose.
    fn detect_default_branch(&self, repo: &R) -> String {
        let head = repo.rev_hash("HEAD").ok();
        if let Some(head) = &head {
            for branch in &self.default_branch_candidates {
                if repo.rev_hash(&format!("refs/heads/{branch}")).ok().as_ref() == Some(head) {
                    return branch.clone();
                }
                if repo.rev_hash(&format!("refs/remotes/origin/{branch}")).ok().as_ref() == Some(head) {
                    return branch.clone();
                }
            }
        }
        self.default_branch_candidates
            .first()
            .cloned()
            .unwrap_or_else(|| "main".to_string())
    }

    pub fn refresh(&self) -> Result<()> {
        let repo = self.repo();
        let branch = self.detect_default_branch(&repo);
        info!("Refreshing {} (branch {})", self.url, branch);
        repo.fetch(&FetchConfig {
            remote: None,
            refspecs: vec![format!("refs/heads/{0}:refs/remotes/origin/{0}", branch)],
            depth: Some(1),
            prune: true,
            force: true,
        })?;
        Ok(())
    }

    /// Resolves `<snapshot>:<path>` to a blob's bytes, or `None` if the path
    /// does not exist at that snapshot.
    fn read_blob_at(&self, repo: &R, snapshot: &Snapshot, path: &str) -> Result<Option<Vec<u8>>> {
        let revspec = format!("{}:{}", snapshot.as_str(), path);
        match repo.rev_hash(&revspec) {
            Ok(hash) => {
                let mut buf = Vec::new();
                repo.read_object(ObjectKind::Blob, &hash, &mut buf)?;
                Ok(Some(buf))
            }
            Err(RepositoryError::UnknownRevision(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn lookup_exact(&self, repo: &R, path: &ProjectPath, snapshot: &Snapshot) -> Result<Option<Project>> {
        let yaml_path = format!("protos/{}/{}", path, Project::METADATA_FILE_NAME);
        match self.read_blob_at(repo, snapshot, &yaml_path)? {
            Some(bytes) => {
                let yaml = String::from_utf8_lossy(&bytes).into_owned();
                Ok(Some(Project::from_yaml_str(&yaml, path.clone())?))
            }
            None => Ok(None),
        }
    }

    fn project_tree_hash(&self, repo: &R, path: &ProjectPath, snapshot: &Snapshot) -> Result<Hash> {
        let revspec = format!("{}:protos/{}", snapshot.as_str(), path);
        Ok(repo.rev_hash(&revspec)?)
    }

    /// Walks from `path` toward the root, returning the deepest ancestor (or
    /// exact match) that is a project.
    pub fn lookup_project(&self, path: &ProjectPath, snapshot: &Snapshot) -> Result<LookupProjectResponse> {
        let repo = self.repo();
        if !repo.rev_exists(snapshot.as_str()) {
            return Err(CacheError::SnapshotMissing(snapshot.clone()));
        }
        let mut candidate = path.clone();
        loop {
            if let Some(project) = self.lookup_exact(&repo, &candidate, snapshot)? {
                let tree_hash = self.project_tree_hash(&repo, &candidate, snapshot)?;
                return Ok(LookupProjectResponse { project, tree_hash });
            }
            debug!("No project at {}, walking up", candidate);
            match candidate.parent() {
                Some(parent) => candidate = parent,
                None => break,
            }
        }
        Err(CacheError::NotFound(path.clone()))
    }

    pub fn list_projects(&self, snapshot: &Snapshot, prefix: Option<&ProjectPath>) -> Result<Vec<ProjectPath>> {
        let repo = self.repo();
        let scope = match prefix {
            Some(p) => PathBuf::from(format!("protos/{p}")),
            None => PathBuf::from("protos"),
        };
        let entries = repo.read_tree(
            snapshot.as_str(),
            &ReadTreeOptions {
                recurse: true,
                paths: vec![scope],
            },
        )?;
        let mut projects = BTreeSet::new();
        for entry in entries {
            if entry.kind != ObjectKind::Blob {
                continue;
            }
            if entry.path.file_name().map(|n| n == Project::METADATA_FILE_NAME).unwrap_or(false) {
                if let Some(parent) = entry.path.parent() {
                    if let Ok(rel) = parent.strip_prefix("protos") {
                        if !rel.as_os_str().is_empty() {
                            projects.insert(ProjectPath::new(rel.to_string_lossy().into_owned()));
                        }
                    }
                }
            }
        }
        Ok(projects.into_iter().collect())
    }

    pub fn list_project_files(&self, project: &ProjectPath, snapshot: &Snapshot) -> Result<Vec<ProjectFile>> {
        let repo = self.repo();
        let scope = PathBuf::from(format!("protos/{project}"));
        let entries = repo.read_tree(
            snapshot.as_str(),
            &ReadTreeOptions {
                recurse: true,
                paths: vec![scope.clone()],
            },
        )?;
        let mut files = Vec::new();
        for entry in entries {
            if entry.kind != ObjectKind::Blob {
                continue;
            }
            if entry.path.extension().map(|ext| ext == "proto").unwrap_or(false) {
                let relative = match entry.path.strip_prefix(&scope) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => entry.path.clone(),
                };
                files.push(ProjectFile {
                    snapshot: snapshot.clone(),
                    project: project.clone(),
                    path: relative,
                    hash: entry.hash,
                });
            }
        }
        Ok(files)
    }

    pub fn read_project_file(&self, file: &ProjectFile, writer: &mut dyn std::io::Write) -> Result<()> {
        let repo = self.repo();
        repo.read_object(ObjectKind::Blob, &file.hash, writer)?;
        Ok(())
    }

    /// Upserts+deletes → new tree → new commit, all parented at the
    /// request's snapshot (explicit or current). No ref is updated; the
    /// caller decides whether to `push` the returned commit.
    pub fn set_project(&self, request: SetProjectRequest) -> Result<SetProjectResponse> {
        let repo = self.repo();
        let snapshot = match &request.snapshot {
            Some(s) => s.clone(),
            None => match repo.rev_hash("FETCH_HEAD") {
                Ok(hash) => hash,
                Err(_) => repo.rev_hash("HEAD")?,
            },
        };
        let current_tree = repo.rev_hash(&format!("{}^{{tree}}", snapshot.as_str()))?;

        let mut upserts = Vec::with_capacity(request.files.len() + 1);
        let metadata_yaml = request.project.to_yaml_string()?;
        let metadata_hash = repo.write_object(&mut metadata_yaml.as_bytes(), &WriteObjectOptions::default())?;
        upserts.push(TreeUpsert {
            path: PathBuf::from(format!("protos/{}/{}", request.project.path, Project::METADATA_FILE_NAME)),
            blob: metadata_hash,
            mode: REGULAR_FILE_MODE,
        });

        for file in &request.files {
            let hash = match file {
                LocalProjectFile::FromDisk { local_path, .. } => {
                    let mut source = std::fs::File::open(local_path)?;
                    repo.write_object(&mut source, &WriteObjectOptions::default())?
                }
                LocalProjectFile::Inline { content, .. } => {
                    repo.write_object(&mut content.as_slice(), &WriteObjectOptions::default())?
                }
            };
            upserts.push(TreeUpsert {
                path: PathBuf::from(format!("protos/{}/{}", request.project.path, file.path().display())),
                blob: hash,
                mode: REGULAR_FILE_MODE,
            });
        }

        let new_paths: BTreeSet<PathBuf> = request.files.iter().map(|f| f.path().to_path_buf()).collect();
        let existing = self.list_project_files(&request.project.path, &snapshot)?;
        let deletes = existing
            .iter()
            .filter(|f| !new_paths.contains(&f.path))
            .map(|f| PathBuf::from(f.registry_path()))
            .collect();

        let new_tree = repo.update_tree(&UpdateTreeConfig {
            base_tree: current_tree,
            upserts,
            deletes,
        })?;

        let author = request.author.ok_or(CacheError::MissingAuthor)?;
        let message = format!("{}: {} files", request.project.path, request.files.len());
        let new_commit = repo.commit_tree(&CommitTreeConfig {
            tree: new_tree,
            parents: vec![snapshot],
            message,
            author_name: author.name,
            author_email: author.email,
        })?;
        info!("SetProject({}) produced commit {}", request.project.path, new_commit.short());

        Ok(SetProjectResponse {
            files_changed: request.files.len(),
            snapshot: new_commit,
        })
    }

    /// Pushes `<hash>:refs/heads/<defaultBranch>` without `force`, so the
    /// remote rejects (rather than silently overwrites) a non-fast-forward
    /// update — see the Push CAS decision in DESIGN.md.
    pub fn push(&self, hash: &Hash) -> Result<()> {
        let repo = self.repo();
        let branch = self.detect_default_branch(&repo);
        info!("Pushing {} to refs/heads/{}", hash.short(), branch);
        repo.push(&PushConfig {
            remote: None,
            refspecs: vec![format!("{}:refs/heads/{}", hash.as_str(), branch)],
            atomic: false,
            force: false,
        })?;
        Ok(())
    }

    pub fn check_project_claim(&self, snapshot: &Snapshot, repository_url: &str, project_path: &ProjectPath) -> Result<()> {
        let descendants = self.list_projects(snapshot, Some(project_path))?;
        for existing in &descendants {
            if existing.is_strict_descendant_of(project_path) {
                return Err(CacheError::ClaimConflict(format!(
                    "{project_path} already has a sub-project at {existing}"
                )));
            }
        }
        let repo = self.repo();
        match self.lookup_exact(&repo, project_path, snapshot)? {
            Some(existing) if existing.repository_url != repository_url || existing.path != *project_path => {
                Err(CacheError::ClaimConflict(format!(
                    "{project_path} is already claimed by {} (requested {repository_url})",
                    existing.repository_url
                )))
            }
            _ => Ok(()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockRepository;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn test_cache(repo: MockRepository) -> Cache<MockRepository> {
        test_support::cache_for(repo)
    }

    #[test]
    fn hash_dir_name_is_sixteen_hex_chars() {
        let name = hash_dir_name("https://example.com/registry.git");
        assert_eq!(name.len(), 16);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn snapshot_prefers_fetch_head() {
        let mut repo = MockRepository::new();
        repo.expect_rev_hash()
            .with(eq("FETCH_HEAD"))
            .returning(|_| Ok(Hash::new("aaaa")));
        let cache = test_cache(repo);
        assert_eq!(cache.snapshot().unwrap(), Hash::new("aaaa"));
    }

    #[test]
    fn snapshot_falls_back_to_head() {
        let mut repo = MockRepository::new();
        repo.expect_rev_hash()
            .with(eq("FETCH_HEAD"))
            .returning(|_| Err(RepositoryError::UnknownRevision("FETCH_HEAD".to_string())));
        repo.expect_rev_hash().with(eq("HEAD")).returning(|_| Ok(Hash::new("bbbb")));
        let cache = test_cache(repo);
        assert_eq!(cache.snapshot().unwrap(), Hash::new("bbbb"));
    }

    #[test]
    fn lookup_project_reports_not_found_when_snapshot_missing() {
        let mut repo = MockRepository::new();
        repo.expect_rev_exists().returning(|_| false);
        let cache = test_cache(repo);
        let result = cache.lookup_project(&ProjectPath::new("team/svc"), &Hash::new("zzzz"));
        assert!(matches!(result, Err(CacheError::SnapshotMissing(_))));
    }

    #[test]
    fn lookup_project_walks_up_to_an_ancestor_with_metadata() {
        let mut repo = MockRepository::new();
        repo.expect_rev_exists().returning(|_| true);
        repo.expect_rev_hash().returning(|revspec| {
            if revspec.ends_with("protos/team/protato.root.yaml") {
                Ok(Hash::new("metadata-blob"))
            } else if revspec.ends_with("^{tree}") || revspec.contains(":protos/team") {
                Ok(Hash::new("tree-hash"))
            } else {
                Err(RepositoryError::UnknownRevision(revspec.to_string()))
            }
        });
        repo.expect_read_object().returning(|_, _, writer| {
            writer
                .write_all(b"git:\n  commit: abc123\n  url: https://example.com/team.git\n")
                .unwrap();
            Ok(())
        });
        let cache = test_cache(repo);
        let result = cache
            .lookup_project(&ProjectPath::new("team/svc"), &Hash::new("zzzz"))
            .unwrap();
        assert_eq!(result.project.path, ProjectPath::new("team"));
        assert_eq!(result.project.repository_url, "https://example.com/team.git");
    }

    #[test]
    fn list_projects_finds_nested_metadata_files_under_the_prefix() {
        let mut repo = MockRepository::new();
        repo.expect_read_tree().returning(|_, _| {
            Ok(vec![
                TreeEntry {
                    mode: REGULAR_FILE_MODE,
                    kind: ObjectKind::Blob,
                    hash: Hash::new("a"),
                    path: PathBuf::from("protos/team/svc/protato.root.yaml"),
                },
                TreeEntry {
                    mode: REGULAR_FILE_MODE,
                    kind: ObjectKind::Blob,
                    hash: Hash::new("b"),
                    path: PathBuf::from("protos/team/svc/a.proto"),
                },
                TreeEntry {
                    mode: REGULAR_FILE_MODE,
                    kind: ObjectKind::Blob,
                    hash: Hash::new("c"),
                    path: PathBuf::from("protos/other/protato.root.yaml"),
                },
            ])
        });
        let cache = test_cache(repo);
        let projects = cache.list_projects(&Hash::new("zzzz"), None).unwrap();
        assert_eq!(projects, vec![ProjectPath::new("other"), ProjectPath::new("team/svc")]);
    }

    #[test]
    fn list_project_files_keeps_only_proto_files_with_project_relative_paths() {
        let mut repo = MockRepository::new();
        repo.expect_read_tree().returning(|_, _| {
            Ok(vec![
                TreeEntry {
                    mode: REGULAR_FILE_MODE,
                    kind: ObjectKind::Blob,
                    hash: Hash::new("a"),
                    path: PathBuf::from("protos/team/svc/a.proto"),
                },
                TreeEntry {
                    mode: REGULAR_FILE_MODE,
                    kind: ObjectKind::Blob,
                    hash: Hash::new("b"),
                    path: PathBuf::from("protos/team/svc/protato.root.yaml"),
                },
            ])
        });
        let cache = test_cache(repo);
        let files = cache
            .list_project_files(&ProjectPath::new("team/svc"), &Hash::new("zzzz"))
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("a.proto"));
    }

    #[test]
    fn check_project_claim_rejects_a_conflicting_repository_url() {
        let mut repo = MockRepository::new();
        repo.expect_read_tree().returning(|_, _| Ok(Vec::new()));
        repo.expect_rev_hash().returning(|revspec| {
            if revspec.ends_with("protato.root.yaml") {
                Ok(Hash::new("metadata-blob"))
            } else {
                Err(RepositoryError::UnknownRevision(revspec.to_string()))
            }
        });
        repo.expect_read_object().returning(|_, _, writer| {
            writer
                .write_all(b"git:\n  commit: abc123\n  url: https://example.com/owner.git\n")
                .unwrap();
            Ok(())
        });
        let cache = test_cache(repo);
        let result = cache.check_project_claim(&Hash::new("zzzz"), "https://example.com/someone-else.git", &ProjectPath::new("team/svc"));
        assert!(matches!(result, Err(CacheError::ClaimConflict(_))));
    }

    #[test]
    fn check_project_claim_rejects_a_preexisting_sub_project() {
        let mut repo = MockRepository::new();
        repo.expect_read_tree().returning(|_, _| {
            Ok(vec![TreeEntry {
                mode: REGULAR_FILE_MODE,
                kind: ObjectKind::Blob,
                hash: Hash::new("a"),
                path: PathBuf::from("protos/team/svc/sub/protato.root.yaml"),
            }])
        });
        let cache = test_cache(repo);
        let result = cache.check_project_claim(&Hash::new("zzzz"), "https://example.com/team.git", &ProjectPath::new("team/svc"));
        assert!(matches!(result, Err(CacheError::ClaimConflict(_))));
    }

    #[test]
    fn push_targets_the_detected_default_branch_without_force() {
        let mut repo = MockRepository::new();
        repo.expect_rev_hash().returning(|revspec| {
            if revspec == "HEAD" || revspec == "refs/heads/main" {
                Ok(Hash::new("cccc"))
            } else {
                Err(RepositoryError::UnknownRevision(revspec.to_string()))
            }
        });
        repo.expect_push().withf(|config| !config.force && config.refspecs[0] == "cccc:refs/heads/main").returning(|_| Ok(()));
        let cache = test_cache(repo);
        cache.push(&Hash::new("cccc")).unwrap();
    }

    #[test]
    fn detect_default_branch_falls_back_to_first_candidate_when_head_matches_neither() {
        let mut repo = MockRepository::new();
        repo.expect_rev_hash().returning(|revspec| {
            if revspec == "HEAD" {
                Ok(Hash::new("dddd"))
            } else {
                Err(RepositoryError::UnknownRevision(revspec.to_string()))
            }
        });
        let cache = test_cache(repo);
        let guard = cache.repo();
        assert_eq!(cache.detect_default_branch(&guard), "main".to_string());
    }

    #[test]
    fn set_project_writes_metadata_and_files_as_a_single_tree() {
        let mut repo = MockRepository::new();
        repo.expect_rev_hash().returning(|revspec| {
            if revspec == "FETCH_HEAD" {
                Ok(Hash::new("base"))
            } else if revspec.ends_with("^{tree}") {
                Ok(Hash::new("base-tree"))
            } else {
                Err(RepositoryError::UnknownRevision(revspec.to_string()))
            }
        });
        repo.expect_read_tree().returning(|_, _| Ok(Vec::new()));
        repo.expect_write_object().returning(|_, _| Ok(Hash::new("blob")));
        repo.expect_update_tree().withf(|config| config.upserts.len() == 2 && config.deletes.is_empty()).returning(|_| Ok(Hash::new("new-tree")));
        repo.expect_commit_tree().returning(|_| Ok(Hash::new("new-commit")));
        let cache = test_cache(repo);

        let response = cache
            .set_project(SetProjectRequest {
                project: Project {
                    path: ProjectPath::new("team/svc"),
                    commit: "abc123".to_string(),
                    repository_url: "https://example.com/team.git".to_string(),
                },
                files: vec![LocalProjectFile::Inline {
                    path: PathBuf::from("a.proto"),
                    content: b"message Foo {}".to_vec(),
                }],
                author: Some(Author {
                    name: "Test Bot".to_string(),
                    email: "bot@example.com".to_string(),
                }),
                snapshot: None,
            })
            .unwrap();

        assert_eq!(response.files_changed, 1);
        assert_eq!(response.snapshot, Hash::new("new-commit"));
    }

    #[test]
    fn set_project_requires_an_author() {
        let mut repo = MockRepository::new();
        repo.expect_rev_hash().returning(|revspec| {
            if revspec == "FETCH_HEAD" {
                Ok(Hash::new("base"))
            } else if revspec.ends_with("^{tree}") {
                Ok(Hash::new("base-tree"))
            } else {
                Err(RepositoryError::UnknownRevision(revspec.to_string()))
            }
        });
        repo.expect_read_tree().returning(|_, _| Ok(Vec::new()));
        repo.expect_write_object().returning(|_, _| Ok(Hash::new("blob")));
        repo.expect_update_tree().returning(|_| Ok(Hash::new("new-tree")));
        let cache = test_cache(repo);

        let result = cache.set_project(SetProjectRequest {
            project: Project {
                path: ProjectPath::new("team/svc"),
                commit: "abc123".to_string(),
                repository_url: "https://example.com/team.git".to_string(),
            },
            files: vec![],
            author: None,
            snapshot: None,
        });
        assert!(matches!(result, Err(CacheError::MissingAuthor)));
    }
}
