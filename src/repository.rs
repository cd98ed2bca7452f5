//! The repository adapter: a narrow, testable interface over git plumbing.
//!
//! The `Cache` depends only on the [`Repository`] trait, never on `git2`
//! directly, so it can be tested against a mock without a real git process
//! (see the `mockall`-generated `MockRepository` used in `cache` tests).
//! [`Git2Repository`] is the production implementation, backed by `git2`
//! rather than shelling out — an implementation choice within the "host
//! that can execute git plumbing commands" contract.

use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
};

use git2::{
    build::RepoBuilder, Cred, CredentialType, FetchOptions, ObjectType, Oid, PushOptions as Git2PushOptions,
    RemoteCallbacks, Repository as Git2Repo,
};
#[cfg(test)]
use mockall::automock;
use log::{debug, trace};
use thiserror::Error;

use crate::model::{Hash, ObjectKind, TreeEntry};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("{path} is not a git repository")]
    NotARepository { path: String },
    #[error("unknown revision {0}")]
    UnknownRevision(String),
    #[error("transport error while {action}: {source}")]
    Transport {
        action: &'static str,
        #[source]
        source: git2::Error,
    },
    #[error("push to {refspec} was rejected: {message}")]
    Rejected { refspec: String, message: String },
    #[error("compare-and-swap failed updating {reference}: expected {expected}, found {found}")]
    CasFailure {
        reference: String,
        expected: String,
        found: String,
    },
    #[error("object {0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Default, Clone)]
pub struct CloneOptions {
    pub bare: bool,
    pub no_tags: bool,
    pub depth: Option<u32>,
}

#[derive(Default, Clone)]
pub struct OpenOptions {
    pub bare: bool,
}

#[derive(Default, Clone)]
pub struct FetchConfig {
    pub remote: Option<String>,
    pub refspecs: Vec<String>,
    pub depth: Option<u32>,
    pub prune: bool,
    pub force: bool,
}

#[derive(Default, Clone)]
pub struct PushConfig {
    pub remote: Option<String>,
    pub refspecs: Vec<String>,
    pub atomic: bool,
    pub force: bool,
}

#[derive(Default, Clone)]
pub struct ReadTreeOptions {
    pub recurse: bool,
    pub paths: Vec<PathBuf>,
}

#[derive(Default, Clone, Copy)]
pub struct WriteObjectOptions {
    pub kind: WriteObjectKind,
}

#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteObjectKind {
    #[default]
    Blob,
}

pub struct TreeUpsert {
    pub path: PathBuf,
    pub blob: Hash,
    pub mode: u32,
}

pub struct UpdateTreeConfig {
    pub base_tree: Hash,
    pub upserts: Vec<TreeUpsert>,
    pub deletes: Vec<PathBuf>,
}

pub struct CommitTreeConfig {
    pub tree: Hash,
    pub parents: Vec<Hash>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
}

/// The capability-set the Cache consumes. Every operation is synchronous:
/// git2 (and the `git` binary it would otherwise shell out to) are blocking
/// APIs, and the core never awaits.
/// `Send` only, not `Sync`: every call into a `Repository` goes through
/// `Cache`'s own `Mutex<R>`, which is `Sync` whenever `R: Send` — no
/// implementation needs to be safe for concurrent *access*, only for being
/// moved to the thread that currently holds the lock (`git2::Repository`
/// itself is `Send` but not `Sync`).
#[cfg_attr(test, automock)]
pub trait Repository: Send {
    fn fetch(&self, config: &FetchConfig) -> Result<()>;
    fn push(&self, config: &PushConfig) -> Result<()>;
    fn rev_hash(&self, rev: &str) -> Result<Hash>;
    fn rev_exists(&self, rev: &str) -> bool {
        self.rev_hash(rev).is_ok()
    }
    fn read_tree(&self, treeish: &str, options: &ReadTreeOptions) -> Result<Vec<TreeEntry>>;
    fn write_object(&self, reader: &mut dyn Read, options: &WriteObjectOptions) -> Result<Hash>;
    fn read_object(&self, kind: ObjectKind, hash: &Hash, writer: &mut dyn Write) -> Result<()>;
    fn update_tree(&self, config: &UpdateTreeConfig) -> Result<Hash>;
    fn commit_tree(&self, config: &CommitTreeConfig) -> Result<Hash>;
    fn update_ref(&self, reference: &str, new_hash: &Hash, expected_old_hash: Option<&Hash>) -> Result<()>;
}

pub fn clone(url: &str, path: &Path, options: &CloneOptions) -> Result<Git2Repository> {
    let mut builder = RepoBuilder::new();
    builder.bare(options.bare).fetch_options(fetch_options(options.depth, options.no_tags));
    trace!("Cloning {} into {}", url, path.display());
    let repo = builder
        .clone(url, path)
        .map_err(|source| RepositoryError::Transport { action: "clone", source })?;
    Ok(Git2Repository { repo })
}

pub fn open(path: &Path, options: &OpenOptions) -> Result<Git2Repository> {
    let repo = Git2Repo::open(path).map_err(|_| RepositoryError::NotARepository {
        path: path.display().to_string(),
    })?;
    if options.bare && !repo.is_bare() {
        return Err(RepositoryError::NotARepository {
            path: path.display().to_string(),
        });
    }
    Ok(Git2Repository { repo })
}

/// Resolves an SSH credential for git2's transport. When `PROTOREG_SSH_KEY_PATH`
/// names a private key file, it's parsed with `ssh-key` first so a malformed
/// or encrypted-without-passphrase key fails fast with a clear message
/// instead of an opaque libssh2 transport error; otherwise falls back to
/// whatever key the running SSH agent offers.
fn ssh_key_credential(username: &str) -> std::result::Result<Cred, git2::Error> {
    let Ok(key_path) = std::env::var("PROTOREG_SSH_KEY_PATH") else {
        return Cred::ssh_key_from_agent(username);
    };
    let path = PathBuf::from(&key_path);
    ssh_key::PrivateKey::read_openssh_file(&path)
        .map_err(|err| git2::Error::from_str(&format!("invalid SSH key at {key_path}: {err}")))?;
    let passphrase = std::env::var("PROTOREG_SSH_KEY_PASSPHRASE").ok();
    Cred::ssh_key(username, None, &path, passphrase.as_deref())
}

fn fetch_options(depth: Option<u32>, no_tags: bool) -> FetchOptions<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed_types| {
        trace!("Requested credentials for {url}, username {username:?}, allowed {allowed_types:?}");
        if allowed_types.contains(CredentialType::USERNAME) {
            return Cred::username("git");
        }
        if allowed_types.contains(CredentialType::SSH_KEY) {
            return ssh_key_credential(username.unwrap_or("git"));
        }
        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(config) = git2::Config::open_default() {
                return Cred::credential_helper(&config, url, username);
            }
        }
        Err(git2::Error::from_str("no valid authentication available"))
    });

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    if no_tags {
        options.download_tags(git2::AutotagOption::None);
    }
    if let Some(depth) = depth {
        options.depth(depth as i32);
    }
    options
}

/// `git2`-backed implementation of [`Repository`].
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    fn find_remote_name(&self, preferred: Option<&str>) -> Result<String> {
        if let Some(name) = preferred {
            return Ok(name.to_string());
        }
        Ok("origin".to_string())
    }

    fn object_kind(kind: ObjectType) -> Option<ObjectKind> {
        match kind {
            ObjectType::Blob => Some(ObjectKind::Blob),
            ObjectType::Tree => Some(ObjectKind::Tree),
            ObjectType::Commit => Some(ObjectKind::Commit),
            ObjectType::Tag => Some(ObjectKind::Tag),
            _ => None,
        }
    }
}

impl Repository for Git2Repository {
    fn fetch(&self, config: &FetchConfig) -> Result<()> {
        let remote_name = self.find_remote_name(config.remote.as_deref())?;
        let mut remote = self.repo.find_remote(&remote_name)?;
        let default_refspecs: Vec<String> = remote.refspecs().filter_map(|r| r.str().map(String::from)).collect();
        let refspecs: Vec<&str> = if config.refspecs.is_empty() {
            default_refspecs.iter().map(String::as_str).collect()
        } else {
            config.refspecs.iter().map(String::as_str).collect()
        };
        let mut options = fetch_options(config.depth, false);
        if config.prune {
            options.prune(git2::FetchPrune::On);
        }
        debug!("Fetching {:?} from {}", refspecs, remote_name);
        remote
            .fetch(&refspecs, Some(&mut options), None)
            .map_err(|source| RepositoryError::Transport { action: "fetch", source })
    }

    fn push(&self, config: &PushConfig) -> Result<()> {
        let remote_name = self.find_remote_name(config.remote.as_deref())?;
        let mut remote = self.repo.find_remote(&remote_name)?;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username, allowed_types| {
            if allowed_types.contains(CredentialType::SSH_KEY) {
                return ssh_key_credential(username.unwrap_or("git"));
            }
            if let Ok(cfg) = git2::Config::open_default() {
                return Cred::credential_helper(&cfg, url, username);
            }
            Err(git2::Error::from_str("no valid authentication available"))
        });
        let mut options = Git2PushOptions::new();
        options.remote_callbacks(callbacks);
        debug!("Pushing {:?} to {}", config.refspecs, remote_name);
        remote.push(&config.refspecs, Some(&mut options)).map_err(|source| {
            if source.class() == git2::ErrorClass::Reference {
                RepositoryError::Rejected {
                    refspec: config.refspecs.join(","),
                    message: source.message().to_string(),
                }
            } else {
                RepositoryError::Transport { action: "push", source }
            }
        })
    }

    fn rev_hash(&self, rev: &str) -> Result<Hash> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|_| RepositoryError::UnknownRevision(rev.to_string()))?;
        Ok(Hash::new(object.id().to_string()))
    }

    fn read_tree(&self, treeish: &str, options: &ReadTreeOptions) -> Result<Vec<TreeEntry>> {
        let object = self
            .repo
            .revparse_single(treeish)
            .map_err(|_| RepositoryError::UnknownRevision(treeish.to_string()))?;
        let tree = object.peel_to_tree()?;

        let mut entries = Vec::new();
        if options.paths.is_empty() {
            walk_tree(&self.repo, &tree, Path::new(""), options.recurse, &mut entries)?;
        } else {
            for scope in &options.paths {
                match tree.get_path(scope) {
                    Ok(entry) => {
                        if entry.kind() == Some(ObjectType::Tree) {
                            let sub = self.repo.find_tree(entry.id())?;
                            walk_tree(&self.repo, &sub, scope, options.recurse, &mut entries)?;
                        } else if let Some(kind) = Self::object_kind(entry.kind().unwrap_or(ObjectType::Any)) {
                            entries.push(TreeEntry {
                                mode: entry.filemode() as u32,
                                kind,
                                hash: Hash::new(entry.id().to_string()),
                                path: scope.clone(),
                            });
                        }
                    }
                    Err(e) if e.code() == git2::ErrorCode::NotFound => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(entries)
    }

    fn write_object(&self, reader: &mut dyn Read, _options: &WriteObjectOptions) -> Result<Hash> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let oid = self.repo.blob(&buf)?;
        Ok(Hash::new(oid.to_string()))
    }

    fn read_object(&self, kind: ObjectKind, hash: &Hash, writer: &mut dyn Write) -> Result<()> {
        let oid = Oid::from_str(hash.as_str())?;
        match kind {
            ObjectKind::Blob => {
                let blob = self
                    .repo
                    .find_blob(oid)
                    .map_err(|_| RepositoryError::NotFound(hash.to_string()))?;
                writer.write_all(blob.content())?;
            }
            _ => {
                let object = self
                    .repo
                    .find_object(oid, None)
                    .map_err(|_| RepositoryError::NotFound(hash.to_string()))?;
                writer.write_all(&object.peel_to_blob()?.content().to_vec())?;
            }
        }
        Ok(())
    }

    fn update_tree(&self, config: &UpdateTreeConfig) -> Result<Hash> {
        let base_oid = Oid::from_str(config.base_tree.as_str())?;
        let base_tree = self.repo.find_tree(base_oid)?;

        let mut index = git2::Index::new()?;
        index.read_tree(&base_tree)?;

        for upsert in &config.upserts {
            let blob_oid = Oid::from_str(upsert.blob.as_str())?;
            index.add(&git2::IndexEntry {
                ctime: git2::IndexTime::new(0, 0),
                mtime: git2::IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: upsert.mode,
                uid: 0,
                gid: 0,
                file_size: 0,
                id: blob_oid,
                flags: 0,
                flags_extended: 0,
                path: path_bytes(&upsert.path),
            })?;
        }
        for delete in &config.deletes {
            index.remove_path(delete)?;
        }

        let tree_oid = index.write_tree_to(&self.repo)?;
        Ok(Hash::new(tree_oid.to_string()))
    }

    fn commit_tree(&self, config: &CommitTreeConfig) -> Result<Hash> {
        let tree_oid = Oid::from_str(config.tree.as_str())?;
        let tree = self.repo.find_tree(tree_oid)?;
        let signature = git2::Signature::now(&config.author_name, &config.author_email)?;

        let parent_objects = config
            .parents
            .iter()
            .map(|hash| {
                let oid = Oid::from_str(hash.as_str())?;
                self.repo.find_commit(oid)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit> = parent_objects.iter().collect();

        let oid = self.repo.commit(
            None,
            &signature,
            &signature,
            &config.message,
            &tree,
            &parent_refs,
        )?;
        Ok(Hash::new(oid.to_string()))
    }

    fn update_ref(&self, reference: &str, new_hash: &Hash, expected_old_hash: Option<&Hash>) -> Result<()> {
        let new_oid = Oid::from_str(new_hash.as_str())?;
        if let Some(expected) = expected_old_hash {
            let current = self.repo.refname_to_id(reference).ok();
            let expected_oid = Oid::from_str(expected.as_str())?;
            if current != Some(expected_oid) {
                return Err(RepositoryError::CasFailure {
                    reference: reference.to_string(),
                    expected: expected.to_string(),
                    found: current.map(|o| o.to_string()).unwrap_or_else(|| "<missing>".to_string()),
                });
            }
        }
        self.repo.reference(reference, new_oid, true, "protoreg update-ref")?;
        Ok(())
    }
}

fn walk_tree(
    repo: &Git2Repo,
    tree: &git2::Tree,
    prefix: &Path,
    recurse: bool,
    out: &mut Vec<TreeEntry>,
) -> Result<()> {
    for entry in tree.iter() {
        let name = entry.name().unwrap_or_default();
        let path = prefix.join(name);
        match entry.kind() {
            Some(ObjectType::Tree) => {
                if recurse {
                    let sub = repo.find_tree(entry.id())?;
                    walk_tree(repo, &sub, &path, recurse, out)?;
                } else {
                    out.push(TreeEntry {
                        mode: entry.filemode() as u32,
                        kind: ObjectKind::Tree,
                        hash: Hash::new(entry.id().to_string()),
                        path,
                    });
                }
            }
            Some(other) => {
                if let Some(kind) = Git2Repository::object_kind(other) {
                    out.push(TreeEntry {
                        mode: entry.filemode() as u32,
                        kind,
                        hash: Hash::new(entry.id().to_string()),
                        path,
                    });
                }
            }
            None => {}
        }
    }
    Ok(())
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}
