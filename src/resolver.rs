//! The registry resolver: preloads seed projects' files into memory, serves
//! them to the external compiler as `FindFileByPath`, and rewrites imports
//! between the local-service namespace and the registry namespace.

use std::{
    io::Cursor,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        OnceLock,
    },
};

use dashmap::{DashMap, DashSet};
use log::debug;
use regex_lite::Regex;
use thiserror::Error;

use crate::{
    cache::{Cache, CacheError},
    model::{ProjectPath, Snapshot},
    repository::Repository,
};

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("import path not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, ResolverError>;

/// Given a snapshot and a set of seed projects, preloads all proto files
/// into an in-memory map keyed by both registry path and local-import path,
/// answers `find-by-path` queries from the compiler, and tracks which
/// projects were touched.
pub struct RegistryResolver<R: Repository> {
    cache: std::sync::Arc<Cache<R>>,
    snapshot: Snapshot,
    import_prefix: String,
    service_prefix: Option<String>,
    file_cache: DashMap<String, Vec<u8>>,
    projects: DashSet<ProjectPath>,
    preloaded: AtomicBool,
}

impl<R: Repository> RegistryResolver<R> {
    pub fn new(cache: std::sync::Arc<Cache<R>>, snapshot: Snapshot) -> Self {
        RegistryResolver {
            cache,
            snapshot,
            import_prefix: "proto".to_string(),
            service_prefix: None,
            file_cache: DashMap::new(),
            projects: DashSet::new(),
            preloaded: AtomicBool::new(false),
        }
    }

    /// Local directory name under which a service's own proto files live
    /// (typical: `proto`).
    pub fn set_import_prefix(&mut self, prefix: impl Into<String>) {
        self.import_prefix = prefix.into();
    }

    /// Registry top-level namespace corresponding to the local service
    /// (typical: `<svc>-service`).
    pub fn set_service_prefix(&mut self, prefix: impl Into<String>) {
        self.service_prefix = Some(prefix.into());
    }

    /// For each project: lists files via the Cache, reads their bytes, and
    /// caches them under both the registry path and (for the service's own
    /// projects) the local import-path form. Marks `preloaded`.
    pub fn preload_files(&self, projects: &[ProjectPath], untransform: bool) -> Result<()> {
        for project in projects {
            let files = self.cache.list_project_files(project, &self.snapshot)?;
            for file in files {
                let mut bytes = Vec::new();
                self.cache.read_project_file(&file, &mut bytes)?;

                let stored = if untransform {
                    match &self.service_prefix {
                        Some(service_prefix) => {
                            let content = String::from_utf8_lossy(&bytes);
                            untransform_imports(&content, service_prefix, &self.import_prefix).into_bytes()
                        }
                        None => bytes.clone(),
                    }
                } else {
                    bytes.clone()
                };

                let registry_key = format!("{project}/{}", file.path.display());
                self.file_cache.insert(registry_key, stored.clone());

                if let Some(service_prefix) = &self.service_prefix {
                    if let Some(sub_dir) = project.strip_prefix(service_prefix) {
                        let sub = if sub_dir.is_empty() {
                            file.path.display().to_string()
                        } else {
                            format!("{sub_dir}/{}", file.path.display())
                        };
                        if !sub.contains("google/protobuf/") {
                            let import_key = format!("{}/{sub}", self.import_prefix);
                            self.file_cache.insert(import_key, stored);
                        }
                    }
                }
            }
            self.projects.insert(project.clone());
        }
        self.preloaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Safe under concurrent calls from parallel compiler workers: once
    /// `preloaded`, this touches only `file_cache`'s internal shard locks,
    /// never the Cache. Exposed to the compiler via `ImportResolver`
    /// (`crate::compiler`), which is the only public name for this lookup.
    pub(crate) fn resolve(&self, path: &str) -> Result<Cursor<Vec<u8>>> {
        if let Some(bytes) = self.file_cache.get(path) {
            return Ok(Cursor::new(bytes.clone()));
        }
        if let Some(mapped) = self.mapped_path(path) {
            if let Some(bytes) = self.file_cache.get(&mapped) {
                return Ok(Cursor::new(bytes.clone()));
            }
        }
        if self.preloaded.load(Ordering::SeqCst) {
            return Err(ResolverError::NotFound(path.to_string()));
        }
        let bytes = self.resolve_live(path)?;
        self.file_cache.insert(path.to_string(), bytes.clone());
        Ok(Cursor::new(bytes))
    }

    pub fn discovered_projects(&self) -> Vec<ProjectPath> {
        self.projects.iter().map(|p| p.clone()).collect()
    }

    fn mapped_path(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(&format!("{}/", self.import_prefix))?;
        let service_prefix = self.service_prefix.as_ref()?;
        Some(format!("{service_prefix}/{rest}"))
    }

    fn registry_path(&self, path: &str) -> String {
        self.mapped_path(path).unwrap_or_else(|| path.to_string())
    }

    /// Not-preloaded fallback: a walk-up lookup followed by a file-list scan,
    /// as a single round-trip into the Cache (itself mutex-guarded, so
    /// concurrent callers are serialized there rather than racing).
    fn resolve_live(&self, path: &str) -> Result<Vec<u8>> {
        let registry_path = self.registry_path(path);
        let dir = Path::new(&registry_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResolverError::NotFound(path.to_string()))?;

        let lookup = self.cache.lookup_project(&ProjectPath::new(dir), &self.snapshot)?;
        let project = lookup.project.path;
        let relative = Path::new(&registry_path)
            .strip_prefix(project.as_str())
            .map_err(|_| ResolverError::NotFound(path.to_string()))?;

        let files = self.cache.list_project_files(&project, &self.snapshot)?;
        let file = files
            .into_iter()
            .find(|f| f.path == relative)
            .ok_or_else(|| ResolverError::NotFound(path.to_string()))?;

        debug!("Resolved {} via live cache lookup (project {})", path, project);
        self.projects.insert(project);
        let mut buf = Vec::new();
        self.cache.read_project_file(&file, &mut buf)?;
        Ok(buf)
    }
}

fn double_quoted_import() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^(\s*import\s+)"([^"]+)"(\s*;.*)$"#).unwrap())
}

fn single_quoted_import() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*import\s+)'([^']+)'(\s*;.*)$").unwrap())
}

struct ImportLine<'a> {
    prefix: &'a str,
    quote: char,
    path: &'a str,
    suffix: &'a str,
}

fn parse_import_line(line: &str) -> Option<ImportLine<'_>> {
    if let Some(caps) = double_quoted_import().captures(line) {
        let prefix = caps.get(1)?.as_str();
        let path = caps.get(2)?.as_str();
        let suffix = caps.get(3)?.as_str();
        return Some(ImportLine { prefix, quote: '"', path, suffix });
    }
    if let Some(caps) = single_quoted_import().captures(line) {
        let prefix = caps.get(1)?.as_str();
        let path = caps.get(2)?.as_str();
        let suffix = caps.get(3)?.as_str();
        return Some(ImportLine { prefix, quote: '\'', path, suffix });
    }
    None
}

/// Write-side import rewriting: `<ownedDir>/x` → `<servicePrefix>/x`, with
/// `google/protobuf/` passthrough, idempotence on already-rewritten lines,
/// and pulled-project prefixes referenced directly. Idempotent: applying
/// this twice yields the same output.
pub fn transform_imports(content: &str, owned_dir: &str, service_prefix: &str, pulled_prefixes: &[String]) -> String {
    content
        .split('\n')
        .map(|line| transform_line(line, owned_dir, service_prefix, pulled_prefixes))
        .collect::<Vec<_>>()
        .join("\n")
}

fn transform_line(line: &str, owned_dir: &str, service_prefix: &str, pulled_prefixes: &[String]) -> String {
    let Some(import) = parse_import_line(line) else {
        return line.to_string();
    };

    if import.path.starts_with("google/protobuf/") {
        return line.to_string();
    }
    if import.path.starts_with(&format!("{service_prefix}/")) {
        return line.to_string();
    }

    let owned = format!("{owned_dir}/");
    let rest = import.path.strip_prefix(&owned).unwrap_or(import.path);
    if rest.is_empty() {
        return line.to_string();
    }

    let new_path = if pulled_prefixes.iter().any(|prefix| rest.starts_with(&format!("{prefix}/"))) {
        rest.to_string()
    } else {
        format!("{service_prefix}/{rest}")
    };

    format!("{}{}{}{}{}", import.prefix, import.quote, new_path, import.quote, import.suffix)
}

/// Inverse of [`transform_imports`] for preload's `untransform` option:
/// `<servicePrefix>/x` → `<importPrefix>/x`.
fn untransform_imports(content: &str, service_prefix: &str, import_prefix: &str) -> String {
    content
        .split('\n')
        .map(|line| untransform_line(line, service_prefix, import_prefix))
        .collect::<Vec<_>>()
        .join("\n")
}

fn untransform_line(line: &str, service_prefix: &str, import_prefix: &str) -> String {
    let Some(import) = parse_import_line(line) else {
        return line.to_string();
    };
    if import.path.starts_with("google/protobuf/") {
        return line.to_string();
    }
    let prefix = format!("{service_prefix}/");
    let Some(rest) = import.path.strip_prefix(&prefix) else {
        return line.to_string();
    };
    format!(
        "{}{}{}/{}{}{}",
        import.prefix, import.quote, import_prefix, rest, import.quote, import.suffix
    )
}
