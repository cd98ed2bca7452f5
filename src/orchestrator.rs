//! Drives the resolver across the external compiler: once for transitive
//! dependency discovery, once for validation.

use std::sync::Arc;

use log::warn;

use crate::{
    author,
    cache::{Cache, CacheError, SetProjectRequest, SetProjectResponse},
    cancel::CancellationToken,
    compiler::{CompileError, CompileReporter, ProtoCompiler, StandardImportsDecorator},
    model::{LocalProjectFile, Project, ProjectPath, Snapshot},
    repository::Repository,
    resolver::RegistryResolver,
};

pub struct ProtoOrchestrator<C: ProtoCompiler> {
    compiler: C,
}

fn first_segment(path: &ProjectPath) -> String {
    path.as_str().split('/').next().unwrap_or_else(|| path.as_str()).to_string()
}

impl<C: ProtoCompiler> ProtoOrchestrator<C> {
    pub fn new(compiler: C) -> Self {
        ProtoOrchestrator { compiler }
    }

    /// Builds a (not preloaded) resolver over the seeds' own files, compiles
    /// them, and returns every project the compiler's imports touched —
    /// the seeds plus everything discovered transitively.
    pub fn discover_dependencies<R: Repository>(
        &self,
        cache: Arc<Cache<R>>,
        snapshot: Snapshot,
        seed_projects: &[ProjectPath],
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<ProjectPath>> {
        if seed_projects.is_empty() {
            return Ok(Vec::new());
        }
        let service_prefix = first_segment(&seed_projects[0]);

        let mut files = Vec::new();
        for project in seed_projects {
            cancel.check()?;
            for file in cache.list_project_files(project, &snapshot)? {
                files.push(format!("{project}/{}", file.path.display()));
            }
        }
        if files.is_empty() {
            return Ok(seed_projects.to_vec());
        }

        let mut resolver = RegistryResolver::new(cache, snapshot);
        resolver.set_service_prefix(service_prefix);
        let decorated = StandardImportsDecorator::new(&resolver);
        let mut reporter = CompileReporter::new();

        if let Err(err) = self.compiler.compile(&files, &decorated, &mut reporter) {
            if !err.to_string().contains("panic") {
                warn!("Dependency discovery reported a non-compilation error: {err}");
            }
        }

        Ok(resolver.discovered_projects())
    }

    /// Preloads every seed file first, so the parallel compiler cannot
    /// trigger concurrent Cache lookups, then compiles using import-path
    /// form names (matching what the source actually wrote).
    pub fn validate_protos<R: Repository>(
        &self,
        cache: Arc<Cache<R>>,
        snapshot: Snapshot,
        seed_projects: &[ProjectPath],
        owned_dir: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CompileError> {
        if seed_projects.is_empty() {
            return Ok(());
        }
        let service_prefix = first_segment(&seed_projects[0]);

        let mut resolver = RegistryResolver::new(cache.clone(), snapshot.clone());
        resolver.set_import_prefix(owned_dir);
        resolver.set_service_prefix(service_prefix.clone());
        resolver
            .preload_files(seed_projects, false)
            .map_err(|err| CompileError::Other(err.to_string()))?;

        let mut files = Vec::new();
        for project in seed_projects {
            cancel.check().map_err(|err| CompileError::Other(err.to_string()))?;
            let project_files = cache
                .list_project_files(project, &snapshot)
                .map_err(|err| CompileError::Other(err.to_string()))?;
            for file in project_files {
                let name = match project.strip_prefix(&service_prefix) {
                    Some(sub) if !sub.is_empty() => format!("{owned_dir}/{sub}/{}", file.path.display()),
                    Some(_) => format!("{owned_dir}/{}", file.path.display()),
                    None => format!("{project}/{}", file.path.display()),
                };
                files.push(name);
            }
        }

        let decorated = StandardImportsDecorator::new(&resolver);
        let mut reporter = CompileReporter::new();
        let compile_result = self.compiler.compile(&files, &decorated, &mut reporter);

        if reporter.has_errors() {
            return Err(CompileError::ErrCompilationFailed);
        }
        match compile_result {
            Ok(()) => Ok(()),
            Err(err) if err.to_string().contains("panic") => {
                warn!("Compiler returned a panic-shaped error, treating as success: {err}");
                Ok(())
            }
            Err(err) => Err(CompileError::Other(err.to_string())),
        }
    }

    /// The write path: gathers already-rewritten local files into a new
    /// commit via `Cache::set_project`, resolving the commit author from
    /// the environment/git config, and optionally pushes the result to the
    /// registry's default branch.
    pub fn publish_project<R: Repository>(
        &self,
        cache: Arc<Cache<R>>,
        project: Project,
        files: Vec<LocalProjectFile>,
        snapshot: Option<Snapshot>,
        push: bool,
    ) -> Result<SetProjectResponse, CacheError> {
        let author = author::resolve()?;
        let response = cache.set_project(SetProjectRequest {
            project,
            files,
            author: Some(author),
            snapshot,
        })?;
        if push {
            cache.push(&response.snapshot)?;
        }
        Ok(response)
    }
}
