//! The compiler collaborator (§6): a narrow interface the orchestrator
//! plugs an external protobuf compiler into. The core never parses
//! `.proto` syntax itself — it only serves bytes and collects diagnostics.

use std::io::{Cursor, Read};

use thiserror::Error;

/// The resolver-facing surface a compiler consumes to fetch import content.
/// Implemented by `RegistryResolver` and by `StandardImportsDecorator`.
pub trait ImportResolver: Send + Sync {
    fn find_file_by_path(&self, path: &str) -> anyhow::Result<Box<dyn Read + Send>>;
}

impl<R: crate::repository::Repository> ImportResolver for crate::resolver::RegistryResolver<R> {
    fn find_file_by_path(&self, path: &str) -> anyhow::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.resolve(path)?))
    }
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("compilation failed")]
    ErrCompilationFailed,
    #[error("{0}")]
    Other(String),
}

/// Per-file errors and warnings collected without aborting the compile
/// call; only the final tally decides `ValidateProtos`'s outcome.
#[derive(Default)]
pub struct CompileReporter {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl CompileReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_error(&mut self, file: &str, message: impl Into<String>) {
        self.errors.push(format!("{file}: {}", message.into()));
    }

    pub fn report_warning(&mut self, file: &str, message: impl Into<String>) {
        self.warnings.push(format!("{file}: {}", message.into()));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// The external compiler entry point. Real implementations fan out across
/// worker threads, calling `resolver.find_file_by_path` concurrently — the
/// reason the resolver's preload/serve split exists.
pub trait ProtoCompiler {
    fn compile(&self, files: &[String], resolver: &dyn ImportResolver, reporter: &mut CompileReporter) -> anyhow::Result<()>;
}

/// Wraps any `ImportResolver` so the compiler's well-known-types imports
/// (`google/protobuf/*.proto`) are served from an embedded copy rather than
/// failing `FindFileByPath` when a seed project doesn't vendor them itself.
pub struct StandardImportsDecorator<'a> {
    inner: &'a dyn ImportResolver,
}

impl<'a> StandardImportsDecorator<'a> {
    pub fn new(inner: &'a dyn ImportResolver) -> Self {
        StandardImportsDecorator { inner }
    }
}

impl<'a> ImportResolver for StandardImportsDecorator<'a> {
    fn find_file_by_path(&self, path: &str) -> anyhow::Result<Box<dyn Read + Send>> {
        if let Some(content) = well_known_type(path) {
            return Ok(Box::new(Cursor::new(content.as_bytes().to_vec())));
        }
        self.inner.find_file_by_path(path)
    }
}

fn well_known_type(path: &str) -> Option<&'static str> {
    match path {
        "google/protobuf/any.proto" => Some(WKT_ANY),
        "google/protobuf/timestamp.proto" => Some(WKT_TIMESTAMP),
        "google/protobuf/duration.proto" => Some(WKT_DURATION),
        "google/protobuf/empty.proto" => Some(WKT_EMPTY),
        "google/protobuf/struct.proto" => Some(WKT_STRUCT),
        "google/protobuf/wrappers.proto" => Some(WKT_WRAPPERS),
        "google/protobuf/field_mask.proto" => Some(WKT_FIELD_MASK),
        _ => None,
    }
}

const WKT_ANY: &str = "syntax = \"proto3\";\npackage google.protobuf;\nmessage Any {\n  string type_url = 1;\n  bytes value = 2;\n}\n";
const WKT_TIMESTAMP: &str =
    "syntax = \"proto3\";\npackage google.protobuf;\nmessage Timestamp {\n  int64 seconds = 1;\n  int32 nanos = 2;\n}\n";
const WKT_DURATION: &str =
    "syntax = \"proto3\";\npackage google.protobuf;\nmessage Duration {\n  int64 seconds = 1;\n  int32 nanos = 2;\n}\n";
const WKT_EMPTY: &str = "syntax = \"proto3\";\npackage google.protobuf;\nmessage Empty {}\n";
const WKT_STRUCT: &str =
    "syntax = \"proto3\";\npackage google.protobuf;\nmessage Struct {\n  map<string, Value> fields = 1;\n}\nmessage Value {}\nmessage ListValue {\n  repeated Value values = 1;\n}\n";
const WKT_WRAPPERS: &str =
    "syntax = \"proto3\";\npackage google.protobuf;\nmessage StringValue {\n  string value = 1;\n}\nmessage BoolValue {\n  bool value = 1;\n}\nmessage Int64Value {\n  int64 value = 1;\n}\n";
const WKT_FIELD_MASK: &str = "syntax = \"proto3\";\npackage google.protobuf;\nmessage FieldMask {\n  repeated string paths = 1;\n}\n";

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;
    impl ImportResolver for AlwaysFails {
        fn find_file_by_path(&self, path: &str) -> anyhow::Result<Box<dyn Read + Send>> {
            anyhow::bail!("no such file: {path}")
        }
    }

    #[test]
    fn standard_imports_decorator_serves_well_known_types() {
        let inner = AlwaysFails;
        let decorator = StandardImportsDecorator::new(&inner);
        let mut reader = decorator.find_file_by_path("google/protobuf/timestamp.proto").unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert!(content.contains("message Timestamp"));
    }

    #[test]
    fn standard_imports_decorator_falls_through_for_other_paths() {
        let inner = AlwaysFails;
        let decorator = StandardImportsDecorator::new(&inner);
        assert!(decorator.find_file_by_path("pay-svc/common/a.proto").is_err());
    }

    #[test]
    fn reporter_tracks_errors_and_warnings() {
        let mut reporter = CompileReporter::new();
        assert!(!reporter.has_errors());
        reporter.report_warning("a.proto", "deprecated field");
        reporter.report_error("b.proto", "unknown type Foo");
        assert!(reporter.has_errors());
        assert_eq!(reporter.errors().len(), 1);
        assert_eq!(reporter.warnings().len(), 1);
    }
}
