//! Core of a content-addressed protobuf schema registry client: a bare git
//! repository mirroring a remote registry (`cache`), and a resolver that
//! materializes proto projects for an external compiler (`resolver`,
//! `compiler`, `orchestrator`).

pub mod author;
pub mod cache;
pub mod cancel;
pub mod compiler;
pub mod flock;
pub mod model;
pub mod orchestrator;
pub mod repository;
pub mod resolver;
pub mod settings;
pub mod url;
