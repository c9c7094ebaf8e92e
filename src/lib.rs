//! meshprint: print-job orchestration for LAN 3D printers.
//!
//! An uploaded model moves through a fixed pipeline: an external slicer CLI
//! converts it to machine instructions under a hard timeout, then the
//! artifact is handed to the printer over implicit-TLS FTP and activated
//! with an MQTT `project_file` command. The in-memory [`job::JobStore`] is
//! the single source of truth for job state and the only error sink
//! visible to callers.

pub mod config;
pub mod job;
pub mod printer;
pub mod slicer;
pub mod web;
