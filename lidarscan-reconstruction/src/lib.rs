//! # lidarscan reconstruction
//!
//! Turns the geometry accumulated during a scan into a persisted model file.
//!
//! The [`ExportPipeline`] merges the host's mesh anchors into one world-space
//! mesh, writes it through the [`lidarscan_io::WriterRegistry`] and falls back
//! to a small placeholder box when there is nothing to reconstruct or when
//! reconstruction or serialization fails. Exports can run on a worker thread
//! with a [`CancellationToken`].

pub mod placeholder;
pub mod pipeline;
pub mod reconstruct;

pub use placeholder::*;
pub use pipeline::*;
pub use reconstruct::*;
