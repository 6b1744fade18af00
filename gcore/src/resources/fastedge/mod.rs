//! FastEdge binaries and apps

mod app;
mod binary;

pub use app::FastEdgeAppResource;
pub use binary::FastEdgeBinaryResource;
