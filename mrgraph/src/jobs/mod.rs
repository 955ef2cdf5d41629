//! The two job phases: building complete vertices from raw adjacency, and
//! one round of chain compression.

pub mod build_vertices;
pub mod coin;
pub mod compress_chains;
