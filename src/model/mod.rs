//! The model document: template text, boundary injection, node registry.

pub mod compose;
pub mod document;
pub mod registry;

pub use compose::ModelComposer;
pub use document::ModelTemplate;
pub use registry::{
    FallbackPolicy, FallbackProfile, Node, NodeKind, NodeRegistry, ParseFallback,
    SubstringFallbackPolicy,
};
