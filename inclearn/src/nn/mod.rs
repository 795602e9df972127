//! Layers and the module visitor the backbones are assembled from.

mod layers;
mod visitor;

pub use layers::*;
pub use visitor::{ModuleInventory, ModuleVisitor, NodeKind, NodeMut, VisitModules};
