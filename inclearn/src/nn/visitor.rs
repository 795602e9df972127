//! A typed walk over every node of a network.
//!
//! Containers implement [VisitModules] by handing themselves to the visitor
//! and then recursing into their children with a dotted location, so a
//! [ModuleVisitor] sees every node exactly once, parents before children:
//!
//! ```text
//! stem_conv
//! stem_bn
//! stage_1.0            (residual block)
//! stage_1.0.conv_a
//! stage_1.0.bn_a
//! ...
//! ```

use inclearn_core::prelude::*;

use crate::convnet::{PreActResidualBlock, ResidualBlock};
use crate::nn::{BatchNorm2D, Conv2D};

/// Mutable access to one node, tagged with its kind.
#[derive(Debug)]
pub enum NodeMut<'a, E: Dtype> {
    Conv2D(&'a mut Conv2D<E>),
    BatchNorm2D(&'a mut BatchNorm2D<E>),
    ResidualBlock(&'a mut ResidualBlock<E>),
    PreActResidualBlock(&'a mut PreActResidualBlock<E>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Conv2D,
    BatchNorm2D,
    ResidualBlock,
    PreActResidualBlock,
}

impl<E: Dtype> NodeMut<'_, E> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Conv2D(_) => NodeKind::Conv2D,
            Self::BatchNorm2D(_) => NodeKind::BatchNorm2D,
            Self::ResidualBlock(_) => NodeKind::ResidualBlock,
            Self::PreActResidualBlock(_) => NodeKind::PreActResidualBlock,
        }
    }
}

pub trait ModuleVisitor<E: Dtype> {
    fn visit(&mut self, location: &str, node: NodeMut<'_, E>) -> Result<(), Error>;
}

pub trait VisitModules<E: Dtype> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error>;

    fn visit_modules<V: ModuleVisitor<E>>(&mut self, visitor: &mut V) {
        self.try_visit_modules("", visitor).unwrap()
    }
}

impl<E: Dtype, T: VisitModules<E>> VisitModules<E> for Vec<T> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error> {
        for (i, m_i) in self.iter_mut().enumerate() {
            m_i.try_visit_modules(&join_location(location, &i.to_string()), visitor)?;
        }
        Ok(())
    }
}

/// Records the location and kind of every node it visits, in visiting order.
#[derive(Debug, Default, Clone)]
pub struct ModuleInventory {
    pub nodes: Vec<(String, NodeKind)>,
}

impl ModuleInventory {
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|(_, k)| *k == kind).count()
    }

    pub fn locations(&self, kind: NodeKind) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(move |(_, k)| *k == kind)
            .map(|(loc, _)| loc.as_str())
    }
}

impl<E: Dtype> ModuleVisitor<E> for ModuleInventory {
    fn visit(&mut self, location: &str, node: NodeMut<'_, E>) -> Result<(), Error> {
        self.nodes.push((location.to_string(), node.kind()));
        Ok(())
    }
}
