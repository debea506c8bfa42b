use std::any::Any;
use std::rc::{Rc, Weak};

use crate::collections::map::HashMap;

use super::arg::NormalizedArg;

/// One level of the argument trie. The path from the root spells out a
/// normalized argument list; the node at its end holds the cached outcome.
pub(crate) struct MemoNode<R, E> {
    children: HashMap<usize, Edge<R, E>>,
    pub(crate) value: Option<R>,
    pub(crate) error: Option<E>,
}

struct Edge<R, E> {
    key: Weak<dyn Any>,
    node: MemoNode<R, E>,
}

impl<R, E> Edge<R, E> {
    fn new(key: &NormalizedArg) -> Self {
        Self {
            key: Rc::downgrade(key.value()),
            node: MemoNode::new(),
        }
    }

    fn leads_to(&self, key: &NormalizedArg) -> bool {
        self.key
            .upgrade()
            .is_some_and(|live| Rc::as_ptr(&live) as *const () as usize == key.identity())
    }
}

impl<R, E> MemoNode<R, E> {
    pub(crate) fn new() -> Self {
        Self {
            children: HashMap::default(),
            value: None,
            error: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.value.is_none() && self.error.is_none()
    }

    /// Follows `path`, creating missing nodes on the way.
    ///
    /// An edge whose key has been dropped is replaced, since a new allocation
    /// may have reused its address.
    pub(crate) fn descend(&mut self, path: &[NormalizedArg]) -> &mut MemoNode<R, E> {
        let mut node = self;
        for key in path {
            let edge = node
                .children
                .entry(key.identity())
                .or_insert_with(|| Edge::new(key));
            if !edge.leads_to(key) {
                *edge = Edge::new(key);
            }
            node = &mut edge.node;
        }
        node
    }
}
