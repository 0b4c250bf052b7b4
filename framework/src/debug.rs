//! Injection debugging
//!
//! An [`InjectionObserver`] is told when the registry starts and finishes
//! injecting an owner. Injections nest (creating a dependency injects it
//! while its dependent is still being injected), so [`InjectionTree`]
//! records them as a forest.

use std::cell::RefCell;
use std::fmt::Write as _;

use serde::Serialize;

use crate::key::TypeKey;

/// Hook called around every injection
pub trait InjectionObserver {
    /// The registry is about to inject `owner`
    fn start_injection(&self, owner: TypeKey);

    /// The registry finished injecting `owner`
    fn end_injection(&self, owner: TypeKey);
}

/// One injection and the injections it triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionNode {
    pub name: &'static str,
    pub children: Vec<InjectionNode>,
}

/// Records injections as a tree
///
/// # Example
///
/// ```rust
/// use plinth::{InjectionObserver, InjectionTree, TypeKey};
///
/// struct Player;
/// struct Audio;
///
/// let tree = InjectionTree::new();
/// tree.start_injection(TypeKey::of::<Player>());
/// tree.start_injection(TypeKey::of::<Audio>());
/// tree.end_injection(TypeKey::of::<Audio>());
/// tree.end_injection(TypeKey::of::<Player>());
///
/// assert_eq!(tree.roots()[0].children.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InjectionTree {
    roots: RefCell<Vec<InjectionNode>>,
    // path of child indices from a root to the node being injected
    open: RefCell<Vec<usize>>,
}

impl InjectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed and in-progress injections
    pub fn roots(&self) -> Vec<InjectionNode> {
        self.roots.borrow().clone()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.roots.borrow_mut().clear();
        self.open.borrow_mut().clear();
    }

    /// Indented text rendering, one owner per line
    pub fn render(&self) -> String {
        fn walk(out: &mut String, node: &InjectionNode, depth: usize) {
            let _ = writeln!(out, "{}{}", "  ".repeat(depth), node.name);
            for child in &node.children {
                walk(out, child, depth + 1);
            }
        }

        let mut out = String::new();
        for root in self.roots.borrow().iter() {
            walk(&mut out, root, 0);
        }
        out
    }
}

impl InjectionObserver for InjectionTree {
    fn start_injection(&self, owner: TypeKey) {
        let node = InjectionNode {
            name: owner.short_name(),
            children: Vec::new(),
        };
        let mut roots = self.roots.borrow_mut();
        let mut open = self.open.borrow_mut();

        let Some((&first, rest)) = open.split_first() else {
            roots.push(node);
            open.push(roots.len() - 1);
            return;
        };
        let mut parent = &mut roots[first];
        for &index in rest {
            parent = &mut parent.children[index];
        }
        parent.children.push(node);
        let index = parent.children.len() - 1;
        open.push(index);
    }

    fn end_injection(&self, _owner: TypeKey) {
        self.open.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct A;
    struct B;
    struct C;

    #[test]
    fn test_nested_injections_build_a_tree() {
        let tree = InjectionTree::new();
        tree.start_injection(TypeKey::of::<A>());
        tree.start_injection(TypeKey::of::<B>());
        tree.end_injection(TypeKey::of::<B>());
        tree.start_injection(TypeKey::of::<C>());
        tree.end_injection(TypeKey::of::<C>());
        tree.end_injection(TypeKey::of::<A>());
        tree.start_injection(TypeKey::of::<C>());
        tree.end_injection(TypeKey::of::<C>());

        assert_eq!(tree.render(), "A\n  B\n  C\nC\n");
        assert_eq!(tree.roots().len(), 2);
    }
}
