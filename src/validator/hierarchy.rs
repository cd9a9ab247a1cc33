//! Field path threaded through the traversal
//!
//! An immutable singly-linked list, innermost segment first. `push` allocates
//! one node and shares the tail, so a path handed to a deferred job can never
//! be changed by the traversal that continues after it.

use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct Node {
    segment: Arc<str>,
    parent: Option<Arc<Node>>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldHierarchy {
    head: Option<Arc<Node>>,
}

impl FieldHierarchy {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn push(&self, segment: impl AsRef<str>) -> Self {
        Self {
            head: Some(Arc::new(Node {
                segment: Arc::from(segment.as_ref()),
                parent: self.head.clone(),
            })),
        }
    }

    /// Pushes a list index segment, `[i]`.
    pub fn push_index(&self, index: usize) -> Self {
        self.push(format!("[{}]", index))
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            depth += 1;
            current = node.parent.as_deref();
        }
        depth
    }

    /// Outermost to innermost, joined with `.`.
    pub fn render(&self) -> String {
        let mut segments = Vec::with_capacity(self.depth());
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            segments.push(node.segment.as_ref());
            current = node.parent.as_deref();
        }
        segments.reverse();
        segments.join(".")
    }
}

impl PartialEq for FieldHierarchy {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.head.as_deref();
        let mut b = other.head.as_deref();
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if std::ptr::eq(x, y) {
                        return true;
                    }
                    if x.segment != y.segment {
                        return false;
                    }
                    a = x.parent.as_deref();
                    b = y.parent.as_deref();
                }
                _ => return false,
            }
        }
    }
}

impl Eq for FieldHierarchy {}

impl fmt::Display for FieldHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_joins_outermost_first() {
        let path = FieldHierarchy::root().push("weapon").push("ammo");
        assert_eq!(path.render(), "weapon.ammo");
        assert_eq!(FieldHierarchy::root().render(), "");
    }

    #[test]
    fn test_index_segments() {
        let path = FieldHierarchy::root().push("items").push_index(3).push("name");
        assert_eq!(path.render(), "items.[3].name");
    }

    #[test]
    fn test_push_does_not_alias_parent() {
        let parent = FieldHierarchy::root().push("a");
        let left = parent.push("b");
        let right = parent.push("c");
        assert_eq!(parent.render(), "a");
        assert_eq!(left.render(), "a.b");
        assert_eq!(right.render(), "a.c");
        assert_eq!(parent.depth(), 1);
        assert_eq!(left.depth(), 2);
    }

    #[test]
    fn test_structural_equality() {
        let a = FieldHierarchy::root().push("x").push("y");
        let b = FieldHierarchy::root().push("x").push("y");
        let c = FieldHierarchy::root().push("x");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, a.clone());
    }
}
