//! Per-request keyed values and cancellation.
//!
//! A [`Scope`] is a persistent linked list of typed values. Adding a value
//! never touches existing nodes: [`Scope::with_value`] returns a new scope
//! layered over the old one, so a scope handed to another task keeps seeing
//! exactly what it saw when it was cloned.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

struct Node {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

/// Keyed, cancellable context value carried by every request.
///
/// Values are keyed by their type, the way `http::Extensions` does it; wrap
/// primitives in a newtype to give them a distinct key. Lookups walk from the
/// newest layer to the oldest, so the most recent value of a type wins.
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Node>>,
    cancel: CancellationToken,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new scope that carries `value` on top of everything in `self`.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                key: TypeId::of::<T>(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
            cancel: self.cancel.clone(),
        }
    }

    /// Rebinds this handle to a scope carrying `value`. Clones taken earlier
    /// are unaffected.
    pub fn set_value<T: Any + Send + Sync>(&mut self, value: T) {
        *self = self.with_value(value);
    }

    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let key = TypeId::of::<T>();
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if n.key == key {
                return n.value.downcast_ref::<T>();
            }
            node = n.parent.as_deref();
        }
        None
    }

    /// A scope with the same values whose cancellation is independent of the
    /// parent's, except that cancelling the parent cancels it too.
    #[must_use]
    pub fn child(&self) -> Self {
        Self { head: self.head.clone(), cancel: self.cancel.child_token() }
    }

    /// Signals cancellation. weft never calls this itself; handlers and the
    /// code that spawned them decide what it means.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            depth += 1;
            node = n.parent.as_deref();
        }
        f.debug_struct("Scope")
            .field("values", &depth)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct UserId(u64);

    #[derive(Debug, PartialEq)]
    struct Role(&'static str);

    #[test]
    fn with_value_leaves_original_untouched() {
        let base = Scope::new().with_value(UserId(1));
        let layered = base.with_value(Role("admin"));

        assert_eq!(base.value::<Role>(), None);
        assert_eq!(layered.value::<Role>(), Some(&Role("admin")));
        assert_eq!(layered.value::<UserId>(), Some(&UserId(1)));
    }

    #[test]
    fn newest_value_shadows_older() {
        let mut scope = Scope::new();
        scope.set_value(UserId(1));
        let before = scope.clone();
        scope.set_value(UserId(2));

        assert_eq!(scope.value::<UserId>(), Some(&UserId(2)));
        assert_eq!(before.value::<UserId>(), Some(&UserId(1)));
    }

    #[test]
    fn cancellation_reaches_children_only_downward() {
        let parent = Scope::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }
}
