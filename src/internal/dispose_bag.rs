//! Internal disposal bag for scope-owned instances.

use std::sync::Arc;

use crate::traits::{AsyncDispose, Dispose};

/// A captured instance with its disposal capability.
#[derive(Clone)]
pub(crate) enum Disposable {
    Sync {
        service: &'static str,
        target: Arc<dyn Dispose>,
    },
    Async {
        service: &'static str,
        target: Arc<dyn AsyncDispose>,
    },
}

impl Disposable {
    pub(crate) fn service(&self) -> &'static str {
        match self {
            Disposable::Sync { service, .. } | Disposable::Async { service, .. } => service,
        }
    }
}

/// Disposables in creation order. Drained in reverse (LIFO).
#[derive(Default)]
pub(crate) struct DisposeBag {
    items: Vec<Disposable>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposable: Disposable) {
        self.items.push(disposable);
    }

    /// Takes all disposables, last created first.
    pub(crate) fn drain_reverse(&mut self) -> Vec<Disposable> {
        let mut items = std::mem::take(&mut self.items);
        items.reverse();
        items
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
