//! Runtime re-entrancy detection.
//!
//! Call-site graphs reject constructor cycles before anything runs, but a
//! factory hides its dependencies from the graph. Every construction pushes
//! its cache key onto a thread-local stack so a factory that re-enters its
//! own construction fails with [`DiError::Circular`] instead of recursing or
//! blocking on its own cache slot.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::CacheKey;

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<(usize, CacheKey)>> = const { RefCell::new(Vec::new()) };
}

/// Pops its entry from the resolution stack when dropped.
pub(crate) struct StackGuard {
    engine: usize,
}

impl StackGuard {
    /// Pushes `key` for `engine`, failing if it is already being constructed
    /// on this thread.
    pub(crate) fn enter(engine: usize, key: &CacheKey) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            // Detect before pushing
            if let Some(start) = stack.iter().position(|(e, k)| *e == engine && k == key) {
                let mut path: Vec<&'static str> = stack[start..]
                    .iter()
                    .filter(|(e, _)| *e == engine)
                    .map(|(_, k)| k.service_type.name())
                    .collect();
                path.push(key.service_type.name());
                return Err(DiError::Circular(path));
            }

            stack.push((engine, key.clone()));
            Ok(Self { engine })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(matches!(popped, Some((e, _)) if e == self.engine));
        });
    }
}
