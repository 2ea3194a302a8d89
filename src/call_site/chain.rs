//! Chain of call sites under construction, for build-time cycle detection.

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::key::CacheKey;

#[derive(Default)]
pub(crate) struct CallSiteChain {
    stack: SmallVec<[CacheKey; 8]>,
}

impl CallSiteChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails with the cycle path if `key` is already being built.
    pub(crate) fn check_circular(&self, key: &CacheKey) -> DiResult<()> {
        match self.stack.iter().position(|k| k == key) {
            Some(start) => {
                let mut path: Vec<&'static str> = self.stack[start..]
                    .iter()
                    .map(|k| k.service_type.name())
                    .collect();
                path.push(key.service_type.name());
                Err(DiError::Circular(path))
            }
            None => Ok(()),
        }
    }

    /// Runs `build` with `key` pushed onto the chain.
    pub(crate) fn enter<T>(
        &mut self,
        key: CacheKey,
        build: impl FnOnce(&mut Self) -> DiResult<T>,
    ) -> DiResult<T> {
        self.check_circular(&key)?;
        self.stack.push(key);
        let result = build(self);
        self.stack.pop();
        result
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ServiceType;

    #[test]
    fn test_enter_detects_repeat() {
        let mut chain = CallSiteChain::new();
        let a = CacheKey::new(ServiceType::of::<u8>(), 0);
        let b = CacheKey::new(ServiceType::of::<u16>(), 0);
        let result = chain.enter(a.clone(), |chain| {
            chain.enter(b.clone(), |chain| chain.enter(a.clone(), |_| Ok(())))
        });
        match result {
            Err(DiError::Circular(path)) => assert_eq!(path, vec!["u8", "u16", "u8"]),
            _ => panic!("expected a cycle"),
        }
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn test_slots_are_distinct_entries() {
        let mut chain = CallSiteChain::new();
        let first = CacheKey::new(ServiceType::of::<u8>(), 1);
        let last = CacheKey::new(ServiceType::of::<u8>(), 0);
        assert!(chain.enter(first, |chain| chain.enter(last, |_| Ok(()))).is_ok());
    }
}
