//! Registry snapshot and type-erased service values.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use ahash::AHashMap;

use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::ServiceType;

/// Type-erased service value.
///
/// Concrete services are stored as `Arc<T>`; trait-object services as
/// `Arc<Arc<dyn Trait>>`; collections as `Arc<ServiceList>`.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// The resolved members of a collection, in registration order.
#[derive(Clone, Default)]
pub struct ServiceList(pub(crate) Vec<AnyArc>);

impl ServiceList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnyArc> {
        self.0.iter()
    }
}

pub(crate) fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}

pub(crate) fn downcast_trait<I: ?Sized + Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<I>> {
    value
        .downcast::<Arc<I>>()
        .map(|outer| (*outer).clone())
        .map_err(|_| DiError::TypeMismatch(type_name::<I>()))
}

pub(crate) fn downcast_all<T: ?Sized>(
    value: AnyArc,
    each: fn(AnyArc) -> DiResult<Arc<T>>,
) -> DiResult<Vec<Arc<T>>> {
    let list = downcast::<ServiceList>(value)?;
    list.0.iter().cloned().map(each).collect()
}

/// Finalized registrations with lookup indexes.
///
/// A registration's *slot* counts from the last registration of the same
/// service type: exact registrations occupy `0..n_exact` (the last one is 0)
/// and open generic registrations follow them.
pub(crate) struct Registry {
    descriptors: Vec<ServiceDescriptor>,
    exact: AHashMap<ServiceType, Vec<usize>>,
    open: AHashMap<TypeId, Vec<usize>>,
}

impl Registry {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut exact: AHashMap<ServiceType, Vec<usize>> = AHashMap::new();
        let mut open: AHashMap<TypeId, Vec<usize>> = AHashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            match descriptor.service_type.type_id() {
                Some(id) if descriptor.is_open_generic() => open.entry(id).or_default().push(index),
                _ => exact
                    .entry(descriptor.service_type.canonical())
                    .or_default()
                    .push(index),
            }
        }
        Self {
            descriptors,
            exact,
            open,
        }
    }

    pub(crate) fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub(crate) fn descriptor(&self, index: usize) -> &ServiceDescriptor {
        &self.descriptors[index]
    }

    fn exact_for(&self, service_type: &ServiceType) -> &[usize] {
        let found = match service_type {
            ServiceType::Generic(_) => self.exact.get(&service_type.canonical()),
            other => self.exact.get(other),
        };
        found.map(Vec::as_slice).unwrap_or(&[])
    }

    fn open_for(&self, service_type: &ServiceType) -> &[usize] {
        service_type
            .as_generic()
            .and_then(|generic| self.open.get(&generic.definition().id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Descriptor used for single resolution: the last exact registration,
    /// otherwise the last matching open definition.
    pub(crate) fn single(&self, service_type: &ServiceType) -> Option<usize> {
        self.exact_for(service_type)
            .last()
            .or_else(|| self.open_for(service_type).last())
            .copied()
    }

    /// Every `(descriptor, slot)` serving `element`, in registration order with
    /// exact registrations first.
    pub(crate) fn all(&self, element: &ServiceType) -> Vec<(usize, usize)> {
        let exact = self.exact_for(element);
        let open = self.open_for(element);
        let n_exact = exact.len();
        let n_open = open.len();
        exact
            .iter()
            .enumerate()
            .map(|(i, &index)| (index, n_exact - 1 - i))
            .chain(
                open.iter()
                    .enumerate()
                    .map(|(j, &index)| (index, n_exact + (n_open - 1 - j))),
            )
            .collect()
    }

    /// Slot of a descriptor among the registrations of its own service type.
    pub(crate) fn slot_of(&self, index: usize) -> usize {
        let descriptor = &self.descriptors[index];
        let siblings = match descriptor.service_type.type_id() {
            Some(id) if descriptor.is_open_generic() => self.open.get(&id),
            _ => self.exact.get(&descriptor.service_type.canonical()),
        };
        siblings
            .and_then(|list| list.iter().position(|&i| i == index).map(|pos| list.len() - 1 - pos))
            .unwrap_or(0)
    }

    /// Whether `service_type` can be satisfied by a registration.
    pub(crate) fn is_registered(&self, service_type: &ServiceType) -> bool {
        match service_type {
            ServiceType::Enumerable(_) => true,
            other => self.single(other).is_some(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.descriptors.len()
    }
}
