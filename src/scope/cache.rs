//! Per-scope storage of shared instances.

use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::internal::InFlightGuard;
use crate::operation::ResolveOperation;
use crate::registration::RegistrationId;
use crate::service::Service;

/// Identifies one cached instance inside a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SharingKey {
    /// The raw instance of a shared registration.
    Component(RegistrationId),
    /// A shared instance after a chain of decorators has been applied.
    Decorated {
        component: RegistrationId,
        service: Service,
        chain: SmallVec<[RegistrationId; 4]>,
    },
}

impl SharingKey {
    pub(crate) fn component(id: RegistrationId) -> Self {
        SharingKey::Component(id)
    }

    pub(crate) fn decorated(component: RegistrationId, service: &Service, chain: &[RegistrationId]) -> Self {
        SharingKey::Decorated {
            component,
            service: service.clone(),
            chain: chain.iter().copied().collect(),
        }
    }
}

type Cell = Arc<OnceCell<Instance>>;

/// Shared instances owned by one lifetime scope.
///
/// The map lock is only held to find or create a cell. Building happens
/// inside the cell, so two different components never wait on each other
/// here and one component is built at most once per scope.
#[derive(Default)]
pub(crate) struct SharedInstances {
    cells: Mutex<AHashMap<SharingKey, Cell>>,
}

impl SharedInstances {
    /// The cell for `key`, created empty if absent.
    pub(crate) fn cell(&self, key: SharingKey) -> Cell {
        self.cells.lock().entry(key).or_default().clone()
    }

    /// Number of cells holding an instance.
    pub(crate) fn len(&self) -> usize {
        self.cells.lock().values().filter(|cell| cell.get().is_some()).count()
    }

    /// Drops every cached instance.
    pub(crate) fn clear(&self) {
        let cells = std::mem::take(&mut *self.cells.lock());
        drop(cells);
    }
}

/// Returns the instance in `cell`, building it with `build` on first use.
///
/// Concurrent callers block until the first build finishes. A failed build
/// leaves the cell empty so a later request retries. Re-entering a cell this
/// thread is already building reports a cycle through `service`.
pub(crate) fn get_or_build(
    cell: &OnceCell<Instance>,
    operation: &ResolveOperation,
    service: &Service,
    build: impl FnOnce() -> DiResult<Instance>,
) -> DiResult<Instance> {
    if let Some(instance) = cell.get() {
        return Ok(instance.clone());
    }
    let Some(_in_flight) = InFlightGuard::enter(cell as *const OnceCell<Instance> as usize) else {
        return Err(DiError::Circular {
            path: operation.circular_path(service),
        });
    };
    cell.get_or_try_init(build).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_are_reused_per_key() {
        let cache = SharedInstances::default();
        let id = RegistrationId::from_raw(9);
        let first = cache.cell(SharingKey::component(id));
        let again = cache.cell(SharingKey::component(id));
        assert!(Arc::ptr_eq(&first, &again));

        let decorated = cache.cell(SharingKey::decorated(id, &Service::of::<u8>(), &[RegistrationId::from_raw(10)]));
        assert!(!Arc::ptr_eq(&first, &decorated));

        assert_eq!(cache.len(), 0);
        first.set(Instance::from_value(1u8)).unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
