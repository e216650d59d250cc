//! Circular dependency detection infrastructure.

use std::cell::{Cell, RefCell};

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::registration::RegistrationId;
use crate::service::Service;

// Requests in flight on this thread, across nested operations. Bounds runaway
// recursion through deferred adapters that start fresh operations.
thread_local! {
    static THREAD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static IN_FLIGHT: RefCell<SmallVec<[usize; 8]>> = RefCell::new(SmallVec::new());
}

#[derive(Clone)]
struct StackEntry {
    service: Service,
    registration: RegistrationId,
}

/// The requests of one operation that are currently being built.
#[derive(Default)]
pub(crate) struct ResolutionStack {
    entries: SmallVec<[StackEntry; 8]>,
}

impl ResolutionStack {
    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }

    /// In-flight services followed by `service`.
    pub(crate) fn path_to(&self, service: &Service) -> Vec<Service> {
        let mut path: Vec<Service> = self.entries.iter().map(|e| e.service.clone()).collect();
        path.push(service.clone());
        path
    }

    pub(crate) fn current(&self) -> Option<&Service> {
        self.entries.last().map(|e| &e.service)
    }
}

/// Keeps a request on the stack until dropped, including during unwinding.
pub(crate) struct StackGuard<'a> {
    stack: &'a RefCell<ResolutionStack>,
}

impl<'a> StackGuard<'a> {
    /// Pushes a request, failing if the same service is already being
    /// built by the same registration. A service requested again through a
    /// different registration is allowed, so a composite can resolve the
    /// other implementations of the service it implements.
    pub(crate) fn push(
        stack: &'a RefCell<ResolutionStack>,
        service: &Service,
        registration: RegistrationId,
        max_depth: usize,
    ) -> DiResult<Self> {
        let mut s = stack.borrow_mut();

        // Circular detection BEFORE pushing the new request
        if s.entries
            .iter()
            .any(|e| e.registration == registration && e.service == *service)
        {
            return Err(DiError::Circular { path: s.path_to(service) });
        }

        let depth = THREAD_DEPTH.with(Cell::get);
        if depth >= max_depth {
            return Err(DiError::DepthExceeded(max_depth));
        }

        s.entries.push(StackEntry {
            service: service.clone(),
            registration,
        });
        THREAD_DEPTH.with(|d| d.set(depth + 1));
        Ok(Self { stack })
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().entries.pop();
        THREAD_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Marks a shared-instance cell as being initialised by this thread.
///
/// Entering the same cell twice on one thread means the component asked for
/// itself through a fresh operation. Blocking on the cell would deadlock, so
/// the caller reports a cycle instead.
pub(crate) struct InFlightGuard {
    cell: usize,
}

impl InFlightGuard {
    pub(crate) fn enter(cell: usize) -> Option<Self> {
        IN_FLIGHT.with(|cells| {
            let mut cells = cells.borrow_mut();
            if cells.contains(&cell) {
                None
            } else {
                cells.push(cell);
                Some(Self { cell })
            }
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|cells| {
            let mut cells = cells.borrow_mut();
            if let Some(pos) = cells.iter().rposition(|&c| c == self.cell) {
                cells.remove(pos);
            }
        });
    }
}
