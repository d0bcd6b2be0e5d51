use std::collections::HashSet;

use swc_core::ecma::{
    ast::{Ident, Module},
    visit::{Visit, VisitWith},
};

use crate::model::ElementHandle;

struct IdentCollector<'a> {
    out: &'a mut HashSet<String>,
}

impl Visit for IdentCollector<'_> {
    fn visit_ident(&mut self, n: &Ident) {
        self.out.insert(n.sym.to_string());
    }
}

/// Result of one allocation: the handle plus every generated name that had
/// to be skipped because the module already used it.
#[derive(Debug)]
pub struct Allocation {
    pub handle: ElementHandle,
    pub collisions: Vec<String>,
}

/// Hands out `trackingRefN` handles in scan order.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    next: usize,
    taken: HashSet<String>,
}

impl HandleAllocator {
    /// Allocator seeded with every identifier already present in `module`.
    pub fn for_module(module: &Module) -> Self {
        let mut taken = HashSet::new();
        module.visit_with(&mut IdentCollector { out: &mut taken });
        Self { next: 0, taken }
    }

    pub fn allocate(&mut self) -> Allocation {
        let mut collisions = Vec::new();
        loop {
            let handle = ElementHandle::new(self.next);
            self.next += 1;
            let bindings = handle.bindings();
            let clashing: Vec<&String> =
                bindings.iter().filter(|b| self.taken.contains(*b)).collect();
            if clashing.is_empty() {
                for b in bindings {
                    self.taken.insert(b);
                }
                log::debug!("allocated tracking handle {}", handle.name());
                return Allocation { handle, collisions };
            }
            collisions.extend(clashing.into_iter().cloned());
        }
    }
}
