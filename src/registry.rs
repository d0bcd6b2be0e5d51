use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::model::TrackingPoint;

/// Outcome of registering one tracking point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// First point with this key.
    Registered,
    /// Key already taken; carries the first-seen point. Nothing was changed.
    Duplicate(TrackingPoint),
    /// Dynamic names are not keyed.
    Unkeyed,
}

/// Seam through which the transform reports each point as it is discovered.
pub trait TrackingRegistry {
    fn check_and_register(&mut self, point: &TrackingPoint) -> Registration;
}

/// Session-wide map from `type:name` to the first point that used it.
///
/// First insertion wins. Keys compare exactly and case-sensitively. Points
/// with a dynamic name all share the sentinel name and are never keyed, so
/// two dynamic markers are never reported against each other.
#[derive(Debug, Default)]
pub struct DuplicateRegistry {
    entries: HashMap<String, TrackingPoint>,
}

impl DuplicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every registration; hosts call this at the start of a full build.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TrackingPoint> {
        self.entries.get(key)
    }
}

impl TrackingRegistry for DuplicateRegistry {
    fn check_and_register(&mut self, point: &TrackingPoint) -> Registration {
        if point.dynamic {
            return Registration::Unkeyed;
        }
        let key = point.key();
        match self.entries.get(&key) {
            Some(original) => Registration::Duplicate(original.clone()),
            None => {
                self.entries.insert(key, point.clone());
                Registration::Registered
            }
        }
    }
}

/// Registry shared by parallel transforms. The lock is held for one
/// check-and-register, never across a whole module.
pub struct SharedRegistry<'a>(pub &'a Mutex<DuplicateRegistry>);

impl TrackingRegistry for SharedRegistry<'_> {
    fn check_and_register(&mut self, point: &TrackingPoint) -> Registration {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_and_register(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkerKind;

    fn point(kind: MarkerKind, name: &str, file: &str) -> TrackingPoint {
        TrackingPoint {
            kind,
            name: name.into(),
            element_name: "div".into(),
            file_path: file.into(),
            dynamic: false,
        }
    }

    #[test]
    fn first_registration_wins() {
        let mut reg = DuplicateRegistry::new();
        let a = point(MarkerKind::Show, "ad", "src/A.tsx");
        let b = point(MarkerKind::Show, "ad", "src/B.tsx");
        assert_eq!(reg.check_and_register(&a), Registration::Registered);
        assert_eq!(reg.check_and_register(&b), Registration::Duplicate(a.clone()));
        assert_eq!(reg.get("show:ad"), Some(&a));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn kind_and_case_are_part_of_the_key() {
        let mut reg = DuplicateRegistry::new();
        assert_eq!(
            reg.check_and_register(&point(MarkerKind::Show, "ad", "a")),
            Registration::Registered
        );
        assert_eq!(
            reg.check_and_register(&point(MarkerKind::Click, "ad", "a")),
            Registration::Registered
        );
        assert_eq!(
            reg.check_and_register(&point(MarkerKind::Show, "Ad", "a")),
            Registration::Registered
        );
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn dynamic_points_are_never_keyed() {
        let mut reg = DuplicateRegistry::new();
        let mut p = point(MarkerKind::Click, "dynamic", "a");
        p.dynamic = true;
        assert_eq!(reg.check_and_register(&p), Registration::Unkeyed);
        assert_eq!(reg.check_and_register(&p), Registration::Unkeyed);
        assert!(reg.is_empty());
    }

    #[test]
    fn reset_clears_registrations() {
        let mut reg = DuplicateRegistry::new();
        let p = point(MarkerKind::Show, "ad", "a");
        reg.check_and_register(&p);
        reg.reset();
        assert_eq!(reg.check_and_register(&p), Registration::Registered);
    }

    #[test]
    fn shared_registry_serializes_through_the_mutex() {
        let shared = Mutex::new(DuplicateRegistry::new());
        let p = point(MarkerKind::Show, "ad", "a");
        assert_eq!(SharedRegistry(&shared).check_and_register(&p), Registration::Registered);
        assert!(matches!(
            SharedRegistry(&shared).check_and_register(&p),
            Registration::Duplicate(_)
        ));
    }
}
