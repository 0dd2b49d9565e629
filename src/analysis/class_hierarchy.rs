//! Single-inheritance inference between declared classes
//!
//! The image records no base-class pointer. A class is taken to derive from
//! the closest earlier class whose method list is a prefix of its own and
//! whose variable count does not exceed its own. Two unrelated classes that
//! happen to share a method prefix are linked too; the heuristic accepts that.

use crate::usecode::{ClassRef, ClassSymbol};
use serde::Serialize;

/// Inferred base for every class, by declaration index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassHierarchy {
    bases: Vec<Option<ClassRef>>,
}

impl ClassHierarchy {
    pub fn infer(classes: &[ClassSymbol]) -> Self {
        let bases = classes
            .iter()
            .enumerate()
            .map(|(i, class)| {
                let base = (0..i)
                    .rev()
                    .find(|&j| is_base_of(&classes[j], class))
                    .map(ClassRef);
                if let Some(ClassRef(j)) = base {
                    log::debug!("Class {} derives from {}", class.name, classes[j].name);
                }
                base
            })
            .collect();
        Self { bases }
    }

    /// Inferred base of `class`, `None` for roots
    pub fn base_of(&self, class: ClassRef) -> Option<ClassRef> {
        self.bases.get(class.0).copied().flatten()
    }

    /// Pairs of (class, base) for every derived class
    pub fn edges(&self) -> impl Iterator<Item = (ClassRef, ClassRef)> + '_ {
        self.bases
            .iter()
            .enumerate()
            .filter_map(|(i, base)| base.map(|b| (ClassRef(i), b)))
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

fn is_base_of(base: &ClassSymbol, class: &ClassSymbol) -> bool {
    base.num_vars <= class.num_vars
        && base.method_ids.len() <= class.method_ids.len()
        && class.method_ids[..base.method_ids.len()] == base.method_ids[..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prefix_methods_link_to_base() {
        let classes = vec![
            ClassSymbol::new("Animal", 0, 2, vec![10, 11]),
            ClassSymbol::new("Dog", 1, 3, vec![10, 11, 12]),
        ];
        let hierarchy = ClassHierarchy::infer(&classes);
        assert_eq!(hierarchy.base_of(ClassRef(1)), Some(ClassRef(0)));
        assert_eq!(hierarchy.base_of(ClassRef(0)), None);
    }

    #[test]
    fn mismatched_prefix_is_a_root() {
        let classes = vec![
            ClassSymbol::new("Animal", 0, 2, vec![10, 11]),
            ClassSymbol::new("Rock", 1, 3, vec![10, 99, 12]),
        ];
        let hierarchy = ClassHierarchy::infer(&classes);
        assert_eq!(hierarchy.base_of(ClassRef(1)), None);
        assert_eq!(hierarchy.edges().count(), 0);
    }

    #[test]
    fn closest_candidate_wins() {
        let classes = vec![
            ClassSymbol::new("A", 0, 1, vec![1]),
            ClassSymbol::new("B", 1, 2, vec![1, 2]),
            ClassSymbol::new("C", 2, 3, vec![1, 2, 3]),
        ];
        let hierarchy = ClassHierarchy::infer(&classes);
        assert_eq!(hierarchy.base_of(ClassRef(2)), Some(ClassRef(1)));
        assert_eq!(hierarchy.base_of(ClassRef(1)), Some(ClassRef(0)));
    }

    #[test]
    fn more_variables_than_derived_rejects_candidate() {
        let classes = vec![
            ClassSymbol::new("Big", 0, 5, vec![1]),
            ClassSymbol::new("Small", 1, 1, vec![1, 2]),
        ];
        assert_eq!(ClassHierarchy::infer(&classes).base_of(ClassRef(1)), None);
    }

    fn class_strategy() -> impl Strategy<Value = (u32, Vec<u32>)> {
        (0u32..6, prop::collection::vec(0u32..4, 0..5))
    }

    proptest! {
        #[test]
        fn inferred_edges_are_prefix_and_variable_monotone(
            raw in prop::collection::vec(class_strategy(), 0..8)
        ) {
            let classes: Vec<ClassSymbol> = raw
                .into_iter()
                .enumerate()
                .map(|(i, (vars, methods))| ClassSymbol::new(format!("C{}", i), i as u32, vars, methods))
                .collect();
            let hierarchy = ClassHierarchy::infer(&classes);
            prop_assert_eq!(hierarchy.len(), classes.len());

            for (i, class) in classes.iter().enumerate() {
                match hierarchy.base_of(ClassRef(i)) {
                    Some(ClassRef(j)) => {
                        prop_assert!(j < i);
                        let base = &classes[j];
                        prop_assert!(base.num_vars <= class.num_vars);
                        prop_assert!(class.method_ids.starts_with(&base.method_ids));
                        // nothing closer qualified
                        for k in j + 1..i {
                            prop_assert!(!is_base_of(&classes[k], class));
                        }
                    }
                    None => {
                        for j in 0..i {
                            prop_assert!(!is_base_of(&classes[j], class));
                        }
                    }
                }
            }
        }
    }
}
