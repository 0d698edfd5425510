use std::collections::{BTreeSet, HashMap};

use crate::patch::PatchMetadata;

#[derive(Debug, Default)]
pub(crate) struct DependencyPlan {
    /// Indices into the input, each patch after the dependencies it can reach.
    pub(crate) order: Vec<usize>,
    /// Patches that sit on a dependency cycle.
    pub(crate) cyclic: BTreeSet<usize>,
}

/// Tarjan bookkeeping, one slot per patch.
struct Walk<'p> {
    patches: &'p [PatchMetadata],
    index: HashMap<&'p str, usize>,
    discovered: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    plan: DependencyPlan,
}

/// Stable topological order: input order is kept except where a dependency has to move ahead.
/// Unknown dependency ids are ignored here; the caller reports them as unmet.
///
/// Every strongly connected component with more than one patch, or a patch depending on
/// itself, is flagged cyclic as a whole.
pub(crate) fn dependency_order(patches: &[PatchMetadata]) -> DependencyPlan {
    let mut walk = Walk {
        patches,
        index: patches
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.as_str(), i))
            .collect(),
        discovered: vec![None; patches.len()],
        low: vec![0; patches.len()],
        on_stack: vec![false; patches.len()],
        stack: Vec::new(),
        next: 0,
        plan: DependencyPlan::default(),
    };
    for i in 0..patches.len() {
        if walk.discovered[i].is_none() {
            walk.visit(i);
        }
    }
    walk.plan
}

impl Walk<'_> {
    fn deps(&self, i: usize) -> Vec<usize> {
        self.patches[i]
            .dependencies
            .iter()
            .filter_map(|d| self.index.get(d.as_str()).copied())
            .collect()
    }

    fn visit(&mut self, i: usize) {
        self.discovered[i] = Some(self.next);
        self.low[i] = self.next;
        self.next += 1;
        self.stack.push(i);
        self.on_stack[i] = true;

        let deps = self.deps(i);
        for &d in &deps {
            match self.discovered[d] {
                None => {
                    self.visit(d);
                    self.low[i] = self.low[i].min(self.low[d]);
                }
                Some(seen) if self.on_stack[d] => {
                    self.low[i] = self.low[i].min(seen);
                }
                Some(_) => {}
            }
        }

        if Some(self.low[i]) != self.discovered[i] {
            return;
        }

        // `i` roots a component; everything above it on the stack belongs to it.
        let mut component = Vec::new();
        while let Some(top) = self.stack.pop() {
            self.on_stack[top] = false;
            component.push(top);
            if top == i {
                break;
            }
        }
        component.sort_unstable();
        if component.len() > 1 || deps.contains(&i) {
            self.plan.cyclic.extend(component.iter().copied());
        }
        self.plan.order.extend(component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, deps: &[&str]) -> PatchMetadata {
        PatchMetadata {
            id: id.to_string(),
            component_name: "C".to_string(),
            upstream_version: "1".to_string(),
            fragment_version: "1".to_string(),
            created_at: 0,
            updated_at: 0,
            description: String::new(),
            author: String::new(),
            reason: String::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn keeps_input_order_without_dependencies() {
        let plan = dependency_order(&[meta("a", &[]), meta("b", &[]), meta("c", &[])]);
        assert_eq!(plan.order, vec![0, 1, 2]);
        assert!(plan.cyclic.is_empty());
    }

    #[test]
    fn moves_dependencies_ahead_of_dependents() {
        let plan = dependency_order(&[meta("a", &["c"]), meta("b", &[]), meta("c", &[])]);
        assert_eq!(plan.order, vec![2, 0, 1]);
    }

    #[test]
    fn flags_every_member_of_a_cycle() {
        let plan = dependency_order(&[
            meta("a", &["b"]),
            meta("b", &["c"]),
            meta("c", &["a"]),
            meta("d", &["missing"]),
        ]);
        assert_eq!(plan.cyclic, BTreeSet::from([0, 1, 2]));
        assert_eq!(plan.order.len(), 4);
        assert!(!plan.cyclic.contains(&3));
    }

    #[test]
    fn flags_cycle_members_reached_through_a_shortcut() {
        // v -> b -> v closes the cycle, and a sits on v -> a -> b.
        let plan = dependency_order(&[meta("v", &["b", "a"]), meta("a", &["b"]), meta("b", &["v"])]);
        assert_eq!(plan.cyclic, BTreeSet::from([0, 1, 2]));
        assert_eq!(plan.order.len(), 3);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let plan = dependency_order(&[meta("a", &[]), meta("loop", &["loop"])]);
        assert_eq!(plan.cyclic, BTreeSet::from([1]));
        assert_eq!(plan.order, vec![0, 1]);
    }

    #[test]
    fn dependents_of_a_cycle_are_not_cyclic() {
        let plan = dependency_order(&[meta("x", &["a"]), meta("a", &["b"]), meta("b", &["a"])]);
        assert_eq!(plan.cyclic, BTreeSet::from([1, 2]));
        assert_eq!(plan.order, vec![1, 2, 0]);
    }
}
