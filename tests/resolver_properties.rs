// tests/resolver_properties.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use proptest::prelude::*;
use wavebuild::dag::resolve_waves;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = BTreeMap<String, BTreeSet<String>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let deps = potential
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|d| format!("task_{:02}", d % i))
                        .collect();
                    (format!("task_{:02}", i), deps)
                })
                .collect()
        })
    })
}

proptest! {
    #[test]
    fn waves_respect_dependencies(deps in dag_strategy(24)) {
        let waves = resolve_waves(&deps).unwrap();

        let mut wave_of = HashMap::new();
        for (idx, wave) in waves.iter().enumerate() {
            prop_assert!(!wave.is_empty());

            let mut sorted = wave.clone();
            sorted.sort();
            prop_assert_eq!(&sorted, wave);

            for name in wave {
                prop_assert!(wave_of.insert(name.clone(), idx).is_none(), "{} placed twice", name);
            }
        }
        prop_assert_eq!(wave_of.len(), deps.len());

        for (task, task_deps) in &deps {
            let wave = wave_of[task];
            let expected = task_deps
                .iter()
                .map(|d| wave_of[d] + 1)
                .max()
                .unwrap_or(0);
            // Kahn levels place every task right after its deepest dependency.
            prop_assert_eq!(wave, expected, "task {}", task);
        }
    }

    #[test]
    fn adding_a_back_edge_is_always_detected(deps in dag_strategy(12)) {
        let mut deps = deps;
        let last = format!("task_{:02}", deps.len() - 1);
        prop_assume!(!deps[&last].is_empty());

        // Make one of the last task's dependencies depend on it in turn.
        let on_path = deps[&last].iter().next().cloned().unwrap();
        deps.get_mut(&on_path).unwrap().insert(last.clone());

        let err = resolve_waves(&deps).unwrap_err();
        match err {
            wavebuild::errors::WavebuildError::CycleDetected(names) => {
                prop_assert!(names.contains(&last));
                prop_assert!(names.contains(&on_path));
                let mut sorted = names.clone();
                sorted.sort();
                prop_assert_eq!(sorted, names);
            }
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
    }
}
