#![no_main]

use ferrous_resolve::{ContainerBuilder, LifetimeScope, Lifetime, Resolver};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

struct Value(u8);

fuzz_target!(|data: &[u8]| {
    let Some((&first, ops)) = data.split_first() else {
        return;
    };

    let lifetime = match first % 4 {
        0 => Lifetime::Root,
        1 => Lifetime::per_scope(),
        2 => Lifetime::matching("request"),
        _ => Lifetime::PerDependency,
    };
    let mut builder = ContainerBuilder::new();
    builder.register(move |_, _| Ok(Arc::new(Value(first)))).lifetime(lifetime);
    let Ok(container) = builder.build() else {
        return;
    };

    // Each byte drives one operation against a stack of open scopes.
    let mut scopes: Vec<LifetimeScope> = vec![container.scope().clone()];
    for &op in ops.iter().take(256) {
        let top = scopes[scopes.len() - 1].clone();
        match op % 5 {
            0 => {
                if let Ok(child) = top.begin_scope() {
                    scopes.push(child);
                }
            }
            1 => {
                if let Ok(child) = top.begin_tagged_scope("request") {
                    scopes.push(child);
                }
            }
            2 => {
                if let Ok(value) = top.resolve::<Value>() {
                    assert_eq!(value.0, first);
                }
            }
            3 => {
                if scopes.len() > 1 {
                    let Some(scope) = scopes.pop() else { continue };
                    let _ = scope.dispose();
                    assert!(scope.resolve::<Value>().is_err());
                }
            }
            _ => {
                let _ = top.resolve_all::<Value>();
            }
        }
    }
    let _ = container.dispose();
});
