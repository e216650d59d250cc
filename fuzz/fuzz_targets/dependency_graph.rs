#![no_main]

use ferrous_resolve::{ContainerBuilder, Resolver};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

const NODES: usize = 8;

struct Node;

fuzz_target!(|data: &[u8]| {
    if data.len() < NODES {
        return;
    }

    // Byte i is the adjacency bitmask of node i.
    let mut builder = ContainerBuilder::new();
    for (index, &edges) in data.iter().take(NODES).enumerate() {
        let shared = edges & 1 == 1;
        let registration = builder
            .register(move |ctx, _| {
                for target in 0..NODES {
                    if edges & (1 << target) != 0 {
                        ctx.resolve_keyed::<Node>(target as i64)?;
                    }
                }
                Ok(Arc::new(Node))
            })
            .keyed(index as i64);
        if shared {
            registration.single_instance();
        }
    }
    let Ok(container) = builder.build() else {
        return;
    };

    for index in 0..NODES {
        if let Err(error) = container.resolve_keyed::<Node>(index as i64) {
            assert!(error.is_circular(), "unexpected failure: {error}");
        }
    }
});
