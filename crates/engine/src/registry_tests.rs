// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn clones_share_state() {
    let a: Registry<String, u32> = Registry::new();
    let b = a.clone();
    a.insert("x".to_string(), 1);
    assert_eq!(b.get("x"), Some(1));
    assert_eq!(b.len(), 1);
}

#[test]
fn update_mutates_in_place() {
    let reg: Registry<String, Vec<u32>> = Registry::new();
    reg.insert("k".to_string(), vec![1]);

    assert_eq!(reg.update("k", |v| { v.push(2); v.len() }), Some(2));
    assert_eq!(reg.update("missing", |v| v.len()), None);
    assert_eq!(reg.get("k"), Some(vec![1, 2]));
}

#[test]
fn remove_and_clear() {
    let reg = Registry::from_map(HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]));
    assert_eq!(reg.remove("a"), Some(1));
    assert!(!reg.contains("a"));
    assert_eq!(reg.snapshot(), HashMap::from([("b".to_string(), 2)]));
    reg.clear();
    assert!(reg.is_empty());
}

#[test]
fn concurrent_updates_to_distinct_keys() {
    let reg: Registry<u32, u32> = Registry::new();
    for k in 0..8 {
        reg.insert(k, 0);
    }
    let handles: Vec<_> = (0..8)
        .map(|k| {
            let reg = reg.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    reg.update(&k, |v| *v += 1);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(reg.values().iter().all(|v| *v == 1000));
}
