//! The backward driver fires every reachable node once, consumers before inputs.

use std::collections::HashMap;

use scalargrad::{ScalarNode, Tape};

/// A layered graph where most nodes feed several consumers.
fn mesh(tape: &Tape) -> ScalarNode<'_> {
    let mut layer: Vec<_> = (0..4).map(|i| tape.leaf(i as f64 * 0.25 + 0.5)).collect();
    for depth in 0..5 {
        layer = (0..layer.len())
            .map(|i| {
                let a = layer[i];
                let b = layer[(i + 1) % layer.len()];
                match depth % 3 {
                    0 => a * b + a,
                    1 => (a - b).tanh(),
                    _ => (a + b).relu() * 0.5,
                }
            })
            .collect();
    }
    layer.into_iter().fold(tape.leaf(0.), |acc, node| acc + node)
}

#[test]
fn each_node_fires_once() {
    let tape = Tape::new();
    let root = mesh(&tape);
    let mut visits: HashMap<usize, usize> = HashMap::new();
    root.backward_with(|node| *visits.entry(node.index()).or_default() += 1);

    let reachable = root.topological_order();
    assert_eq!(visits.len(), reachable.len());
    assert!(visits.values().all(|&count| count == 1));
}

#[test]
fn consumers_fire_before_their_inputs() {
    let tape = Tape::new();
    let root = mesh(&tape);
    let mut fired = vec![];
    root.backward_with(|node| fired.push(node));

    assert_eq!(fired.first(), Some(&root));
    let position: HashMap<usize, usize> = fired
        .iter()
        .enumerate()
        .map(|(pos, node)| (node.index(), pos))
        .collect();
    for node in &fired {
        for input in node.inputs() {
            assert!(
                position[&node.index()] < position[&input.index()],
                "{node} fired after its input {input}"
            );
        }
    }
}

#[test]
fn gradient_is_complete_when_the_rule_fires() {
    // Snapshot each node's gradient when it fires; nothing may change it afterwards.
    let tape = Tape::new();
    let root = mesh(&tape);
    let mut snapshots = vec![];
    root.backward_with(|node| snapshots.push((node, node.grad())));
    for (node, grad) in snapshots {
        assert_eq!(node.grad(), grad, "{node:?} received gradient after firing");
    }
}

#[test]
fn order_is_topological() {
    let tape = Tape::new();
    let root = mesh(&tape);
    let order = root.topological_order();
    assert_eq!(order.last(), Some(&root));
    for (pos, node) in order.iter().enumerate() {
        for input in node.inputs() {
            assert!(order[..pos].contains(&input));
        }
    }
}
