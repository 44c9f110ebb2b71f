//! The backward pass: a depth-first topological sort of the nodes reachable from
//! the root, then one reverse walk that fires each node's local gradient rule.

use std::collections::HashSet;

use log::{debug, trace};

use crate::{
    error::GradError,
    tape::{ScalarNode, TapeNode, TapeOp},
    Tape,
};

/// Post-order depth-first walk over the inputs of `root`. Every node comes after
/// all of its inputs, and each reachable node appears exactly once.
fn topo_sort(nodes: &[TapeNode], root: u32) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut order = vec![];
    // (node, inputs already scheduled)
    let mut stack = vec![(root, false)];
    while let Some((idx, expanded)) = stack.pop() {
        if expanded {
            order.push(idx);
            continue;
        }
        if !seen.insert(idx) {
            continue;
        }
        stack.push((idx, true));
        let inputs: Vec<u32> = nodes[idx as usize].op.inputs().collect();
        for &input in inputs.iter().rev() {
            if !seen.contains(&input) {
                stack.push((input, false));
            }
        }
    }
    order
}

/// Add the contribution of node `idx` to the gradients of its inputs.
fn propagate(nodes: &mut [TapeNode], idx: u32) {
    use TapeOp::*;
    let node = &nodes[idx as usize];
    let (op, data, grad) = (node.op, node.data, node.grad);
    trace!("propagate a{idx}: {op:?} grad={grad}");
    match op {
        Leaf => (),
        Add(lhs, rhs) => {
            nodes[lhs as usize].grad += grad;
            nodes[rhs as usize].grad += grad;
        }
        Mul(lhs, rhs) => {
            let (lhs_data, rhs_data) = (nodes[lhs as usize].data, nodes[rhs as usize].data);
            nodes[lhs as usize].grad += rhs_data * grad;
            nodes[rhs as usize].grad += lhs_data * grad;
        }
        Pow { term, exponent } => {
            let x = nodes[term as usize].data;
            nodes[term as usize].grad += exponent * x.powf(exponent - 1.) * grad;
        }
        Relu(term) => {
            if data > 0. {
                nodes[term as usize].grad += grad;
            }
        }
        Tanh(term) => nodes[term as usize].grad += (1. - data * data) * grad,
    }
}

impl<'a> ScalarNode<'a> {
    /// Nodes reachable from this one, inputs before the nodes built from them.
    /// The backward pass walks this list from the end.
    pub fn topological_order(&self) -> Vec<ScalarNode<'a>> {
        let nodes = self.tape.nodes.borrow();
        topo_sort(&nodes, self.idx)
            .into_iter()
            .map(|idx| ScalarNode {
                tape: self.tape,
                idx,
            })
            .collect()
    }

    /// The entry point to backpropagation.
    ///
    /// Sets this node's gradient to 1 and accumulates d(self)/d(node) into every node
    /// it was built from. Gradients of the other nodes are never reset, so running it
    /// again on the same graph adds to the previous results: call it once per freshly
    /// built graph, or call [`Tape::zero_grad`](crate::Tape::zero_grad) first.
    pub fn backward(&self) {
        self.backward_with(|_| ());
    }

    /// Same as [`backward`](Self::backward), calling `callback` with each node
    /// right after its gradient was passed on to its inputs.
    pub fn backward_with(&self, mut callback: impl FnMut(ScalarNode<'a>)) {
        let order = topo_sort(&self.tape.nodes.borrow(), self.idx);
        debug!(
            "backward from a{}: {} reachable nodes",
            self.idx,
            order.len()
        );
        self.tape.nodes.borrow_mut()[self.idx as usize].grad = 1.;
        for &idx in order.iter().rev() {
            propagate(&mut self.tape.nodes.borrow_mut(), idx);
            callback(ScalarNode {
                tape: self.tape,
                idx,
            });
        }
    }
}

impl Tape {
    /// [`ScalarNode::backward`] from `root`, which must live on this tape.
    pub fn backward<'a>(&'a self, root: ScalarNode<'a>) -> Result<(), GradError> {
        self.check(&root.into())?;
        root.backward();
        Ok(())
    }

    /// [`ScalarNode::backward_with`] from `root`, which must live on this tape.
    pub fn backward_with<'a>(
        &'a self,
        root: ScalarNode<'a>,
        callback: impl FnMut(ScalarNode<'a>),
    ) -> Result<(), GradError> {
        self.check(&root.into())?;
        root.backward_with(callback);
        Ok(())
    }

    /// [`ScalarNode::topological_order`] of `root`, which must live on this tape.
    pub fn topological_order<'a>(
        &'a self,
        root: ScalarNode<'a>,
    ) -> Result<Vec<ScalarNode<'a>>, GradError> {
        self.check(&root.into())?;
        Ok(root.topological_order())
    }
}
