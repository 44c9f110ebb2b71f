//! Shared memory arena for the nodes of one graph, aka a tape.
//! See https://rufflewind.com/2016-12-30/reverse-mode-automatic-differentiation
//!
//! Nodes refer to their inputs by index into the tape, so no node owns another one
//! and every node is released together with the tape.

use std::{cell::RefCell, fmt};

use log::{debug, trace};

#[derive(Default, Debug)]
pub struct Tape {
    pub(crate) nodes: RefCell<Vec<TapeNode>>,
}

#[derive(Clone, Debug)]
pub(crate) struct TapeNode {
    pub(crate) label: Option<String>,
    pub(crate) op: TapeOp,
    pub(crate) data: f64,
    pub(crate) grad: f64,
}

/// The operation that produced a node, with the indices of its inputs and the
/// constants its derivative needs.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TapeOp {
    Leaf,
    Add(u32, u32),
    Mul(u32, u32),
    Pow { term: u32, exponent: f64 },
    Relu(u32),
    Tanh(u32),
}

impl TapeOp {
    pub(crate) fn inputs(&self) -> impl Iterator<Item = u32> {
        use TapeOp::*;
        let (first, second) = match *self {
            Leaf => (None, None),
            Add(lhs, rhs) | Mul(lhs, rhs) => (Some(lhs), Some(rhs)),
            Pow { term, .. } | Relu(term) | Tanh(term) => (Some(term), None),
        };
        first.into_iter().chain(second)
    }

    pub(crate) fn kind(&self) -> OpKind {
        match *self {
            TapeOp::Leaf => OpKind::Leaf,
            TapeOp::Add(..) => OpKind::Add,
            TapeOp::Mul(..) => OpKind::Mul,
            TapeOp::Pow { exponent, .. } => OpKind::Pow { exponent },
            TapeOp::Relu(_) => OpKind::Relu,
            TapeOp::Tanh(_) => OpKind::Tanh,
        }
    }
}

/// Kind of operation a node was built with, for introspection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OpKind {
    Leaf,
    Add,
    Mul,
    Pow { exponent: f64 },
    Relu,
    Tanh,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Leaf => write!(f, "leaf"),
            OpKind::Add => write!(f, "+"),
            OpKind::Mul => write!(f, "*"),
            OpKind::Pow { exponent } => write!(f, "pow of {exponent}"),
            OpKind::Relu => write!(f, "relu"),
            OpKind::Tanh => write!(f, "tanh"),
        }
    }
}

/// A handle to one traced scalar on a [`Tape`].
///
/// Handles are `Copy`; the node itself lives in the tape and cannot outlive it.
#[derive(Copy, Clone)]
pub struct ScalarNode<'a> {
    pub(crate) tape: &'a Tape,
    pub(crate) idx: u32,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unlabeled leaf holding `value`. Any `f64`, NaN and infinities included, is accepted.
    pub fn leaf(&self, value: f64) -> ScalarNode<'_> {
        self.push(None, TapeOp::Leaf, value)
    }

    pub fn labeled(&self, label: impl Into<String>, value: f64) -> ScalarNode<'_> {
        self.push(Some(label.into()), TapeOp::Leaf, value)
    }

    /// Number of nodes recorded so far.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Every node on the tape, in creation order.
    pub fn nodes(&self) -> Vec<ScalarNode<'_>> {
        (0..self.len() as u32)
            .map(|idx| ScalarNode { tape: self, idx })
            .collect()
    }

    /// Reset the gradient of every node on the tape to zero.
    ///
    /// `backward` never does this by itself; call it before differentiating a graph again.
    pub fn zero_grad(&self) {
        let mut nodes = self.nodes.borrow_mut();
        debug!("zero_grad: clearing {} nodes", nodes.len());
        for node in nodes.iter_mut() {
            node.grad = 0.;
        }
    }

    pub(crate) fn owns(&self, node: &ScalarNode) -> bool {
        std::ptr::eq(self, node.tape)
    }

    pub(crate) fn push_op(&self, op: TapeOp, data: f64) -> ScalarNode<'_> {
        let label = expr_label(&self.nodes.borrow(), &op);
        self.push(label, op, data)
    }

    fn push(&self, label: Option<String>, op: TapeOp, data: f64) -> ScalarNode<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let idx = nodes.len();
        trace!("push a{idx}: {op:?} = {data}");
        nodes.push(TapeNode {
            label,
            op,
            data,
            grad: 0.,
        });
        ScalarNode {
            tape: self,
            idx: idx as u32,
        }
    }
}

#[cfg(feature = "expr_name")]
fn expr_label(nodes: &[TapeNode], op: &TapeOp) -> Option<String> {
    let name = |idx: u32| {
        let node = &nodes[idx as usize];
        node.label.clone().unwrap_or_else(|| format!("{}", node.data))
    };
    let label = match *op {
        TapeOp::Leaf => return None,
        TapeOp::Add(lhs, rhs) => format!("({} + {})", name(lhs), name(rhs)),
        TapeOp::Mul(lhs, rhs) => format!("{} * {}", name(lhs), name(rhs)),
        TapeOp::Pow { term, exponent } => format!("pow({}, {exponent})", name(term)),
        TapeOp::Relu(term) => format!("relu({})", name(term)),
        TapeOp::Tanh(term) => format!("tanh({})", name(term)),
    };
    Some(label)
}

#[cfg(not(feature = "expr_name"))]
fn expr_label(_nodes: &[TapeNode], _op: &TapeOp) -> Option<String> {
    None
}

impl<'a> ScalarNode<'a> {
    /// The forward value computed when the node was built.
    pub fn value(&self) -> f64 {
        self.tape.nodes.borrow()[self.idx as usize].data
    }

    /// The gradient accumulated by the backward passes run so far.
    pub fn grad(&self) -> f64 {
        self.tape.nodes.borrow()[self.idx as usize].grad
    }

    pub fn label(&self) -> Option<String> {
        self.tape.nodes.borrow()[self.idx as usize].label.clone()
    }

    /// Labels are for display only and can be changed at any time.
    pub fn set_label(&self, label: impl Into<String>) {
        self.tape.nodes.borrow_mut()[self.idx as usize].label = Some(label.into());
    }

    pub fn op(&self) -> OpKind {
        self.tape.nodes.borrow()[self.idx as usize].op.kind()
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.op(), OpKind::Leaf)
    }

    /// The nodes this one was computed from, in operand order. Empty for leaves.
    pub fn inputs(&self) -> Vec<ScalarNode<'a>> {
        let op = self.tape.nodes.borrow()[self.idx as usize].op;
        op.inputs()
            .map(|idx| ScalarNode {
                tape: self.tape,
                idx,
            })
            .collect()
    }

    /// Position of the node on its tape.
    pub fn index(&self) -> usize {
        self.idx as usize
    }

    pub fn tape(&self) -> &'a Tape {
        self.tape
    }
}

impl PartialEq for ScalarNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tape, other.tape) && self.idx == other.idx
    }
}

impl Eq for ScalarNode<'_> {}

impl fmt::Display for ScalarNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.tape.nodes.borrow();
        let node = &nodes[self.idx as usize];
        write!(f, "Node(data={:?}", node.data)?;
        if !matches!(node.op, TapeOp::Leaf) {
            write!(f, ", op={}", node.op.kind())?;
        }
        if let Some(label) = &node.label {
            write!(f, ", label={label}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for ScalarNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.tape.nodes.borrow();
        let node = &nodes[self.idx as usize];
        f.debug_struct("ScalarNode")
            .field("index", &self.idx)
            .field("data", &node.data)
            .field("grad", &node.grad)
            .field("op", &node.op.kind())
            .field("label", &node.label)
            .finish()
    }
}
