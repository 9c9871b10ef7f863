//! Totalizer cardinality encoding.
//!
//! The inputs are the leaves of a balanced binary tree. Every internal node has a unary
//! counter: output `i` (0-based) is forced true whenever at least `i + 1` of the leaves below
//! it are true, via the adder clauses `¬a_i ∨ ¬b_j ∨ c_{i+j}`. Only this upward direction is
//! encoded, which is all an upper bound needs: asserting `¬outputs[k]` at the root rules out
//! every assignment with more than `k` true inputs.

use crate::encoding::context::EncodingContext;
use crate::sat::literal::Lit;

/// Up to this many inputs, "at most one" is encoded pairwise instead of with a tree.
const PAIRWISE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totalizer {
    outputs: Vec<Lit>,
}

impl Totalizer {
    /// Builds the counter tree over `inputs`. A single input is its own counter.
    pub fn build(ctx: &mut EncodingContext<'_>, inputs: &[Lit]) -> Self {
        Self {
            outputs: build_node(ctx, inputs),
        }
    }

    /// `outputs()[i]` is implied by "at least `i + 1` inputs are true".
    #[must_use]
    pub fn outputs(&self) -> &[Lit] {
        &self.outputs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// The unit literal that bounds the count by `k`, or `None` if `k` is no bound at all.
    #[must_use]
    pub fn at_most(&self, k: usize) -> Option<Lit> {
        self.outputs.get(k).map(|l| l.negated())
    }
}

fn build_node(ctx: &mut EncodingContext<'_>, inputs: &[Lit]) -> Vec<Lit> {
    if inputs.len() <= 1 {
        return inputs.to_vec();
    }

    let (left, right) = inputs.split_at(inputs.len() / 2);
    let a = build_node(ctx, left);
    let b = build_node(ctx, right);
    let c: Vec<Lit> = (0..a.len() + b.len()).map(|_| ctx.new_var().positive()).collect();

    for i in 0..=a.len() {
        for j in 0..=b.len() {
            if i + j == 0 {
                continue;
            }
            let mut clause = Vec::with_capacity(3);
            if i > 0 {
                clause.push(a[i - 1].negated());
            }
            if j > 0 {
                clause.push(b[j - 1].negated());
            }
            clause.push(c[i + j - 1]);
            ctx.add_clause(clause);
        }
    }
    c
}

/// Adds clauses allowing at most `k` of `inputs` to be true.
///
/// `k >= inputs.len()` adds nothing and `k = 0` forces every input false. Small
/// at-most-one constraints use pairwise exclusion; everything else builds a [`Totalizer`].
pub fn at_most_k(ctx: &mut EncodingContext<'_>, inputs: &[Lit], k: usize) {
    let n = inputs.len();
    if k >= n {
        return;
    }
    if k == 0 {
        for &lit in inputs {
            ctx.add_clause([lit.negated()]);
        }
        return;
    }
    if k == 1 && n <= PAIRWISE_LIMIT {
        for (i, &a) in inputs.iter().enumerate() {
            for &b in &inputs[i + 1..] {
                ctx.add_clause([a.negated(), b.negated()]);
            }
        }
        return;
    }

    let totalizer = Totalizer::build(ctx, inputs);
    if let Some(bound) = totalizer.at_most(k) {
        ctx.add_clause([bound]);
    }
}
