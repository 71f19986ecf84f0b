//! # Traversal Engine (C4)
//!
//! Depth-first, dependency-ordered construction over one tree's halos,
//! driven by the `DoneFlag`/`HaloFlag` state machine on [`crate::halo::HaloAux`].
//! The post-order guarantee is exactly what the join stage needs: every
//! progenitor's galaxies exist before its descendant (or FOF sibling) is
//! joined.
//!
//! Implemented with an explicit work-stack rather than native recursion:
//! merger-tree depth is unbounded in principle, and a handful of
//! pathological trees in production catalogues run thousands of snapshots
//! deep. The stack machine below is a direct unrolling of the two mutually
//! recursive steps the spec describes (visit a halo's progenitor chain,
//! then — once every sibling's progenitors are visited — evaluate the FOF
//! group); the externally observable visitation order is identical to the
//! recursive formulation.

use crate::error::{Error, Result};
use crate::halo::{halo_flag, HaloStore, NONE};

/// Driven once per completed FOF group, after every sibling's progenitor
/// subtree has been fully constructed. Implemented by the orchestrator,
/// wiring together the join stage (C5), the physics pipeline (C6), the
/// merger/disruption stage (C7), and per-halo output bookkeeping (C8).
pub trait FofEvaluator {
    fn evaluate_fof(&mut self, store: &mut HaloStore, fof_root: i32) -> Result<()>;
}

/// What to do once the halo chain a [`ChainFrame`] is walking has been
/// fully visited.
enum Continuation {
    /// This chain was a single halo's own progenitor chain; once exhausted,
    /// mark the halo done and check whether it completes a FOF group.
    FinishVisit(i32),
    /// This chain was one FOF sibling's progenitor-ensure step; once
    /// exhausted, move on to the next sibling, or evaluate the group if
    /// siblings are exhausted.
    NextFofSibling { fof_root: i32, next_sibling: i32 },
}

struct ChainFrame {
    next_progenitor: i32,
    continuation: Continuation,
}

impl ChainFrame {
    fn for_halo(store: &HaloStore, halo: i32, continuation: Continuation) -> Self {
        Self {
            next_progenitor: store.halo(halo).first_progenitor,
            continuation,
        }
    }
}

/// Walk every halo reachable from `tree`'s final-snapshot roots
/// (`Descendant == NONE`), driving one [`FofEvaluator::evaluate_fof`] call
/// per completed FOF group in dependency order.
pub fn traverse_tree(
    store: &mut HaloStore,
    evaluator: &mut dyn FofEvaluator,
    tree_index: usize,
) -> Result<()> {
    let roots: Vec<i32> = (0..store.len() as i32)
        .filter(|&h| store.halo(h).descendant == NONE)
        .collect();

    for root in roots {
        if !store.aux(root).done_flag {
            visit_from(store, evaluator, tree_index, root)?;
        }
    }

    if let Some(stuck) = (0..store.len() as i32).find(|&h| !store.aux(h).done_flag) {
        return Err(Error::format(
            String::new(),
            Some(tree_index),
            format!(
                "halo {stuck} was never visited — tree pointers likely contain a cycle or an unreachable descendant"
            ),
        ));
    }

    Ok(())
}

fn visit_from(
    store: &mut HaloStore,
    evaluator: &mut dyn FofEvaluator,
    tree_index: usize,
    entry: i32,
) -> Result<()> {
    let mut stack: Vec<ChainFrame> =
        vec![ChainFrame::for_halo(store, entry, Continuation::FinishVisit(entry))];

    while let Some(frame) = stack.last_mut() {
        let progenitor = frame.next_progenitor;
        if progenitor != NONE {
            frame.next_progenitor = store.halo(progenitor).next_progenitor;
            if !store.aux(progenitor).done_flag {
                stack.push(ChainFrame::for_halo(
                    store,
                    progenitor,
                    Continuation::FinishVisit(progenitor),
                ));
            }
            continue;
        }

        let frame = stack.pop().expect("checked Some above");
        match frame.continuation {
            Continuation::FinishVisit(halo) => {
                store.aux_mut(halo).done_flag = true;
                let fof_root = store.halo(halo).first_halo_in_fof_group;
                if fof_root == NONE {
                    return Err(Error::invariant(
                        tree_index,
                        Some(halo),
                        None,
                        "halo has no FOF root (FirstHaloInFOFgroup == NONE)",
                    ));
                }
                if store.aux(fof_root).halo_flag == halo_flag::UNTOUCHED {
                    store.aux_mut(fof_root).halo_flag = halo_flag::SCHEDULED;
                    let next_sibling = store.halo(fof_root).next_halo_in_fof_group;
                    stack.push(ChainFrame::for_halo(
                        store,
                        fof_root,
                        Continuation::NextFofSibling {
                            fof_root,
                            next_sibling,
                        },
                    ));
                }
            }
            Continuation::NextFofSibling {
                fof_root,
                next_sibling,
            } => {
                if next_sibling != NONE {
                    let advance = store.halo(next_sibling).next_halo_in_fof_group;
                    stack.push(ChainFrame::for_halo(
                        store,
                        next_sibling,
                        Continuation::NextFofSibling {
                            fof_root,
                            next_sibling: advance,
                        },
                    ));
                } else {
                    store.aux_mut(fof_root).halo_flag = halo_flag::EVOLVED;
                    evaluator.evaluate_fof(store, fof_root)?;
                }
            }
        }
    }

    Ok(())
}
