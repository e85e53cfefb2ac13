//! Cycle detection over reference graphs
//!
//! A three-colour depth-first search in the style of Tarjan's strongly
//! connected components algorithm. White nodes are unvisited, gray nodes sit on
//! the component stack, black nodes belong to a finished component. A node is
//! circular exactly when its component has more than one member or it
//! references itself, so cells that merely depend on a cycle are not reported.
//!
//! The search keeps its own frame stack instead of recursing, so long
//! reference chains cannot exhaust the native stack.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use sheetlink_core::CellAddress;

/// The circular nodes of a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport<N: Ord = CellAddress> {
    /// One entry per cycle (strongly connected component), each sorted
    pub cycles: Vec<Vec<N>>,
    /// Every node that participates in some cycle
    pub members: BTreeSet<N>,
}

impl<N: Ord> Default for CycleReport<N> {
    fn default() -> Self {
        Self {
            cycles: Vec::new(),
            members: BTreeSet::new(),
        }
    }
}

impl<N: Ord> CycleReport<N> {
    /// Whether `node` is part of a cycle
    pub fn contains(&self, node: &N) -> bool {
        self.members.contains(node)
    }

    /// Whether the graph is acyclic
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Colour {
    Gray { index: usize, low: usize },
    Black,
}

/// Find every cycle in the graph given by `nodes` and `successors`.
///
/// Successors that are not in `nodes` are visited too; nodes only need to
/// cover the roots of the search.
pub fn find_cycles<N, I, F>(nodes: impl IntoIterator<Item = N>, successors: F) -> CycleReport<N>
where
    N: Copy + Ord + Hash,
    I: IntoIterator<Item = N>,
    F: Fn(N) -> I,
{
    let mut colours: HashMap<N, Colour> = HashMap::new();
    let mut self_loops: HashSet<N> = HashSet::new();
    let mut component_stack: Vec<N> = Vec::new();
    let mut frames: Vec<(N, I::IntoIter)> = Vec::new();
    let mut next_index = 0;
    let mut report = CycleReport::default();

    for root in nodes {
        if colours.contains_key(&root) {
            continue;
        }

        colours.insert(
            root,
            Colour::Gray {
                index: next_index,
                low: next_index,
            },
        );
        next_index += 1;
        component_stack.push(root);
        frames.push((root, successors(root).into_iter()));

        while let Some((node, successors_iter)) = frames.last_mut() {
            let node = *node;
            match successors_iter.next() {
                Some(next) => match colours.get(&next).copied() {
                    None => {
                        colours.insert(
                            next,
                            Colour::Gray {
                                index: next_index,
                                low: next_index,
                            },
                        );
                        next_index += 1;
                        component_stack.push(next);
                        frames.push((next, successors(next).into_iter()));
                    }
                    Some(Colour::Gray { index, .. }) => {
                        if next == node {
                            self_loops.insert(node);
                        }
                        lower(&mut colours, node, index);
                    }
                    Some(Colour::Black) => {}
                },
                None => {
                    frames.pop();
                    let (index, low) = match colours.get(&node) {
                        Some(Colour::Gray { index, low }) => (*index, *low),
                        _ => continue,
                    };
                    if let Some((parent, _)) = frames.last() {
                        lower(&mut colours, *parent, low);
                    }
                    if low != index {
                        continue;
                    }

                    // `node` is the root of a finished component
                    let mut component = Vec::new();
                    while let Some(member) = component_stack.pop() {
                        colours.insert(member, Colour::Black);
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 || self_loops.contains(&node) {
                        component.sort();
                        report.members.extend(component.iter().copied());
                        report.cycles.push(component);
                    }
                }
            }
        }
    }

    report.cycles.sort();
    report
}

fn lower<N: Copy + Eq + Hash>(colours: &mut HashMap<N, Colour>, node: N, value: usize) {
    if let Some(Colour::Gray { low, .. }) = colours.get_mut(&node) {
        *low = (*low).min(value);
    }
}
