//! Directed-graph cycle detection.
//!
//! Rebuilt from scratch for every check — the graphs here are a pipeline's
//! blocks, tens of nodes at most, so an incremental structure would be
//! wasted complexity.

use std::collections::HashMap;

/// A throwaway directed graph over string node ids.
#[derive(Debug, Default)]
pub struct DirectedGraph {
    ids: HashMap<String, usize>,
    outgoing: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl DirectedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.ids.get(id) {
            return idx;
        }
        let idx = self.outgoing.len();
        self.ids.insert(id.to_string(), idx);
        self.outgoing.push(Vec::new());
        idx
    }

    /// Add an edge, creating either endpoint as needed.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.outgoing[from].push(to);
    }

    /// Depth-first search with an on-recursion-stack marker; a back-edge to
    /// a node still on the stack is a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut marks = vec![Mark::Unvisited; self.outgoing.len()];

        for start in 0..self.outgoing.len() {
            if marks[start] == Mark::Unvisited && self.visit(start, &mut marks) {
                return true;
            }
        }
        false
    }

    fn visit(&self, node: usize, marks: &mut [Mark]) -> bool {
        marks[node] = Mark::OnStack;
        for &next in &self.outgoing[node] {
            match marks[next] {
                Mark::OnStack => return true,
                Mark::Unvisited => {
                    if self.visit(next, marks) {
                        return true;
                    }
                }
                Mark::Done => {}
            }
        }
        marks[node] = Mark::Done;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_has_no_cycle() {
        assert!(!DirectedGraph::new().has_cycle());
    }

    #[test]
    fn linear_chain_has_no_cycle() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        assert!(!g.has_cycle());
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "a");
        assert!(g.has_cycle());
    }

    #[test]
    fn back_edge_is_a_cycle() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        g.add_edge("c", "a");
        assert!(g.has_cycle());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        g.add_edge("a", "c");
        g.add_edge("b", "d");
        g.add_edge("c", "d");
        assert!(!g.has_cycle());
    }

    #[test]
    fn disconnected_cycle_is_found() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        g.add_node("lonely");
        g.add_edge("x", "y");
        g.add_edge("y", "x");
        assert!(g.has_cycle());
    }

    #[test]
    fn duplicate_nodes_collapse() {
        let mut g = DirectedGraph::new();
        g.add_node("a");
        g.add_node("a");
        g.add_edge("a", "b");
        assert!(!g.has_cycle());
    }
}
