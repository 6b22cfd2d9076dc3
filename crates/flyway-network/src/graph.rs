//! Graph utilities over inferred links: connectivity, degrees, and
//! horizon-capped downstream reach.

use std::collections::{HashMap, HashSet, VecDeque};

/// Union-find over node indices with path compression.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Group node indices by root. Groups and members come back in
    /// ascending index order.
    pub fn components(&mut self, n: usize) -> Vec<Vec<usize>> {
        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..n {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        let mut groups: Vec<Vec<usize>> = by_root.into_values().collect();
        groups.sort_by_key(|g| g[0]);
        groups
    }
}

/// Directed adjacency built from `(source, target)` index pairs.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    pub out_edges: HashMap<usize, Vec<usize>>,
    pub in_degree: HashMap<usize, usize>,
}

impl Adjacency {
    pub fn from_edges(edges: &[(usize, usize)]) -> Self {
        let mut adj = Self::default();
        for &(src, dst) in edges {
            adj.out_edges.entry(src).or_default().push(dst);
            *adj.in_degree.entry(dst).or_default() += 1;
        }
        adj
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.out_edges.get(&node).map(Vec::len).unwrap_or(0)
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.in_degree.get(&node).copied().unwrap_or(0)
    }

    /// Number of distinct nodes reachable from `start` within
    /// `horizon` hops, excluding `start` itself. The cap keeps the
    /// traversal linear in practice on dense clusters.
    pub fn downstream_reach(&self, start: usize, horizon: usize) -> usize {
        let mut visited: HashSet<usize> = HashSet::from([start]);
        let mut queue: VecDeque<(usize, usize)> = VecDeque::from([(start, 0)]);
        let mut reach = 0;
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= horizon {
                continue;
            }
            if let Some(next) = self.out_edges.get(&node) {
                for &dst in next {
                    if visited.insert(dst) {
                        reach += 1;
                        queue.push_back((dst, depth + 1));
                    }
                }
            }
        }
        reach
    }
}
