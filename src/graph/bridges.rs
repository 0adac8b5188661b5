//! # Bridge Forest
//!
//! Decomposes a multigraph into its 2-edge-connected blocks. Blocks are joined
//! by bridge edges and form a forest rooted at the block of each traversal
//! start vertex.
//!
//! Bridges are found with the low-link depth-first search: a tree edge
//! `(parent, child)` is a bridge iff `low[child] == pre[child]`, i.e. nothing
//! in the subtree of `child` reaches above it. The traversal keeps its state
//! in an explicit stack instead of recursing, so long paths in large graphs
//! cannot overflow the call stack.
//!
//! Vertices are then assigned to blocks in DFS preorder: a vertex joins the
//! block of its tree parent unless the tree edge to the parent is a bridge, in
//! which case it opens a new child block. Block indices therefore always
//! exceed the index of their parent block.
//!
//! ```rust
//! use longtrail::graph::{BridgeForest, Multigraph};
//!
//! // Triangle 0-1-2 with a pendant edge 2-3.
//! let g: Multigraph = [(0, 1), (1, 2), (2, 0), (2, 3)].into_iter().collect();
//! let bf = BridgeForest::from_start(&g, 0);
//!
//! assert_eq!(bf.len(), 2);
//! assert_eq!(bf.block_of(3), Some(1));
//! assert_eq!(bf.blocks()[1].bridge, Some((2, 3)));
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Multigraph, Vertex};

/// A 2-edge-connected block of the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Edges of the block; contains every vertex assigned to it.
    pub graph: Multigraph,
    /// First vertex of the block reached by the traversal.
    pub entry: Vertex,
    /// Bridge `(vertex in parent block, entry)`; `None` for roots.
    pub bridge: Option<Edge>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl Block {
    fn new(entry: Vertex, bridge: Option<Edge>, parent: Option<usize>) -> Self {
        let mut graph = Multigraph::new();
        graph.add_vertex(entry);
        Self {
            graph,
            entry,
            bridge,
            parent,
            children: Vec::new(),
        }
    }
}

/// Forest of 2-edge-connected blocks joined by bridges.
#[derive(Debug, Clone)]
pub struct BridgeForest {
    blocks: Vec<Block>,
    roots: Vec<usize>,
    block_by_vertex: HashMap<Vertex, usize>,
}

impl BridgeForest {
    /// Decomposes every component of `g`; each component gets one root block.
    #[must_use]
    pub fn new(g: &Multigraph) -> Self {
        let mut search = LowLink::default();
        for v in g.vertices() {
            if !search.pre.contains_key(&v) {
                search.run(g, v);
            }
        }
        search.into_forest(g)
    }

    /// Decomposes only the component reachable from `start`. Vertices outside
    /// it are not assigned to any block. A `start` that is not in `g` yields a
    /// single root block holding just `start`.
    #[must_use]
    pub fn from_start(g: &Multigraph, start: Vertex) -> Self {
        let mut search = LowLink::default();
        search.run(g, start);
        search.into_forest(g)
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// # Errors
    /// - `BlockOutOfRange` if `index` does not name a block
    pub fn block(&self, index: usize) -> Result<&Block> {
        self.blocks.get(index).ok_or(GraphError::BlockOutOfRange {
            index,
            len: self.blocks.len(),
        })
    }

    /// The vertex through which the traversal entered block `index`.
    ///
    /// # Errors
    /// - `BlockOutOfRange` if `index` does not name a block
    pub fn block_entry_point(&self, index: usize) -> Result<Vertex> {
        self.block(index).map(|b| b.entry)
    }

    /// Block containing `v`, or `None` if `v` was not reached.
    #[must_use]
    pub fn block_of(&self, v: Vertex) -> Option<usize> {
        self.block_by_vertex.get(&v).copied()
    }

    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All bridge edges, oriented from the parent block to the child block.
    pub fn bridges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.blocks.iter().filter_map(|b| b.bridge)
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: &str, index: usize) -> fmt::Result {
        let block = &self.blocks[index];
        writeln!(
            f,
            "block {index} of size ({}, {})",
            block.graph.num_vertices(),
            block.graph.num_edges()
        )?;
        let deeper = format!("{indent}  ");
        for &child in &block.children {
            if let Some((u, v)) = self.blocks[child].bridge {
                write!(f, "{indent}({u}, {v}): ")?;
            }
            self.fmt_tree(f, &deeper, child)?;
        }
        Ok(())
    }
}

impl fmt::Display for BridgeForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &root in &self.roots {
            self.fmt_tree(f, "  ", root)?;
        }
        Ok(())
    }
}

/// One DFS stack frame: the vertex, its tree parent, the next adjacency
/// index to scan, and whether one copy of the parent edge was skipped.
struct Frame {
    v: Vertex,
    parent: Option<Vertex>,
    next: usize,
    skipped_parent: bool,
}

/// Owned traversal state of the low-link search.
#[derive(Default)]
struct LowLink {
    pre: HashMap<Vertex, usize>,
    low: HashMap<Vertex, usize>,
    tree_parent: HashMap<Vertex, Vertex>,
    /// `(parent, child)` tree edges that are bridges.
    bridges: HashSet<Edge>,
    /// Vertices in DFS preorder, grouped by start.
    preorder: Vec<Vertex>,
    starts: Vec<Vertex>,
}

impl LowLink {
    fn visit(&mut self, v: Vertex) {
        let index = self.preorder.len();
        self.pre.insert(v, index);
        self.low.insert(v, index);
        self.preorder.push(v);
    }

    fn run(&mut self, g: &Multigraph, start: Vertex) {
        self.starts.push(start);
        self.visit(start);
        let mut stack = vec![Frame {
            v: start,
            parent: None,
            next: 0,
            skipped_parent: false,
        }];

        while let Some(top) = stack.len().checked_sub(1) {
            let v = stack[top].v;
            let nbrs = g.neighbors(v);

            if stack[top].next < nbrs.len() {
                let w = nbrs[stack[top].next];
                stack[top].next += 1;

                // Only one copy of the parent edge is the tree edge; parallel
                // copies count as back edges.
                if Some(w) == stack[top].parent && !stack[top].skipped_parent {
                    stack[top].skipped_parent = true;
                    continue;
                }
                if let Some(&pre_w) = self.pre.get(&w) {
                    let low_v = self.low[&v].min(pre_w);
                    self.low.insert(v, low_v);
                } else {
                    self.visit(w);
                    self.tree_parent.insert(w, v);
                    stack.push(Frame {
                        v: w,
                        parent: Some(v),
                        next: 0,
                        skipped_parent: false,
                    });
                }
            } else {
                let frame = stack.pop().map(|f| (f.v, f.parent));
                if let Some((child, Some(parent))) = frame {
                    let low_child = self.low[&child];
                    let low_parent = self.low[&parent].min(low_child);
                    self.low.insert(parent, low_parent);
                    if low_child == self.pre[&child] {
                        self.bridges.insert((parent, child));
                    }
                }
            }
        }
    }

    fn into_forest(self, g: &Multigraph) -> BridgeForest {
        let mut blocks: Vec<Block> = Vec::new();
        let mut roots = Vec::new();
        let mut block_by_vertex = HashMap::with_capacity(self.preorder.len());

        for &v in &self.preorder {
            let index = match self.tree_parent.get(&v) {
                None => {
                    roots.push(blocks.len());
                    blocks.push(Block::new(v, None, None));
                    blocks.len() - 1
                }
                Some(&p) if self.bridges.contains(&(p, v)) => {
                    let parent_block = block_by_vertex[&p];
                    blocks.push(Block::new(v, Some((p, v)), Some(parent_block)));
                    let index = blocks.len() - 1;
                    blocks[parent_block].children.push(index);
                    index
                }
                Some(p) => {
                    let index = block_by_vertex[p];
                    blocks[index].graph.add_vertex(v);
                    index
                }
            };
            block_by_vertex.insert(v, index);
        }

        // Every non-bridge edge lies inside one block. A bridge has
        // multiplicity one, so skipping the single copy seen from the lower
        // endpoint drops it exactly.
        for &v in &self.preorder {
            for &w in g.neighbors(v) {
                if v > w {
                    continue;
                }
                if self.bridges.contains(&(v, w)) || self.bridges.contains(&(w, v)) {
                    continue;
                }
                blocks[block_by_vertex[&v]].graph.insert_edge(v, w);
            }
        }

        debug_assert!(self.starts.iter().all(|s| block_by_vertex.contains_key(s)));
        BridgeForest {
            blocks,
            roots,
            block_by_vertex,
        }
    }
}
