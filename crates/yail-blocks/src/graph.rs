//! Block arena
//!
//! All relationships between blocks (socket children, stacked neighbours,
//! stub parents) are stored as ids and resolved through the arena.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::block::{Annotation, Block, BlockId, Plug, Socket};
use crate::error::{ModelError, Result};
use crate::language::{ConnectorKind, Genus, SocketDef};

/// Arena of blocks keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphRepr", into = "GraphRepr")]
pub struct BlockGraph {
    blocks: BTreeMap<BlockId, Block>,
    next_id: u64,
}

#[derive(Serialize, Deserialize)]
struct GraphRepr {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    blocks: Vec<Block>,
}

impl From<GraphRepr> for BlockGraph {
    fn from(repr: GraphRepr) -> Self {
        let mut graph = BlockGraph {
            blocks: BTreeMap::new(),
            next_id: repr.next_id,
        };
        for block in repr.blocks {
            graph.insert(block);
        }
        graph
    }
}

impl From<BlockGraph> for GraphRepr {
    fn from(graph: BlockGraph) -> Self {
        GraphRepr {
            next_id: graph.next_id,
            blocks: graph.blocks.into_values().collect(),
        }
    }
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn require(&self, id: BlockId) -> Result<&Block> {
        self.get(id).ok_or(ModelError::UnknownBlock(id))
    }

    fn require_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        self.blocks.get_mut(&id).ok_or(ModelError::UnknownBlock(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    fn alloc_id(&mut self) -> BlockId {
        self.next_id += 1;
        BlockId(self.next_id)
    }

    /// Insert a fully formed block, keeping its id.
    pub fn insert(&mut self, block: Block) -> BlockId {
        let id = block.id;
        self.next_id = self.next_id.max(id.0);
        self.blocks.insert(id, block);
        id
    }

    /// Instantiate a block of `genus`. An empty label takes the genus default.
    pub fn add_block(&mut self, genus: &Genus, label: impl Into<String>) -> BlockId {
        self.add_block_with_sockets(genus, label, Vec::new())
    }

    /// Instantiate a block with extra sockets appended after the genus ones.
    pub fn add_block_with_sockets(
        &mut self,
        genus: &Genus,
        label: impl Into<String>,
        extra: Vec<SocketDef>,
    ) -> BlockId {
        let id = self.alloc_id();
        let mut label = label.into();
        if label.is_empty() {
            label = genus.initial_label.clone();
        }
        let mut block = Block::new(id, genus.name.clone(), label);
        block.sockets = genus
            .sockets
            .iter()
            .chain(extra.iter())
            .map(Socket::from)
            .collect();
        block.plug = genus.plug.clone().map(Plug::new);
        self.blocks.insert(id, block);
        id
    }

    /// Create a stub derived from `declaring`, sharing its label.
    pub fn create_stub(
        &mut self,
        declaring: BlockId,
        genus: &Genus,
        sockets: Vec<SocketDef>,
    ) -> Result<BlockId> {
        let label = self.require(declaring)?.label.clone();
        let id = self.add_block_with_sockets(genus, label, sockets);
        if let Some(stub) = self.blocks.get_mut(&id) {
            stub.declaring_parent = Some(declaring);
        }
        Ok(id)
    }

    pub fn stubs_of(&self, declaring: BlockId) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|b| b.declaring_parent == Some(declaring))
            .map(|b| b.id)
            .collect()
    }

    /// The block at the top of the clump `id` belongs to.
    pub fn top_of_clump(&self, id: BlockId) -> BlockId {
        let mut current = id;
        while let Some(block) = self.get(current) {
            match block.before.or(block.parent) {
                Some(up) => current = up,
                None => break,
            }
        }
        current
    }

    /// Blocks that sit at the top level of the workspace.
    pub fn roots(&self) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|b| b.parent.is_none() && b.before.is_none())
            .map(|b| b.id)
            .collect()
    }

    /// The stack starting at `first`, following `after` links.
    pub fn stack(&self, first: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut current = Some(first);
        while let Some(id) = current {
            if out.contains(&id) {
                tracing::error!(block = %id, "stack loops back on itself");
                break;
            }
            out.push(id);
            current = self.get(id).and_then(|b| b.after);
        }
        out
    }

    /// Whether `candidate` is `id` or encloses it.
    fn encloses(&self, candidate: BlockId, id: BlockId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == candidate {
                return true;
            }
            current = self.get(cur).and_then(|b| b.before.or(b.parent));
        }
        false
    }

    /// Place `child` in `parent`'s socket named `socket`.
    pub fn connect(&mut self, parent: BlockId, socket: &str, child: BlockId) -> Result<()> {
        let child_block = self.require(child)?;
        if child_block.parent.is_some() || child_block.before.is_some() {
            return Err(ModelError::AlreadyConnected(child));
        }
        if self.encloses(child, parent) {
            return Err(ModelError::Cycle { parent, child });
        }
        let slot = self
            .require(parent)?
            .socket(socket)
            .ok_or_else(|| ModelError::unknown_socket(parent, socket))?;
        if slot.block.is_some() {
            return Err(ModelError::SocketOccupied {
                block: parent,
                socket: socket.to_string(),
            });
        }

        if let Some(slot) = self.require_mut(parent)?.socket_mut(socket) {
            slot.block = Some(child);
        }
        self.require_mut(child)?.parent = Some(parent);
        self.adapt_polymorphic(parent);
        Ok(())
    }

    /// Stack `next` (and everything below it) directly under `prev`.
    pub fn set_next(&mut self, prev: BlockId, next: BlockId) -> Result<()> {
        let next_block = self.require(next)?;
        if next_block.parent.is_some() || next_block.before.is_some() {
            return Err(ModelError::AlreadyConnected(next));
        }
        self.require(prev)?;
        if self.encloses(next, prev) {
            return Err(ModelError::Cycle { parent: prev, child: next });
        }

        let old_after = self.require(prev)?.after;
        let tail = self.stack(next).last().copied().unwrap_or(next);

        self.require_mut(prev)?.after = Some(next);
        self.require_mut(next)?.before = Some(prev);
        if let Some(old) = old_after {
            self.require_mut(tail)?.after = Some(old);
            self.require_mut(old)?.before = Some(tail);
        }
        Ok(())
    }

    /// Detach `child` from its socket or from the block above it. Blocks
    /// stacked below `child` travel with it.
    pub fn disconnect(&mut self, child: BlockId) -> Result<()> {
        let block = self.require(child)?;
        let (parent, before) = (block.parent, block.before);

        if let Some(parent) = parent {
            if let Some(p) = self.blocks.get_mut(&parent) {
                for socket in p.sockets.iter_mut() {
                    if socket.block == Some(child) {
                        socket.block = None;
                    }
                }
            }
            self.require_mut(child)?.parent = None;
            self.adapt_polymorphic(parent);
        } else if let Some(before) = before {
            if let Some(b) = self.blocks.get_mut(&before) {
                b.after = None;
            }
            self.require_mut(child)?.before = None;
        }
        Ok(())
    }

    /// Delete `id`, everything nested in its sockets and every stub derived
    /// from a deleted block. The block below `id` in a stack takes its place.
    ///
    /// Returns the removed ids in deletion order.
    pub fn remove_block(&mut self, id: BlockId) -> Result<Vec<BlockId>> {
        self.require(id)?;
        let mut removed = Vec::new();
        self.remove_one(id, &mut removed);
        Ok(removed)
    }

    fn remove_one(&mut self, id: BlockId, removed: &mut Vec<BlockId>) {
        let Some(block) = self.get(id) else {
            return;
        };
        let (parent, before, after) = (block.parent, block.before, block.after);

        // Heal the stack around the removed block.
        if let Some(after) = after {
            if let Some(a) = self.blocks.get_mut(&after) {
                a.before = None;
            }
        }
        if let Some(parent) = parent {
            if let Some(p) = self.blocks.get_mut(&parent) {
                for socket in p.sockets.iter_mut() {
                    if socket.block == Some(id) {
                        socket.block = after;
                    }
                }
            }
            if let Some(after) = after {
                if let Some(a) = self.blocks.get_mut(&after) {
                    a.parent = Some(parent);
                }
            }
        } else if let Some(before) = before {
            if let Some(b) = self.blocks.get_mut(&before) {
                b.after = after;
            }
            if let Some(after) = after {
                if let Some(a) = self.blocks.get_mut(&after) {
                    a.before = Some(before);
                }
            }
        }

        let mut doomed = Vec::new();
        self.collect_nested(id, &mut doomed);
        for victim in &doomed {
            self.blocks.remove(victim);
            removed.push(*victim);
        }

        let orphans: Vec<BlockId> = self
            .blocks
            .values()
            .filter(|b| b.declaring_parent.is_some_and(|d| doomed.contains(&d)))
            .map(|b| b.id)
            .collect();
        for stub in orphans {
            self.remove_one(stub, removed);
        }

        if let Some(parent) = parent {
            if self.contains(parent) {
                self.adapt_polymorphic(parent);
            }
        }
    }

    fn collect_nested(&self, id: BlockId, out: &mut Vec<BlockId>) {
        if out.contains(&id) {
            return;
        }
        out.push(id);
        if let Some(block) = self.get(id) {
            for child in block.children() {
                for member in self.stack(child) {
                    self.collect_nested(member, out);
                }
            }
        }
    }

    pub fn annotate(&mut self, id: BlockId, annotation: Option<Annotation>) -> bool {
        match self.blocks.get_mut(&id) {
            Some(block) => {
                block.annotation = annotation;
                true
            }
            None => false,
        }
    }

    pub fn relabel(&mut self, id: BlockId, label: impl Into<String>) -> Result<()> {
        self.require_mut(id)?.label = label.into();
        Ok(())
    }

    pub fn set_active(&mut self, id: BlockId, active: bool) -> Result<()> {
        self.require_mut(id)?.active = active;
        Ok(())
    }

    pub fn set_bad(&mut self, id: BlockId, bad: bool) -> Result<()> {
        self.require_mut(id)?.bad = bad;
        Ok(())
    }

    pub fn set_should_report(&mut self, id: BlockId, report: bool) -> Result<()> {
        self.require_mut(id)?.should_report = report;
        Ok(())
    }

    /// Re-resolve polymorphic connectors on `id` and propagate upward while
    /// the resolved plug type keeps changing.
    pub fn adapt_polymorphic(&mut self, id: BlockId) {
        let mut current = Some(id);
        while let Some(cur) = current {
            if !self.recompute_poly(cur) {
                break;
            }
            current = self.get(cur).and_then(|b| b.parent);
        }
    }

    /// Returns whether the block's resolved plug type changed.
    fn recompute_poly(&mut self, id: BlockId) -> bool {
        let Some(block) = self.get(id) else {
            return false;
        };
        let child_types: Vec<Option<String>> = block
            .sockets
            .iter()
            .map(|socket| match socket.kind {
                ConnectorKind::Poly => socket
                    .block
                    .and_then(|c| self.get(c))
                    .and_then(|c| c.plug_type())
                    .map(str::to_string),
                _ => None,
            })
            .collect();

        let Some(block) = self.blocks.get_mut(&id) else {
            return false;
        };
        for (socket, ty) in block.sockets.iter_mut().zip(child_types) {
            if socket.kind.is_poly() {
                socket.resolved = ty;
            }
        }
        let adapted = block
            .sockets
            .iter()
            .filter(|s| s.kind.is_poly())
            .find_map(|s| s.resolved.clone());

        match block.plug.as_mut() {
            Some(plug) if plug.kind.is_poly() && plug.resolved != adapted => {
                plug.resolved = adapted;
                true
            }
            _ => false,
        }
    }
}
