//! Two-level tree of registry entries and their tools.
//!
//! The projector owns the displayed list. [`TreeProjector::rebuild`] replaces
//! it in one step and bumps a revision on a watch channel, which tells the
//! presentation to redraw everything. There are no partial updates.

use tokio::sync::watch;

use crate::models::RegistryEntry;

/// A tool under an entry. Leaf node.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityNode {
    /// `<entry-id>-tool-<index>`
    pub id: String,
    pub label: String,
    pub description: String,
}

/// A registry entry and the tools it exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryNode {
    pub id: String,
    pub label: String,
    pub description: String,
    pub version: String,
    pub owner: String,
    pub capabilities: Vec<CapabilityNode>,
    pub entry: RegistryEntry,
}

impl EntryNode {
    pub fn new(entry: RegistryEntry) -> Self {
        let capabilities = entry
            .tools
            .iter()
            .enumerate()
            .map(|(index, tool)| CapabilityNode {
                id: format!("{}-tool-{}", entry.id, index),
                label: tool.name.clone(),
                description: tool.description.clone(),
            })
            .collect();

        Self {
            id: entry.id.clone(),
            label: entry.name.clone(),
            description: entry.description.clone(),
            version: entry.version.clone(),
            owner: entry.owner.clone(),
            capabilities,
            entry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeNode<'a> {
    Entry(&'a EntryNode),
    Capability(&'a CapabilityNode),
}

impl<'a> TreeNode<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            TreeNode::Entry(e) => &e.id,
            TreeNode::Capability(c) => &c.id,
        }
    }

    /// Entry name, falling back to the id for unnamed entries.
    pub fn label(&self) -> &'a str {
        match *self {
            TreeNode::Entry(e) if e.label.is_empty() => &e.id,
            TreeNode::Entry(e) => &e.label,
            TreeNode::Capability(c) => &c.label,
        }
    }

    pub fn description(&self) -> &'a str {
        match *self {
            TreeNode::Entry(e) => &e.description,
            TreeNode::Capability(c) => &c.description,
        }
    }

    pub fn tooltip(&self) -> String {
        format!("{} - {}", self.label(), self.description())
    }

    /// Entries are expandable even when they expose no tools.
    pub fn has_children(&self) -> bool {
        matches!(self, TreeNode::Entry(_))
    }
}

/// Children of `node`: an entry's tools in order, nothing for a tool.
pub fn children_of(node: TreeNode<'_>) -> Vec<TreeNode<'_>> {
    match node {
        TreeNode::Entry(entry) => entry.capabilities.iter().map(TreeNode::Capability).collect(),
        TreeNode::Capability(_) => Vec::new(),
    }
}

#[derive(Debug)]
pub struct TreeProjector {
    entries: Vec<EntryNode>,
    changed: watch::Sender<u64>,
}

impl Default for TreeProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeProjector {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            entries: Vec::new(),
            changed,
        }
    }

    /// Replace the whole tree with one entry node per entry, in order.
    pub fn rebuild(&mut self, entries: Vec<RegistryEntry>) -> &[EntryNode] {
        self.entries = entries.into_iter().map(EntryNode::new).collect();
        self.changed.send_modify(|revision| *revision += 1);
        &self.entries
    }

    /// Drop every node. Counts as a rebuild.
    pub fn clear(&mut self) {
        self.rebuild(Vec::new());
    }

    pub fn entries(&self) -> &[EntryNode] {
        &self.entries
    }

    pub fn roots(&self) -> Vec<TreeNode<'_>> {
        self.entries.iter().map(TreeNode::Entry).collect()
    }

    /// Receives the tree revision after every rebuild.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.changed.borrow()
    }
}
