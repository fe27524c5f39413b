//! The decision trie.
//!
//! Decoding walks an immutable forest of filter nodes held in a flat arena.
//! Each filter dispatches on one property of the partially decoded
//! instruction and selects a child; terminals reference an instruction
//! definition. Every child slot is populated - the explicit `Invalid`
//! sentinel (node 0) marks "no such instruction", so traversal can never fall
//! off the structure. Nodes are shared, making the arena a DAG rather than a
//! tree.

use crate::context::{DecodeContext, OpcodeMap};
use crate::error::DecodeError;
use crate::prefix::{Repeat, VectorPrefix};

/// Index of a node in the arena.
pub type NodeId = u16;

/// The "no such instruction" sentinel.
pub const INVALID_NODE: NodeId = 0;

/// Root of the trie, always an opcode filter.
pub const ROOT_NODE: NodeId = 1;

/// Bucketing of the ModR/M.mod filter.
///
/// How many of the four raw mod values the table distinguishes is
/// table-dependent, so the bucketing travels with the node instead of being
/// hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModBuckets {
    /// Two buckets: memory (mod 00/01/10) vs register-direct (mod 11).
    Coarse,
    /// Four buckets: the raw mod value.
    Fine,
}

/// What a filter node dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// The opcode byte (256 children).
    Opcode,
    /// XOP gate: not-XOP, or XOP map 8/9/10.
    XopMap,
    /// Encoding and opcode map: legacy map 0-3, VEX map 1-3, EVEX map 1-3.
    VexMap,
    /// Machine mode by default width class (16/32/64).
    Mode,
    /// Recognized mandatory prefix (none/66/F3/F2).
    MandatoryPrefix,
    /// ModR/M.mod, bucketed.
    ModrmMod(ModBuckets),
    /// Raw ModR/M.reg (8 children).
    ModrmReg,
    /// Raw ModR/M.rm (8 children).
    ModrmRm,
    /// Effective operand width (16/32/64).
    OperandSize,
    /// Effective address width (16/32/64).
    AddressSize,
    /// REX/VEX/EVEX.W bit.
    RexW,
    /// VEX/EVEX.L bit.
    VexL,
    /// EVEX.L' bit.
    EvexL2,
    /// EVEX.b bit.
    EvexB,
}

impl FilterKind {
    /// Number of children a filter of this kind carries. An arity invariant:
    /// every node's child slice has exactly this length.
    pub fn domain_size(&self) -> usize {
        match self {
            Self::Opcode => 256,
            Self::XopMap => 4,
            Self::VexMap => 12,
            Self::Mode => 3,
            Self::MandatoryPrefix => 4,
            Self::ModrmMod(ModBuckets::Coarse) => 2,
            Self::ModrmMod(ModBuckets::Fine) => 4,
            Self::ModrmReg | Self::ModrmRm => 8,
            Self::OperandSize | Self::AddressSize => 3,
            Self::RexW | Self::VexL | Self::EvexL2 | Self::EvexB => 2,
        }
    }
}

/// A trie node.
#[derive(Debug)]
pub enum Node {
    /// No instruction down this path.
    Invalid,
    /// Terminal: index into the definition store. The operand count is
    /// duplicated here so the arity invariant is checkable against the store
    /// at build time.
    Definition { def: u16, operand_count: u8 },
    /// Dispatch node.
    Filter {
        kind: FilterKind,
        children: Box<[NodeId]>,
    },
}

/// The immutable decision structure.
#[derive(Debug)]
pub struct Trie {
    nodes: Vec<Node>,
}

impl Trie {
    /// Walks from the root to a terminal, lazily extracting fields as filter
    /// nodes require them. Returns the definition index and operand count.
    pub fn walk(&self, ctx: &mut DecodeContext<'_>) -> Result<(u16, u8), DecodeError> {
        let mut node = &self.nodes[ROOT_NODE as usize];
        let mut last_kind = FilterKind::Opcode;
        loop {
            match node {
                Node::Invalid => {
                    return Err(DecodeError::UnrecognizedInstruction {
                        offset: ctx.cursor,
                        filter: last_kind,
                    })
                }
                Node::Definition { def, operand_count } => return Ok((*def, *operand_count)),
                Node::Filter { kind, children } => {
                    last_kind = *kind;
                    let next = match select(*kind, ctx)? {
                        Some(index) => children[index],
                        // The context is not representable in this filter's
                        // domain (e.g. an XOP prefix at an encoding filter
                        // without XOP forms).
                        None => INVALID_NODE,
                    };
                    node = &self.nodes[next as usize];
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Evaluates a filter's criterion against the context.
///
/// `Ok(None)` means the context has no slot in this filter's domain, which is
/// equivalent to selecting the sentinel.
fn select(kind: FilterKind, ctx: &mut DecodeContext<'_>) -> Result<Option<usize>, DecodeError> {
    let index = match kind {
        FilterKind::Opcode => Some(ctx.opcode as usize),

        FilterKind::XopMap => Some(match ctx.map {
            OpcodeMap::Xop8 => 1,
            OpcodeMap::Xop9 => 2,
            OpcodeMap::XopA => 3,
            _ => 0,
        }),

        FilterKind::VexMap => {
            let map = match ctx.map {
                OpcodeMap::Default => 0,
                OpcodeMap::Map0F => 1,
                OpcodeMap::Map0F38 => 2,
                OpcodeMap::Map0F3A => 3,
                // XOP routes are gated by an XopMap filter above this node.
                OpcodeMap::Xop8 | OpcodeMap::Xop9 | OpcodeMap::XopA => return Ok(None),
            };
            Some(match &ctx.prefixes.vector {
                None => map,
                Some(VectorPrefix::Vex(_)) => 4 + map,
                Some(VectorPrefix::Evex(_)) => 8 + map,
                Some(VectorPrefix::Xop(_)) => return Ok(None),
            })
        }

        FilterKind::Mode => Some(match ctx.mode.default_address_width() {
            16 => 0,
            32 => 1,
            _ => 2,
        }),

        // Vector prefixes embed their mandatory prefix in `pp` (matching the
        // child layout); legacy encodings select a candidate with F3/F2 taking
        // precedence over 66, and flag it as consumed.
        FilterKind::MandatoryPrefix => match &ctx.prefixes.vector {
            Some(VectorPrefix::Vex(v)) | Some(VectorPrefix::Xop(v)) => Some(v.pp as usize),
            Some(VectorPrefix::Evex(e)) => Some(e.pp as usize),
            None => match ctx.prefixes.repeat {
                Some(Repeat::Rep) => {
                    ctx.prefixes.mandatory_repeat = true;
                    Some(2)
                }
                Some(Repeat::Repne) => {
                    ctx.prefixes.mandatory_repeat = true;
                    Some(3)
                }
                None if ctx.prefixes.operand_size => {
                    ctx.prefixes.mandatory_66 = true;
                    Some(1)
                }
                None => Some(0),
            },
        },

        FilterKind::ModrmMod(ModBuckets::Coarse) => {
            Some(if ctx.modrm()?.is_register() { 1 } else { 0 })
        }
        FilterKind::ModrmMod(ModBuckets::Fine) => Some(ctx.modrm()?.mod_ as usize),
        FilterKind::ModrmReg => Some(ctx.modrm()?.reg as usize),
        FilterKind::ModrmRm => Some(ctx.modrm()?.rm as usize),

        FilterKind::OperandSize => Some(match ctx.effective_operand_width() {
            16 => 0,
            32 => 1,
            _ => 2,
        }),
        FilterKind::AddressSize => Some(match ctx.effective_address_width() {
            16 => 0,
            32 => 1,
            _ => 2,
        }),

        FilterKind::RexW => Some(ctx.prefixes.w_bit() as usize),
        FilterKind::VexL => Some(ctx.prefixes.l_bit() as usize),
        // EVEX-only filters are only reachable through EVEX table paths; the
        // fallback value never selects a populated child for other encodings.
        FilterKind::EvexL2 => Some(ctx.prefixes.evex().map(|e| e.l2).unwrap_or(false) as usize),
        FilterKind::EvexB => Some(ctx.prefixes.evex().map(|e| e.bcst).unwrap_or(false) as usize),
    };
    Ok(index)
}

/// Builds the trie at initialization time.
///
/// Misuse (inserting conflicting paths) indicates a broken table and panics
/// during the one-time build, never during decoding.
pub struct TrieBuilder {
    nodes: Vec<Node>,
}

impl TrieBuilder {
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(1024);
        nodes.push(Node::Invalid);
        nodes.push(Node::Filter {
            kind: FilterKind::Opcode,
            children: vec![INVALID_NODE; FilterKind::Opcode.domain_size()].into_boxed_slice(),
        });
        Self { nodes }
    }

    /// Inserts a path of `(filter kind, child index)` steps ending in a
    /// definition reference. Shared step prefixes reuse existing nodes.
    pub fn insert(&mut self, steps: &[(FilterKind, usize)], def: u16, operand_count: u8) {
        assert!(!steps.is_empty(), "a path needs at least the opcode step");
        assert_eq!(steps[0].0, FilterKind::Opcode, "paths start at the root");

        let mut current = ROOT_NODE;
        for (pos, &(kind, index)) in steps.iter().enumerate() {
            self.check_step(current, kind, index);
            let last = pos + 1 == steps.len();
            if last {
                self.set_child(
                    current,
                    index,
                    Child::Definition { def, operand_count },
                );
            } else {
                let next_kind = steps[pos + 1].0;
                current = self.filter_child(current, index, next_kind);
            }
        }
    }

    fn check_step(&self, node: NodeId, kind: FilterKind, index: usize) {
        match &self.nodes[node as usize] {
            Node::Filter { kind: k, children } => {
                assert_eq!(*k, kind, "table conflict: expected {k:?} filter, path has {kind:?}");
                assert!(
                    index < children.len(),
                    "index {index} out of range for {kind:?}"
                );
            }
            other => panic!("table conflict: expected a {kind:?} filter, found {other:?}"),
        }
    }

    /// Returns the child filter node at `parent[index]`, creating it if the
    /// slot is still the sentinel.
    fn filter_child(&mut self, parent: NodeId, index: usize, kind: FilterKind) -> NodeId {
        let existing = match &self.nodes[parent as usize] {
            Node::Filter { children, .. } => children[index],
            _ => unreachable!("checked by check_step"),
        };
        if existing != INVALID_NODE {
            match &self.nodes[existing as usize] {
                Node::Filter { kind: k, .. } if *k == kind => return existing,
                other => panic!(
                    "table conflict: slot already holds {other:?}, path needs a {kind:?} filter"
                ),
            }
        }
        let id = self.push(Node::Filter {
            kind,
            children: vec![INVALID_NODE; kind.domain_size()].into_boxed_slice(),
        });
        self.set_child(parent, index, Child::Node(id));
        id
    }

    fn set_child(&mut self, parent: NodeId, index: usize, child: Child) {
        let id = match child {
            Child::Node(id) => id,
            Child::Definition { def, operand_count } => {
                self.push(Node::Definition { def, operand_count })
            }
        };
        match &mut self.nodes[parent as usize] {
            Node::Filter { children, .. } => {
                assert_eq!(
                    children[index], INVALID_NODE,
                    "table conflict: duplicate definition for the same path"
                );
                children[index] = id;
            }
            _ => unreachable!("checked by check_step"),
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        assert!(id <= NodeId::MAX as usize, "node arena overflow");
        self.nodes.push(node);
        id as NodeId
    }

    /// Finishes the build, verifying the arity invariant.
    pub fn finish(self) -> Trie {
        for node in &self.nodes {
            if let Node::Filter { kind, children } = node {
                debug_assert_eq!(children.len(), kind.domain_size());
            }
        }
        Trie { nodes: self.nodes }
    }
}

impl Default for TrieBuilder {
    fn default() -> Self {
        Self::new()
    }
}

enum Child {
    Node(NodeId),
    Definition { def: u16, operand_count: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_shares_step_prefixes() {
        let mut b = TrieBuilder::new();
        b.insert(
            &[
                (FilterKind::Opcode, 0x00),
                (FilterKind::VexMap, 0),
                (FilterKind::OperandSize, 0),
            ],
            0,
            2,
        );
        b.insert(
            &[
                (FilterKind::Opcode, 0x00),
                (FilterKind::VexMap, 0),
                (FilterKind::OperandSize, 1),
            ],
            1,
            2,
        );
        let trie = b.finish();
        // Root + invalid + one VexMap + one OperandSize + two definitions.
        assert_eq!(trie.len(), 6);
    }

    #[test]
    #[should_panic(expected = "duplicate definition")]
    fn builder_rejects_duplicate_paths() {
        let mut b = TrieBuilder::new();
        let steps = [(FilterKind::Opcode, 0x90), (FilterKind::VexMap, 0)];
        b.insert(&steps, 0, 0);
        b.insert(&steps, 1, 0);
    }

    #[test]
    fn unpopulated_slots_are_the_sentinel() {
        let b = TrieBuilder::new();
        let trie = b.finish();
        match trie.node(ROOT_NODE) {
            Node::Filter { children, .. } => {
                assert!(children.iter().all(|&c| c == INVALID_NODE));
            }
            _ => panic!("root must be a filter"),
        }
    }
}
