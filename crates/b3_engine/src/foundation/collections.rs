//! Specialized collection types

pub use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle to a node stored in a [`NodeArena`]
    pub struct NodeHandle;
}

/// Arena holding scene nodes behind stable, generation-checked handles
pub type NodeArena<T> = SlotMap<NodeHandle, T>;
