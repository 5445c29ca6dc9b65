//! Block filter (spec.md §4.4, §9 "Block filter as first-class predicate").
//!
//! No teacher component covers this — `embedded-gif`'s `GifDecoder` parses
//! every block unconditionally. Grounded directly on spec.md §9's design
//! note: a pure, synchronous predicate over a tagged context carrying at
//! minimum the block identifier.

use crate::model::BlockId;

/// The context passed to a [`BlockFilter`] before a block is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockContext {
    LogicalScreenDescriptor,
    GlobalColorTable,
    Extension(BlockId),
    ImageDescriptor,
    LocalColorTable,
    ImageDataHeader,
    ImageDataSubBlock,
}

/// A caller-supplied predicate consulted before each block is consumed.
/// Returning `true` tells the parser to advance past the block (including
/// any trailing sub-block chain) without producing side effects.
///
/// Must be pure and synchronous, and tolerate being invoked many times per
/// frame (spec.md §9).
pub trait BlockFilter {
    fn skip(&mut self, ctx: BlockContext) -> bool;
}

/// The default filter: admits every block.
pub struct AdmitAll;

impl BlockFilter for AdmitAll {
    fn skip(&mut self, _ctx: BlockContext) -> bool {
        false
    }
}

impl<F: FnMut(BlockContext) -> bool> BlockFilter for F {
    fn skip(&mut self, ctx: BlockContext) -> bool {
        self(ctx)
    }
}
