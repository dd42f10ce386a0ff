// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Size-bucketed recycling store for activation frames.
//!
//! Function call and return dominate allocation in the interpreter, and
//! almost every frame has one of a handful of slot counts. Freed frames are
//! therefore parked in a per-slot-count bucket and handed back on the next
//! request for that size, so calls do not churn the general heap.
//!
//! A recycled frame keeps its slot buffer; the next `alloc` for the same
//! slot count returns the identical allocation with every slot cleared.


use crate::node::NodeRef;

/// Largest slot count with a dedicated bucket. Frames bigger than this are
/// rare; they fall through to plain heap allocation and deallocation.
pub const FRAME_BUCKETS: usize = 64;

/// An activation frame: the slot array backing an environment.
///
/// Frames are not nodes; their trailing slot array is variable-length, so
/// they live out-of-line and the owning environment node points at them.
#[derive(Debug)]
pub struct Frame {
    pub(crate) nslots: u32,
    /// List of formal names bound by this frame, or null.
    pub(crate) vars: NodeRef,
    /// The closure that built this frame, or null.
    pub(crate) closure: NodeRef,
    pub(crate) slots: Box<[NodeRef]>,
}

impl Frame {
    /// Build a fresh frame with every reference slot null.
    #[must_use]
    fn with_slots(nslots: u32) -> Self {
        Self {
            nslots,
            vars: NodeRef::NULL,
            closure: NodeRef::NULL,
            slots: vec![NodeRef::NULL; nslots as usize].into_boxed_slice(),
        }
    }

    /// Number of value slots.
    #[must_use]
    pub const fn nslots(&self) -> u32 {
        self.nslots
    }
}

/// The frame store: one free stack per slot count.
pub(crate) struct FrameStore {
    buckets: Vec<Vec<Frame>>,
}

impl FrameStore {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            buckets: (0..FRAME_BUCKETS).map(|_| Vec::new()).collect(),
        }
    }

    /// Get a frame with `nslots` slots, reusing a parked one when possible.
    ///
    /// The returned frame has `vars`, `closure` and every slot cleared to
    /// null. A parked frame whose recorded slot count disagrees with its
    /// bucket is an invariant breach and fatal.
    pub(crate) fn alloc(&mut self, nslots: u32) -> Frame {
        match self.take(nslots) {
            Some(mut frame) => {
                frame.vars = NodeRef::NULL;
                frame.closure = NodeRef::NULL;
                frame.slots.fill(NodeRef::NULL);
                frame
            }
            None => Frame::with_slots(nslots),
        }
    }

    /// Copy a nursery-resident frame image into a store-owned frame.
    ///
    /// `slots` carries the raw nursery cells of the image's slot section.
    pub(crate) fn clone_image(
        &mut self,
        nslots: u32,
        vars: NodeRef,
        closure: NodeRef,
        slots: &[u32],
    ) -> Frame {
        let mut frame = match self.take(nslots) {
            Some(frame) => frame,
            None => Frame::with_slots(nslots),
        };
        frame.vars = vars;
        frame.closure = closure;
        for (slot, &bits) in frame.slots.iter_mut().zip(slots) {
            *slot = NodeRef::from_bits(bits);
        }
        frame
    }

    /// Park a frame for reuse, or drop it when no bucket fits.
    pub(crate) fn free(&mut self, frame: Frame) {
        let nslots = frame.nslots as usize;
        if nslots < FRAME_BUCKETS {
            self.buckets[nslots].push(frame);
        }
    }

    /// Pop a parked frame for `nslots`, verifying its recorded size.
    fn take(&mut self, nslots: u32) -> Option<Frame> {
        let bucket = self.buckets.get_mut(nslots as usize)?;
        let frame = bucket.pop()?;
        assert!(
            frame.nslots == nslots,
            "recycled frame size inconsistent with request"
        );
        Some(frame)
    }

    /// Number of frames parked for `nslots`.
    #[cfg(test)]
    pub(crate) fn parked(&self, nslots: u32) -> usize {
        self.buckets
            .get(nslots as usize)
            .map_or(0, std::vec::Vec::len)
    }
}
