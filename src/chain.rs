//! Neighbor pairing and transform-chain resolution.
//!
//! Every non-reference slice is registered directly against neighbor slices
//! chosen by a [`PairingPolicy`]; a [`ChainResolver`] then yields, for each
//! slice, the ordered hop sequence whose partial transforms compose into
//! that slice's transform relative to the reference. Both are trait objects
//! on the pipeline so that the default adjacency rule can be swapped for a
//! different strategy (for example a similarity-weighted graph policy)
//! without touching the scheduler.

use crate::range::{SliceIndex, SliceRange};

/// A request to register the `moving` slice directly onto the `fixed` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairingLink {
    pub moving: SliceIndex,
    pub fixed: SliceIndex,
}

/// One hop of a composite transform chain: the partial transform computed
/// for moving slice `from` against fixed slice `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub from: SliceIndex,
    pub to: SliceIndex,
}

/// Chooses which fixed slices a moving slice is registered against.
pub trait PairingPolicy: Send + Sync {
    /// Direct registration targets for `moving`, which must lie in `range`.
    ///
    /// The reference slice pairs with itself, producing the identity
    /// transform every chain terminates at.
    fn pairs_for(&self, range: &SliceRange, moving: SliceIndex) -> Vec<PairingLink>;
}

/// Resolves the hop sequence connecting a slice to the reference.
pub trait ChainResolver: Send + Sync {
    /// Hops for `moving`, resolved from the reference slice outwards.
    ///
    /// Use [`apply_order`] to reorder the result for transform composition.
    fn chain_for(&self, range: &SliceRange, moving: SliceIndex) -> Vec<ChainLink>;
}

/// Reorder a resolved chain into application order: the partial transform
/// touching the moving slice is applied first and the one touching the
/// reference last. Chains resolved from the reference outwards are
/// reversed; chains that already start at the moving slice pass through
/// unchanged.
pub fn apply_order(mut links: Vec<ChainLink>, moving: SliceIndex) -> Vec<ChainLink> {
    if links.first().is_some_and(|link| link.from != moving) {
        links.reverse();
    }
    links
}

/// Fixed-distance adjacency: each slice pairs with the neighbors at most
/// `step` indices away on its reference-facing side, clipped to the slice
/// range. The stock pipeline runs with `step == 1`.
#[derive(Debug, Clone, Copy)]
pub struct AdjacentPairing {
    step: u32,
}

impl AdjacentPairing {
    pub fn new() -> Self {
        Self { step: 1 }
    }

    /// Pair against up to `step` consecutive neighbors instead of one.
    pub fn with_step(step: u32) -> Self {
        debug_assert!(step >= 1);
        Self { step }
    }
}

impl Default for AdjacentPairing {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingPolicy for AdjacentPairing {
    fn pairs_for(&self, range: &SliceRange, moving: SliceIndex) -> Vec<PairingLink> {
        debug_assert!(range.contains(moving));
        let reference = range.reference;
        let mut links = Vec::new();
        if moving == reference {
            links.push(PairingLink {
                moving,
                fixed: moving,
            });
        } else if moving > reference {
            for fixed in moving.saturating_sub(self.step)..moving {
                if fixed >= reference {
                    links.push(PairingLink { moving, fixed });
                }
            }
        } else {
            for fixed in (moving + 1)..=(moving + self.step) {
                if fixed <= reference {
                    links.push(PairingLink { moving, fixed });
                }
            }
        }
        links
    }
}

impl ChainResolver for AdjacentPairing {
    fn chain_for(&self, range: &SliceRange, moving: SliceIndex) -> Vec<ChainLink> {
        debug_assert!(range.contains(moving));
        let reference = range.reference;
        let mut links = Vec::new();
        if moving == reference {
            links.push(ChainLink {
                from: reference,
                to: reference,
            });
        } else if moving > reference {
            for index in reference..moving {
                links.push(ChainLink {
                    from: index + 1,
                    to: index,
                });
            }
        } else {
            for index in moving..reference {
                links.push(ChainLink {
                    from: index,
                    to: index + 1,
                });
            }
        }
        links
    }
}
