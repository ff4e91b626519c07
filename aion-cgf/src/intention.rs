//! Collision intention bits and face classification

use bitflags::bitflags;

bitflags! {
    /// What a collision batch is used for on the server
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct CollisionIntention: u8 {
        const PHYSICAL = 1;
        const MATERIAL = 2;
        const SKILL = 4;
        const WALK = 8;
        const DOOR = 16;
        const EVENT = 32;
        const MOVEABLE = 64;
    }
}

impl Default for CollisionIntention {
    fn default() -> Self {
        CollisionIntention::PHYSICAL
    }
}

/// Classify faces by their slot material
///
/// `semantic_id` is the material's dictionary id when it is one of the
/// intention ids, `collideable` its resolved collision flag. Returns the
/// material id and intention to store, or `None` when the faces are
/// irrelevant for collision.
pub fn classify(semantic_id: Option<u8>, collideable: bool) -> Option<(u8, CollisionIntention)> {
    let (material_id, mut intention) = match semantic_id {
        Some(id) => {
            let mut bits = CollisionIntention::MATERIAL;
            // abyss cores and bases never block movement
            if collideable && !(14..=16).contains(&id) {
                bits |= CollisionIntention::PHYSICAL;
            }
            (id, bits)
        }
        None if collideable => (0, CollisionIntention::PHYSICAL),
        None => return None,
    };
    if (1..=9).contains(&material_id) {
        intention |= CollisionIntention::WALK;
    }
    Some((material_id, intention))
}
