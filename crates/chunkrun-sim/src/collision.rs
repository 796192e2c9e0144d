use crate::geometry::{Rect, Vec2};

/// Face of the surface the actor ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Landed on the surface from above.
    Top,
    /// Hit the underside while moving up.
    Bottom,
    /// Ran into the surface's left face while moving right.
    Left,
    /// Ran into the surface's right face while moving left.
    Right,
}

/// New position (top-left corner) and velocity for the actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Whether the actor now stands on the surface.
    pub grounded: bool,
}

impl Correction {
    /// Leaves the actor where it is.
    pub fn identity(curr: &Rect, velocity: Vec2) -> Self {
        Self {
            position: Vec2::new(curr.x, curr.y),
            velocity,
            grounded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionOutcome {
    NoContact,
    /// `side` is `None` when the boxes overlap but the previous frame does not
    /// explain the approach (already interpenetrating). The correction is then
    /// the identity and the caller picks a fallback.
    Contact {
        side: Option<Side>,
        correction: Correction,
    },
}

impl CollisionOutcome {
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::NoContact => None,
            Self::Contact { side, .. } => *side,
        }
    }
}

/// Sweep test of an actor against one static surface.
///
/// The approach side is decided from the previous frame's box, not the
/// current one, so fast actors that are deep inside the surface this frame
/// are still pushed back out of the face they crossed. Vertical faces win
/// over horizontal ones when both predicates hold.
pub fn resolve(prev: &Rect, curr: &Rect, velocity: Vec2, surface: &Rect) -> CollisionOutcome {
    if !curr.overlaps(surface) {
        return CollisionOutcome::NoContact;
    }

    let mut correction = Correction::identity(curr, velocity);

    let side = if prev.bottom() <= surface.top() && velocity.y > 0.0 {
        correction.position.y = surface.top() - curr.height;
        correction.velocity.y = 0.0;
        correction.grounded = true;
        Some(Side::Top)
    } else if prev.top() >= surface.bottom() && velocity.y < 0.0 {
        correction.position.y = surface.bottom();
        correction.velocity.y = 0.0;
        Some(Side::Bottom)
    } else if prev.right() <= surface.left() && velocity.x > 0.0 {
        correction.position.x = surface.left() - curr.width;
        correction.velocity.x = 0.0;
        Some(Side::Left)
    } else if prev.left() >= surface.right() && velocity.x < 0.0 {
        correction.position.x = surface.right();
        correction.velocity.x = 0.0;
        Some(Side::Right)
    } else {
        None
    };

    CollisionOutcome::Contact { side, correction }
}

/// Push an overlapping actor out of a solid block horizontally, ignoring how
/// it got there. Moving right puts it on the block's left; moving left puts
/// it on the right; at rest it goes to whichever side its centre is on.
pub fn push_out_horizontally(curr: &Rect, velocity: Vec2, surface: &Rect) -> Correction {
    let to_left = if velocity.x > 0.0 {
        true
    } else if velocity.x < 0.0 {
        false
    } else {
        curr.center_x() < surface.center_x()
    };

    let x = if to_left {
        surface.left() - curr.width
    } else {
        surface.right()
    };

    Correction {
        position: Vec2::new(x, curr.y),
        velocity: Vec2::new(0.0, velocity.y),
        grounded: false,
    }
}
