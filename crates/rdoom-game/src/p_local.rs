// p_local.rs — constants and small types shared by the play modules

pub use rdoom_common::m_fixed::{
    fixed_div, fixed_from_int, fixed_mul, fixed_to_int, Fixed, FRACBITS, FRACUNIT,
};
pub use rdoom_common::tables::Angle;

use crate::p_mobj::MobjId;

// ============================================================
// Blockmap geometry
// ============================================================

pub const MAPBLOCKUNITS: i32 = 128;
pub const MAPBLOCKSIZE: Fixed = MAPBLOCKUNITS * FRACUNIT;
pub const MAPBLOCKSHIFT: i32 = FRACBITS + 7;
pub const MAPBMASK: Fixed = MAPBLOCKSIZE - 1;
pub const MAPBTOFRAC: i32 = MAPBLOCKSHIFT - FRACBITS;

/// Largest radius of any actor. Actors are linked into the cell holding
/// their origin, so box queries widen by this much to see overlapping ones.
pub const MAXRADIUS: Fixed = 32 * FRACUNIT;

// ============================================================
// Movement and attack ranges
// ============================================================

pub const MAXMOVE: Fixed = 30 * FRACUNIT;
pub const STEPHEIGHT: Fixed = 24 * FRACUNIT;
pub const USERANGE: Fixed = 64 * FRACUNIT;
pub const MISSILERANGE: Fixed = 32 * 64 * FRACUNIT;

/// Grid cells a single path trace may visit.
pub const MAX_TRACE_STEPS: usize = 64;
/// Slide attempts before falling back to the stairstep.
pub const MAX_SLIDE_ATTEMPTS: usize = 3;

/// Damage value reserved for probe traces (laser sights, crosshair
/// target lookup). A probe finds the impact point and nothing else.
pub const LASER_PROBE_DAMAGE: i32 = i32::MIN;

// ============================================================
// Bounding boxes
// ============================================================

pub const BOXTOP: usize = 0;
pub const BOXBOTTOM: usize = 1;
pub const BOXLEFT: usize = 2;
pub const BOXRIGHT: usize = 3;

pub type BBox = [Fixed; 4];

pub fn m_clear_box(b: &mut BBox) {
    b[BOXTOP] = i32::MIN;
    b[BOXRIGHT] = i32::MIN;
    b[BOXBOTTOM] = i32::MAX;
    b[BOXLEFT] = i32::MAX;
}

pub fn m_add_to_box(b: &mut BBox, x: Fixed, y: Fixed) {
    if x < b[BOXLEFT] {
        b[BOXLEFT] = x;
    }
    if x > b[BOXRIGHT] {
        b[BOXRIGHT] = x;
    }
    if y < b[BOXBOTTOM] {
        b[BOXBOTTOM] = y;
    }
    if y > b[BOXTOP] {
        b[BOXTOP] = y;
    }
}

// ============================================================
// Visitors and traces
// ============================================================

/// What a visitor wants the iteration to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Visit {
    Continue,
    /// A blocking or final condition was found.
    Stop,
}

impl Visit {
    #[inline]
    pub fn continue_if(cond: bool) -> Self {
        if cond {
            Visit::Continue
        } else {
            Visit::Stop
        }
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PathFlags: u32 {
        const ADD_LINES  = 0x01;
        const ADD_THINGS = 0x02;
        /// A one-sided wall before the end of the trace aborts the whole trace.
        const EARLY_OUT  = 0x04;
    }
}

/// A line as origin plus direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Divline {
    pub x: Fixed,
    pub y: Fixed,
    pub dx: Fixed,
    pub dy: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptTarget {
    Line(usize),
    Thing(MobjId),
}

/// A candidate contact at `frac` along the traced segment (FRACUNIT = end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intercept {
    pub frac: Fixed,
    pub target: InterceptTarget,
}
