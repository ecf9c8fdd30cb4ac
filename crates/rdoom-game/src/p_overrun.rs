// p_overrun.rs — emulation of the legacy fixed-size buffer overflows
//
// The legacy engine kept 128 intercepts and 8 crossed special lines in static
// arrays. Levels that produced more wrote past the ends into whatever globals
// followed, and recorded demos depend on the values those globals ended up
// with. Here the buffers simply grow; when emulation is switched on, each
// write past the old end is replayed into a table of the globals it would have
// landed in.

use rdoom_common::common::com_warning;

use crate::p_local::*;

pub const MAXINTERCEPTS_ORIGINAL: usize = 128;
pub const MAXSPECIALCROSS_ORIGINAL: usize = 8;

/// Base address the spechit overrun formula pretends `lines` lives at.
pub const DEFAULT_SPECHIT_MAGIC: u32 = 0x01C0_9C98;

/// How the intercept buffer behaves past the legacy capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InterceptPolicy {
    #[default]
    Unbounded,
    /// Grow, and also replay each overflowing entry into the overrun table.
    LegacyEmulated,
}

/// A value an overflowing spechit entry forced into live movement state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpechitClobber {
    TmBbox(usize, Fixed),
    CrushChange(i32),
    NoFit(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Pad,
    LowFloor,
    OpenBottom,
    OpenTop,
    OpenRange,
    BulletSlope,
    PlayerStarts,
    BmapWidth,
    BmapOrgX,
    BmapOrgY,
    BmapHeight,
}

// Memory following the intercept array, in bytes.
const INTERCEPTS_LAYOUT: &[(usize, Slot)] = &[
    (4, Slot::Pad),
    (4, Slot::Pad),
    (4, Slot::Pad),
    (4, Slot::LowFloor),
    (4, Slot::OpenBottom),
    (4, Slot::OpenTop),
    (4, Slot::OpenRange),
    (4, Slot::Pad),
    (120, Slot::Pad),
    (8, Slot::Pad),
    (4, Slot::BulletSlope),
    (4, Slot::Pad),
    (4, Slot::Pad),
    (4, Slot::Pad),
    (40, Slot::PlayerStarts),
    (4, Slot::Pad),
    (4, Slot::BmapWidth),
    (4, Slot::Pad),
    (4, Slot::BmapOrgX),
    (4, Slot::BmapOrgY),
    (4, Slot::Pad),
    (4, Slot::BmapHeight),
];

const PLAYERSTART_WORDS: usize = 20;

/// The globals an overflow is known to overwrite, with the last value
/// written to each. `None` means never touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverrunTable {
    pub lowfloor: Option<i32>,
    pub openbottom: Option<i32>,
    pub opentop: Option<i32>,
    pub openrange: Option<i32>,
    pub bulletslope: Option<i32>,
    /// Player start records seen as 16-bit words.
    pub playerstarts: [Option<i16>; PLAYERSTART_WORDS],
    pub bmapwidth: Option<i32>,
    pub bmaporgx: Option<i32>,
    pub bmaporgy: Option<i32>,
    pub bmapheight: Option<i32>,

    pub tmbbox: [Option<Fixed>; 4],
    pub crushchange: Option<i32>,
    pub nofit: Option<i32>,

    pub intercept_overruns: usize,
    pub spechit_overruns: usize,
}

impl OverrunTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Replay an intercept stored at buffer position `index` (0 based).
    /// Positions up to and including the legacy capacity are harmless.
    pub fn record_intercept(&mut self, index: usize, icpt: &Intercept) {
        if index <= MAXINTERCEPTS_ORIGINAL {
            return;
        }
        self.intercept_overruns += 1;

        let location = (index - MAXINTERCEPTS_ORIGINAL - 1) * 12;
        let (isaline, which) = match icpt.target {
            InterceptTarget::Line(l) => (1, l as i32),
            InterceptTarget::Thing(id) => (0, id.index as i32),
        };
        self.write(location, icpt.frac);
        self.write(location + 4, isaline);
        self.write(location + 8, which);
    }

    fn write(&mut self, location: usize, value: i32) {
        let mut offset = 0;
        for &(len, slot) in INTERCEPTS_LAYOUT {
            if offset + len > location {
                let field = match slot {
                    Slot::Pad => return,
                    Slot::PlayerStarts => {
                        let index = (location - offset) / 2;
                        self.playerstarts[index] = Some(value as i16);
                        if index + 1 < PLAYERSTART_WORDS {
                            self.playerstarts[index + 1] = Some((value >> 16) as i16);
                        }
                        return;
                    }
                    Slot::LowFloor => &mut self.lowfloor,
                    Slot::OpenBottom => &mut self.openbottom,
                    Slot::OpenTop => &mut self.opentop,
                    Slot::OpenRange => &mut self.openrange,
                    Slot::BulletSlope => &mut self.bulletslope,
                    Slot::BmapWidth => &mut self.bmapwidth,
                    Slot::BmapOrgX => &mut self.bmaporgx,
                    Slot::BmapOrgY => &mut self.bmaporgy,
                    Slot::BmapHeight => &mut self.bmapheight,
                };
                *field = Some(value);
                return;
            }
            offset += len;
        }
    }

    /// Replay the `numspechit`th (1 based) crossed special line. Returns the
    /// live value it clobbers, if the legacy layout says it hit one.
    pub fn record_spechit(&mut self, numspechit: usize, line: usize, magic: u32) -> Option<SpechitClobber> {
        if numspechit <= MAXSPECIALCROSS_ORIGINAL {
            return None;
        }
        self.spechit_overruns += 1;

        let addr = magic.wrapping_add((line as u32).wrapping_mul(0x3E)) as i32;
        match numspechit {
            9..=12 => {
                let i = numspechit - 9;
                self.tmbbox[i] = Some(addr);
                Some(SpechitClobber::TmBbox(i, addr))
            }
            13 => {
                self.crushchange = Some(addr);
                Some(SpechitClobber::CrushChange(addr))
            }
            14 => {
                self.nofit = Some(addr);
                Some(SpechitClobber::NoFit(addr))
            }
            _ => {
                com_warning(&format!(
                    "unable to emulate a spechit overrun where numspechit={}\n",
                    numspechit
                ));
                None
            }
        }
    }
}
