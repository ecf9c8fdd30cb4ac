// tables.rs — binary angles, fine trig tables and point-to-angle
//
// The tables are generated once on first use instead of being carried as
// literal arrays. finesine[i] is sin((i + 0.5) * 2pi / FINEANGLES) scaled to
// 16.16 and truncated toward zero, which is how the shipped tables were made.

use std::sync::OnceLock;

use crate::m_fixed::{Fixed, FRACUNIT};

/// Binary angle measurement: the full circle is 2^32.
pub type Angle = u32;

pub const ANG45: Angle = 0x2000_0000;
pub const ANG90: Angle = 0x4000_0000;
pub const ANG180: Angle = 0x8000_0000;
pub const ANG270: Angle = 0xc000_0000;

pub const FINEANGLES: usize = 8192;
pub const FINEMASK: usize = FINEANGLES - 1;
/// Shift a BAM angle right by this to get a fine table index.
pub const ANGLETOFINESHIFT: u32 = 19;

pub const SLOPERANGE: u32 = 2048;

struct TrigTables {
    // 5/4 of a circle so cosine can index a quarter turn ahead
    finesine: Vec<Fixed>,
    tantoangle: Vec<Angle>,
}

static TABLES: OnceLock<TrigTables> = OnceLock::new();

fn tables() -> &'static TrigTables {
    TABLES.get_or_init(|| {
        let two_pi = std::f64::consts::PI * 2.0;
        let finesine = (0..5 * FINEANGLES / 4)
            .map(|i| {
                let a = (i as f64 + 0.5) * two_pi / FINEANGLES as f64;
                (a.sin() * FRACUNIT as f64) as Fixed
            })
            .collect();
        let tantoangle = (0..=SLOPERANGE as usize)
            .map(|i| {
                let a = (i as f64 / SLOPERANGE as f64).atan();
                (a / two_pi * 4_294_967_296.0) as Angle
            })
            .collect();
        TrigTables { finesine, tantoangle }
    })
}

#[inline]
pub fn finesine(index: usize) -> Fixed {
    tables().finesine[index & FINEMASK]
}

#[inline]
pub fn finecosine(index: usize) -> Fixed {
    tables().finesine[(index & FINEMASK) + FINEANGLES / 4]
}

#[inline]
pub fn tantoangle(index: usize) -> Angle {
    tables().tantoangle[index.min(SLOPERANGE as usize)]
}

/// Fine table index for a BAM angle.
#[inline]
pub const fn fine_index(angle: Angle) -> usize {
    (angle >> ANGLETOFINESHIFT) as usize
}

pub fn slope_div(num: u32, den: u32) -> usize {
    if den < 512 {
        return SLOPERANGE as usize;
    }
    let ans = (num << 3) / (den >> 8);
    ans.min(SLOPERANGE) as usize
}

/// Angle of the vector (x2 - x1, y2 - y1), octant by octant through
/// tantoangle. Note the `- 1` on some octants; straight up is `ANG90 - 1`.
pub fn point_to_angle2(x1: Fixed, y1: Fixed, x2: Fixed, y2: Fixed) -> Angle {
    let mut x = x2.wrapping_sub(x1);
    let mut y = y2.wrapping_sub(y1);

    if x == 0 && y == 0 {
        return 0;
    }

    if x >= 0 {
        if y >= 0 {
            if x > y {
                tantoangle(slope_div(y as u32, x as u32))
            } else {
                ANG90 - 1 - tantoangle(slope_div(x as u32, y as u32))
            }
        } else {
            y = y.wrapping_neg();
            if x > y {
                tantoangle(slope_div(y as u32, x as u32)).wrapping_neg()
            } else {
                ANG270.wrapping_add(tantoangle(slope_div(x as u32, y as u32)))
            }
        }
    } else {
        x = x.wrapping_neg();
        if y >= 0 {
            if x > y {
                ANG180 - 1 - tantoangle(slope_div(y as u32, x as u32))
            } else {
                ANG90 + tantoangle(slope_div(x as u32, y as u32))
            }
        } else {
            y = y.wrapping_neg();
            if x > y {
                ANG180 + tantoangle(slope_div(y as u32, x as u32))
            } else {
                ANG270 - 1 - tantoangle(slope_div(x as u32, y as u32))
            }
        }
    }
}
