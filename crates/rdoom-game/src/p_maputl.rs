// p_maputl.rs — geometry primitives, blockmap iteration and the path tracer
//
// Side tests and intercepts are 16.16 fixed point and truncate exactly the way
// the legacy routines did; several deliberately drop low bits (`>> FRACBITS`,
// `>> 8`) before multiplying. Do not "fix" those without breaking demo sync.

use crate::p_ctx::PlayCtx;
use crate::p_level::{Line, SlopeType};
use crate::p_local::*;
use crate::p_mobj::{MobjFlags, MobjId};
use crate::p_overrun::InterceptPolicy;

/// Octagonal distance estimate: |dx| + |dy| - min(|dx|, |dy|) / 2.
pub fn approx_distance(dx: Fixed, dy: Fixed) -> Fixed {
    let dx = dx.wrapping_abs();
    let dy = dy.wrapping_abs();
    if dx < dy {
        dx.wrapping_add(dy).wrapping_sub(dx >> 1)
    } else {
        dx.wrapping_add(dy).wrapping_sub(dy >> 1)
    }
}

/// 0 if the point is on the front (right) side of the line, 1 otherwise.
pub fn point_on_line_side(x: Fixed, y: Fixed, line: &Line) -> usize {
    if line.dx == 0 {
        if x <= line.v1.x {
            return (line.dy > 0) as usize;
        }
        return (line.dy < 0) as usize;
    }
    if line.dy == 0 {
        if y <= line.v1.y {
            return (line.dx < 0) as usize;
        }
        return (line.dx > 0) as usize;
    }

    let dx = x.wrapping_sub(line.v1.x);
    let dy = y.wrapping_sub(line.v1.y);
    let left = fixed_mul(line.dy >> FRACBITS, dx);
    let right = fixed_mul(dy, line.dx >> FRACBITS);

    if right < left {
        0
    } else {
        1
    }
}

/// Which side of the line a box is on: 0, 1, or -1 when it straddles.
pub fn box_on_line_side(tmbox: &BBox, ld: &Line) -> i32 {
    let (p1, p2) = match ld.slopetype {
        SlopeType::Horizontal => {
            let mut p1 = (tmbox[BOXTOP] > ld.v1.y) as usize;
            let mut p2 = (tmbox[BOXBOTTOM] > ld.v1.y) as usize;
            if ld.dx < 0 {
                p1 ^= 1;
                p2 ^= 1;
            }
            (p1, p2)
        }
        SlopeType::Vertical => {
            let mut p1 = (tmbox[BOXRIGHT] < ld.v1.x) as usize;
            let mut p2 = (tmbox[BOXLEFT] < ld.v1.x) as usize;
            if ld.dy < 0 {
                p1 ^= 1;
                p2 ^= 1;
            }
            (p1, p2)
        }
        SlopeType::Positive => (
            point_on_line_side(tmbox[BOXLEFT], tmbox[BOXTOP], ld),
            point_on_line_side(tmbox[BOXRIGHT], tmbox[BOXBOTTOM], ld),
        ),
        SlopeType::Negative => (
            point_on_line_side(tmbox[BOXRIGHT], tmbox[BOXTOP], ld),
            point_on_line_side(tmbox[BOXLEFT], tmbox[BOXBOTTOM], ld),
        ),
    };

    if p1 == p2 {
        p1 as i32
    } else {
        -1
    }
}

/// Divline version of `point_on_line_side`. Operands are shifted down by 8
/// so long traces cannot overflow the multiply.
pub fn point_on_divline_side(x: Fixed, y: Fixed, line: &Divline) -> usize {
    if line.dx == 0 {
        if x <= line.x {
            return (line.dy > 0) as usize;
        }
        return (line.dy < 0) as usize;
    }
    if line.dy == 0 {
        if y <= line.y {
            return (line.dx < 0) as usize;
        }
        return (line.dx > 0) as usize;
    }

    let dx = x.wrapping_sub(line.x);
    let dy = y.wrapping_sub(line.y);

    // try to quickly decide by looking at sign bits
    if (line.dy ^ line.dx ^ dx ^ dy) < 0 {
        return ((line.dy ^ dx) < 0) as usize;
    }

    let left = fixed_mul(line.dy >> 8, dx >> 8);
    let right = fixed_mul(dy >> 8, line.dx >> 8);

    if right < left {
        0
    } else {
        1
    }
}

pub fn make_divline(li: &Line) -> Divline {
    Divline {
        x: li.v1.x,
        y: li.v1.y,
        dx: li.dx,
        dy: li.dy,
    }
}

/// Fraction along `v2` where it crosses `v1`. Parallel lines give 0.
pub fn intercept_vector(v2: &Divline, v1: &Divline) -> Fixed {
    let den = fixed_mul(v1.dy >> 8, v2.dx).wrapping_sub(fixed_mul(v1.dx >> 8, v2.dy));
    if den == 0 {
        return 0;
    }
    let num = fixed_mul(v1.x.wrapping_sub(v2.x) >> 8, v1.dy)
        .wrapping_add(fixed_mul(v2.y.wrapping_sub(v1.y) >> 8, v1.dx));
    fixed_div(num, den)
}

/// The vertical gap through a two-sided line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Opening {
    pub top: Fixed,
    pub bottom: Fixed,
    pub range: Fixed,
    /// The lower of the two floors.
    pub lowfloor: Fixed,
}

// ============================================================
// Blockmap links and iterators
// ============================================================

impl PlayCtx {
    /// One-sided lines have no opening (range 0).
    pub fn line_opening(&self, linedef: usize) -> Opening {
        let line = &self.level.lines[linedef];
        let back = match line.backsector {
            Some(b) => &self.level.sectors[b],
            None => return Opening::default(),
        };
        let front = &self.level.sectors[line.frontsector];

        let top = front.ceilingheight.min(back.ceilingheight);
        let (bottom, lowfloor) = if front.floorheight > back.floorheight {
            (front.floorheight, back.floorheight)
        } else {
            (back.floorheight, front.floorheight)
        };
        Opening {
            top,
            bottom,
            range: top.wrapping_sub(bottom),
            lowfloor,
        }
    }

    /// Unlink an actor from its sector list and blockmap cell. Call before
    /// changing its x or y, then `set_thing_position` after.
    pub fn unset_thing_position(&mut self, id: MobjId) {
        let (flags, snext, sprev, bnext, bprev, ss, x, y) = {
            let m = &self.mobjs[id];
            (m.flags, m.snext, m.sprev, m.bnext, m.bprev, m.subsector, m.x, m.y)
        };

        if !flags.contains(MobjFlags::NOSECTOR) {
            if let Some(n) = snext {
                self.mobjs[n].sprev = sprev;
            }
            match sprev {
                Some(p) => self.mobjs[p].snext = snext,
                None => {
                    let sec = self.level.subsector_sector(ss);
                    self.level.sectors[sec].thinglist = snext;
                }
            }
        }

        if !flags.contains(MobjFlags::NOBLOCKMAP) {
            if let Some(n) = bnext {
                self.mobjs[n].bprev = bprev;
            }
            match bprev {
                Some(p) => self.mobjs[p].bnext = bnext,
                None => {
                    let bm = &mut self.level.blockmap;
                    let cell = bm.cell_index(bm.block_x(x), bm.block_y(y));
                    if let Some(cell) = cell {
                        bm.blocklinks[cell] = bnext;
                    }
                }
            }
        }
    }

    /// Link an actor into the sector list and blockmap cell for its
    /// current position, and set its subsector.
    pub fn set_thing_position(&mut self, id: MobjId) {
        let (x, y, flags) = {
            let m = &self.mobjs[id];
            (m.x, m.y, m.flags)
        };
        let ss = self.level.point_in_subsector(x, y);
        self.mobjs[id].subsector = ss;

        if !flags.contains(MobjFlags::NOSECTOR) {
            let sec = self.level.subsector_sector(ss);
            let head = self.level.sectors[sec].thinglist;
            {
                let m = &mut self.mobjs[id];
                m.sprev = None;
                m.snext = head;
            }
            if let Some(h) = head {
                self.mobjs[h].sprev = Some(id);
            }
            self.level.sectors[sec].thinglist = Some(id);
        }

        if !flags.contains(MobjFlags::NOBLOCKMAP) {
            let bm = &self.level.blockmap;
            match bm.cell_index(bm.block_x(x), bm.block_y(y)) {
                Some(cell) => {
                    let head = self.level.blockmap.blocklinks[cell];
                    {
                        let m = &mut self.mobjs[id];
                        m.bprev = None;
                        m.bnext = head;
                    }
                    if let Some(h) = head {
                        self.mobjs[h].bprev = Some(id);
                    }
                    self.level.blockmap.blocklinks[cell] = Some(id);
                }
                None => {
                    // off the grid: not in any cell
                    let m = &mut self.mobjs[id];
                    m.bnext = None;
                    m.bprev = None;
                }
            }
        }
    }

    /// Visit every line in a cell not yet seen during this query. Call
    /// `next_validcount` once per query first. Returns false if stopped.
    pub fn block_lines_iterator<F>(&mut self, bx: i32, by: i32, mut func: F) -> bool
    where
        F: FnMut(&mut PlayCtx, usize) -> Visit,
    {
        for pos in self.level.blockmap.cell_span(bx, by) {
            let line = self.level.blockmap.list_line(pos);
            if self.line_validcount[line] == self.validcount {
                continue; // already checked in another cell
            }
            self.line_validcount[line] = self.validcount;

            if func(self, line) == Visit::Stop {
                return false;
            }
        }
        true
    }

    /// Visit every actor linked into a cell. Returns false if stopped.
    pub fn block_things_iterator<F>(&mut self, bx: i32, by: i32, mut func: F) -> bool
    where
        F: FnMut(&mut PlayCtx, MobjId) -> Visit,
    {
        let cell = match self.level.blockmap.cell_index(bx, by) {
            Some(c) => c,
            None => return true,
        };

        let mut mobj = self.level.blockmap.blocklinks[cell];
        while let Some(id) = mobj {
            // a visitor removed this one together with the one before it
            let Some(m) = self.mobjs.get(id) else { break };
            let before = m.bnext;
            if func(self, id) == Visit::Stop {
                return false;
            }
            // the visitor may have removed it; its old link still leads on
            mobj = match self.mobjs.get(id) {
                Some(m) => m.bnext,
                None => before,
            };
        }
        true
    }

    /// Actors in the sector's list, head first.
    pub fn sector_things(&self, sector: usize) -> Vec<MobjId> {
        let mut out = Vec::new();
        let mut it = self.level.sectors[sector].thinglist;
        while let Some(id) = it {
            out.push(id);
            it = self.mobjs.get(id).and_then(|m| m.snext);
        }
        out
    }

    // ============================================================
    // Path tracing
    // ============================================================

    /// Trace a segment through the blockmap, collecting the lines and/or
    /// actors it crosses, then hand them to `trav` nearest first. Returns
    /// false if the traversal was stopped, either by `trav` or by an early
    /// out on a solid wall.
    pub fn path_traverse<F>(
        &mut self,
        x1: Fixed,
        y1: Fixed,
        x2: Fixed,
        y2: Fixed,
        flags: PathFlags,
        trav: F,
    ) -> bool
    where
        F: FnMut(&mut PlayCtx, &Divline, &Intercept) -> Visit,
    {
        let mut intercepts = std::mem::take(&mut self.intercepts);
        intercepts.clear();

        let trace = self.collect_intercepts(x1, y1, x2, y2, flags, &mut intercepts);
        let result = match trace {
            Some(trace) => traverse_intercepts(self, &mut intercepts, &trace, trav, FRACUNIT),
            None => false,
        };

        // keep the capacity for the next trace
        self.intercepts = intercepts;
        result
    }

    /// The grid walk. Returns the trace, or None when an early out hit.
    fn collect_intercepts(
        &mut self,
        mut x1: Fixed,
        mut y1: Fixed,
        mut x2: Fixed,
        mut y2: Fixed,
        flags: PathFlags,
        intercepts: &mut Vec<Intercept>,
    ) -> Option<Divline> {
        let earlyout = flags.contains(PathFlags::EARLY_OUT);
        self.next_validcount();

        let orgx = self.level.blockmap.orgx;
        let orgy = self.level.blockmap.orgy;

        // don't side exactly on a line
        if x1.wrapping_sub(orgx) & MAPBMASK == 0 {
            x1 = x1.wrapping_add(FRACUNIT);
        }
        if y1.wrapping_sub(orgy) & MAPBMASK == 0 {
            y1 = y1.wrapping_add(FRACUNIT);
        }

        let trace = Divline {
            x: x1,
            y: y1,
            dx: x2.wrapping_sub(x1),
            dy: y2.wrapping_sub(y1),
        };

        x1 = x1.wrapping_sub(orgx);
        y1 = y1.wrapping_sub(orgy);
        let xt1 = x1 >> MAPBLOCKSHIFT;
        let yt1 = y1 >> MAPBLOCKSHIFT;

        x2 = x2.wrapping_sub(orgx);
        y2 = y2.wrapping_sub(orgy);
        let xt2 = x2 >> MAPBLOCKSHIFT;
        let yt2 = y2 >> MAPBLOCKSHIFT;

        let (mapxstep, partial, ystep) = if xt2 > xt1 {
            (1, FRACUNIT - ((x1 >> MAPBTOFRAC) & (FRACUNIT - 1)), fixed_div(y2.wrapping_sub(y1), x2.wrapping_sub(x1).wrapping_abs()))
        } else if xt2 < xt1 {
            (-1, (x1 >> MAPBTOFRAC) & (FRACUNIT - 1), fixed_div(y2.wrapping_sub(y1), x2.wrapping_sub(x1).wrapping_abs()))
        } else {
            (0, FRACUNIT, 256 * FRACUNIT)
        };
        let mut yintercept = (y1 >> MAPBTOFRAC).wrapping_add(fixed_mul(partial, ystep));

        let (mapystep, partial, xstep) = if yt2 > yt1 {
            (1, FRACUNIT - ((y1 >> MAPBTOFRAC) & (FRACUNIT - 1)), fixed_div(x2.wrapping_sub(x1), y2.wrapping_sub(y1).wrapping_abs()))
        } else if yt2 < yt1 {
            (-1, (y1 >> MAPBTOFRAC) & (FRACUNIT - 1), fixed_div(x2.wrapping_sub(x1), y2.wrapping_sub(y1).wrapping_abs()))
        } else {
            (0, FRACUNIT, 256 * FRACUNIT)
        };
        let mut xintercept = (x1 >> MAPBTOFRAC).wrapping_add(fixed_mul(partial, xstep));

        // step through map blocks
        let mut mapx = xt1;
        let mut mapy = yt1;
        for _ in 0..MAX_TRACE_STEPS {
            if flags.contains(PathFlags::ADD_LINES)
                && !self.block_lines_iterator(mapx, mapy, |ctx, ld| {
                    add_line_intercept(ctx, &trace, earlyout, intercepts, ld)
                })
            {
                return None; // early out
            }

            if flags.contains(PathFlags::ADD_THINGS)
                && !self.block_things_iterator(mapx, mapy, |ctx, thing| {
                    add_thing_intercept(ctx, &trace, intercepts, thing)
                })
            {
                return None;
            }

            if mapx == xt2 && mapy == yt2 {
                break;
            }

            if (yintercept >> FRACBITS) == mapy {
                yintercept = yintercept.wrapping_add(ystep);
                mapx += mapxstep;
            } else if (xintercept >> FRACBITS) == mapx {
                xintercept = xintercept.wrapping_add(xstep);
                mapy += mapystep;
            }
        }

        Some(trace)
    }
}

fn push_intercept(ctx: &mut PlayCtx, intercepts: &mut Vec<Intercept>, icpt: Intercept) {
    if ctx.config.intercepts == InterceptPolicy::LegacyEmulated {
        ctx.overrun.record_intercept(intercepts.len(), &icpt);
    }
    intercepts.push(icpt);
}

fn add_line_intercept(
    ctx: &mut PlayCtx,
    trace: &Divline,
    earlyout: bool,
    intercepts: &mut Vec<Intercept>,
    ld: usize,
) -> Visit {
    let line = &ctx.level.lines[ld];

    // avoid precision problems with two routines
    let long = trace.dx > FRACUNIT * 16
        || trace.dy > FRACUNIT * 16
        || trace.dx < -FRACUNIT * 16
        || trace.dy < -FRACUNIT * 16;
    let (s1, s2) = if long {
        (
            point_on_divline_side(line.v1.x, line.v1.y, trace),
            point_on_divline_side(line.v2.x, line.v2.y, trace),
        )
    } else {
        (
            point_on_line_side(trace.x, trace.y, line),
            point_on_line_side(trace.x.wrapping_add(trace.dx), trace.y.wrapping_add(trace.dy), line),
        )
    };
    if s1 == s2 {
        return Visit::Continue; // line isn't crossed
    }

    // hit the line
    let dl = make_divline(line);
    let frac = intercept_vector(trace, &dl);
    if frac < 0 {
        return Visit::Continue; // behind source
    }

    // try to early out the check
    if earlyout && frac < FRACUNIT && line.backsector.is_none() {
        return Visit::Stop;
    }

    push_intercept(
        ctx,
        intercepts,
        Intercept { frac, target: InterceptTarget::Line(ld) },
    );
    Visit::Continue
}

fn add_thing_intercept(
    ctx: &mut PlayCtx,
    trace: &Divline,
    intercepts: &mut Vec<Intercept>,
    thing: MobjId,
) -> Visit {
    let m = &ctx.mobjs[thing];

    // check a corner to corner crossection for hit
    let tracepositive = (trace.dx ^ trace.dy) > 0;
    let (x1, y1, x2, y2) = if tracepositive {
        (m.x - m.radius, m.y + m.radius, m.x + m.radius, m.y - m.radius)
    } else {
        (m.x - m.radius, m.y - m.radius, m.x + m.radius, m.y + m.radius)
    };

    let s1 = point_on_divline_side(x1, y1, trace);
    let s2 = point_on_divline_side(x2, y2, trace);
    if s1 == s2 {
        return Visit::Continue; // line isn't crossed
    }

    let dl = Divline {
        x: x1,
        y: y1,
        dx: x2 - x1,
        dy: y2 - y1,
    };
    let frac = intercept_vector(trace, &dl);
    if frac < 0 {
        return Visit::Continue; // behind source
    }

    push_intercept(
        ctx,
        intercepts,
        Intercept { frac, target: InterceptTarget::Thing(thing) },
    );
    Visit::Continue
}

/// Hand the collected intercepts to `func` in order of increasing fraction,
/// first entry winning ties, until one is past `maxfrac`. Returns false if
/// `func` stopped the traversal.
pub fn traverse_intercepts<F>(
    ctx: &mut PlayCtx,
    intercepts: &mut [Intercept],
    trace: &Divline,
    mut func: F,
    maxfrac: Fixed,
) -> bool
where
    F: FnMut(&mut PlayCtx, &Divline, &Intercept) -> Visit,
{
    for _ in 0..intercepts.len() {
        let mut dist = i32::MAX;
        let mut pick = None;
        for (i, scan) in intercepts.iter().enumerate() {
            if scan.frac < dist {
                dist = scan.frac;
                pick = Some(i);
            }
        }

        if dist > maxfrac {
            return true; // checked everything in range
        }
        let i = match pick {
            Some(i) => i,
            None => return true,
        };

        let icpt = intercepts[i];
        if func(ctx, trace, &icpt) == Visit::Stop {
            return false; // don't bother going farther
        }
        intercepts[i].frac = i32::MAX;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p_ctx::PlayConfig;
    use crate::p_mobj::Mobj;
    use crate::test_level::{fx, spawn, LevelBuilder};
    use proptest::prelude::*;

    fn test_line(x1: i32, y1: i32, x2: i32, y2: i32) -> Line {
        let mut b = LevelBuilder::new();
        let s = b.sector(0, 128);
        let l = b.one_sided(x1, y1, x2, y2, s);
        b.build().lines[l].clone()
    }

    /// One-sided line at x = 50 inside a room that starts at (-64, -64), so
    /// a trace from the origin is not on a block boundary.
    fn wall_at_50() -> PlayCtx {
        let mut b = LevelBuilder::new();
        let s = b.sector(0, 128);
        b.room(-64, -64, 320, 64, s);
        b.one_sided(50, -32, 50, 32, s);
        PlayCtx::new(b.build(), PlayConfig::default())
    }

    #[test]
    fn approx_distance_axes_and_diagonal() {
        assert_eq!(approx_distance(fx(100), 0), fx(100));
        assert_eq!(approx_distance(0, fx(-100)), fx(100));
        // 3-4-5 estimates to 4 + 3 - 1.5
        assert_eq!(approx_distance(fx(3), fx(4)), fx(4) + fx(3) - fx(3) / 2);
    }

    #[test]
    fn line_side_fast_paths() {
        // vertical line going north: east is the front
        let v = test_line(0, 0, 0, 64);
        assert_eq!(point_on_line_side(fx(1), fx(10), &v), 0);
        assert_eq!(point_on_line_side(fx(-1), fx(10), &v), 1);
        // on the line counts as back for a northward line
        assert_eq!(point_on_line_side(0, fx(10), &v), 1);

        // horizontal line going east: south is the front
        let h = test_line(0, 0, 64, 0);
        assert_eq!(point_on_line_side(fx(10), fx(-1), &h), 0);
        assert_eq!(point_on_line_side(fx(10), fx(1), &h), 1);
    }

    #[test]
    fn line_side_diagonal() {
        let d = test_line(0, 0, 64, 64);
        assert_eq!(point_on_line_side(fx(40), fx(10), &d), 0);
        assert_eq!(point_on_line_side(fx(10), fx(40), &d), 1);
    }

    #[test]
    fn box_side_classification() {
        let v = test_line(0, -64, 0, 64);
        let east = [fx(20), fx(-20), fx(10), fx(30)];
        let west = [fx(20), fx(-20), fx(-30), fx(-10)];
        let across = [fx(20), fx(-20), fx(-10), fx(10)];
        assert_eq!(box_on_line_side(&east, &v), 0);
        assert_eq!(box_on_line_side(&west, &v), 1);
        assert_eq!(box_on_line_side(&across, &v), -1);

        let d = test_line(0, 0, 64, 64);
        let below = [fx(10), fx(0), fx(30), fx(40)];
        assert_eq!(box_on_line_side(&below, &d), 0);
        let straddle = [fx(40), fx(20), fx(20), fx(40)];
        assert_eq!(box_on_line_side(&straddle, &d), -1);

        let n = test_line(0, 0, 64, -64);
        let above = [fx(40), fx(30), fx(30), fx(40)];
        assert_eq!(box_on_line_side(&above, &n), 1);
    }

    #[test]
    fn divline_side_matches_line_side_off_axis() {
        let line = test_line(0, 0, 128, 32);
        let dl = make_divline(&line);
        for &(x, y) in &[(10, 0), (10, 10), (100, 30), (100, 20), (-50, -5), (200, 60)] {
            assert_eq!(
                point_on_divline_side(fx(x), fx(y), &dl),
                point_on_line_side(fx(x), fx(y), &line),
                "point ({}, {})",
                x,
                y
            );
        }
    }

    #[test]
    fn intercept_vector_half_and_parallel() {
        let trace = Divline { x: 0, y: 0, dx: fx(100), dy: 0 };
        let wall = Divline { x: fx(50), y: fx(-32), dx: 0, dy: fx(64) };
        assert_eq!(intercept_vector(&trace, &wall), FRACUNIT / 2);
        let parallel = Divline { x: 0, y: fx(10), dx: fx(30), dy: 0 };
        assert_eq!(intercept_vector(&trace, &parallel), 0);
    }

    #[test]
    fn opening_through_two_sided_line() {
        let mut b = LevelBuilder::new();
        let low = b.sector(0, 128);
        let high = b.sector(24, 96);
        let l = b.two_sided(64, 0, 64, 64, low, high);
        let w = b.one_sided(0, 0, 0, 64, low);
        let ctx = PlayCtx::new(b.build(), PlayConfig::default());

        let o = ctx.line_opening(l);
        assert_eq!(o.top, fx(96));
        assert_eq!(o.bottom, fx(24));
        assert_eq!(o.lowfloor, 0);
        assert_eq!(o.range, fx(72));
        assert_eq!(ctx.line_opening(w).range, 0);
    }

    #[test]
    fn link_and_unlink_keep_chains_consistent() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 512, 0, 128), PlayConfig::default());
        let a = spawn(&mut ctx, 40, 40, 16, MobjFlags::SOLID);
        let b = spawn(&mut ctx, 60, 60, 16, MobjFlags::SOLID);
        let c = spawn(&mut ctx, 300, 300, 16, MobjFlags::SOLID);

        let bm = &ctx.level.blockmap;
        assert_eq!(bm.blocklinks[0], Some(b));
        assert_eq!(ctx.mobjs[b].bnext, Some(a));
        assert_eq!(ctx.mobjs[a].bprev, Some(b));
        assert_eq!(ctx.sector_things(0), vec![c, b, a]);

        // move b out of the cell
        ctx.unset_thing_position(b);
        ctx.mobjs[b].x = fx(200);
        ctx.set_thing_position(b);
        assert_eq!(ctx.level.blockmap.blocklinks[0], Some(a));
        assert_eq!(ctx.mobjs[a].bprev, None);
        let cell = ctx.level.blockmap.cell_index(1, 0).unwrap();
        assert_eq!(ctx.level.blockmap.blocklinks[cell], Some(b));
        assert_eq!(ctx.sector_things(0), vec![b, c, a]);
    }

    #[test]
    fn off_grid_actor_is_not_in_any_cell() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 256, 0, 128), PlayConfig::default());
        let id = spawn(&mut ctx, -500, 40, 16, MobjFlags::SOLID);
        assert!(ctx.level.blockmap.blocklinks.iter().all(|l| l.is_none()));
        assert_eq!(ctx.mobjs[id].bnext, None);
        // and unlinking it touches nothing
        ctx.unset_thing_position(id);
        assert!(ctx.level.blockmap.blocklinks.iter().all(|l| l.is_none()));
    }

    #[test]
    fn noblockmap_and_nosector_skip_links() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 256, 0, 128), PlayConfig::default());
        spawn(&mut ctx, 40, 40, 8, MobjFlags::NOBLOCKMAP | MobjFlags::NOSECTOR);
        assert!(ctx.level.blockmap.blocklinks.iter().all(|l| l.is_none()));
        assert!(ctx.sector_things(0).is_empty());
    }

    #[test]
    fn block_lines_visit_each_line_once_per_query() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 512, 0, 128), PlayConfig::default());
        let mut seen = Vec::new();
        ctx.next_validcount();
        for by in 0..ctx.level.blockmap.height {
            for bx in 0..ctx.level.blockmap.width {
                ctx.block_lines_iterator(bx, by, |_, ld| {
                    seen.push(ld);
                    Visit::Continue
                });
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);

        // a new query sees them again
        ctx.next_validcount();
        let mut again = 0;
        ctx.block_lines_iterator(0, 0, |_, _| {
            again += 1;
            Visit::Continue
        });
        assert_eq!(again, 2);
    }

    #[test]
    fn block_iterators_out_of_range_find_nothing() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 256, 0, 128), PlayConfig::default());
        assert!(ctx.block_lines_iterator(-1, 0, |_, _| Visit::Stop));
        assert!(ctx.block_things_iterator(0, 99, |_, _| Visit::Stop));
    }

    #[test]
    fn block_things_survives_removal_in_visitor() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 256, 0, 128), PlayConfig::default());
        let a = spawn(&mut ctx, 20, 20, 8, MobjFlags::SOLID);
        let b = spawn(&mut ctx, 40, 40, 8, MobjFlags::SOLID);
        let c = spawn(&mut ctx, 60, 60, 8, MobjFlags::SOLID);
        let mut visited = Vec::new();
        ctx.block_things_iterator(0, 0, |ctx, id| {
            visited.push(id);
            if id == b {
                ctx.remove_mobj(id);
            }
            Visit::Continue
        });
        assert_eq!(visited, vec![c, b, a]);
        assert!(!ctx.mobjs.contains(b));
        assert_eq!(ctx.mobjs[c].bnext, Some(a));
    }

    #[test]
    fn block_things_survives_visitor_removing_others() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 256, 0, 128), PlayConfig::default());
        let a = spawn(&mut ctx, 20, 20, 8, MobjFlags::SOLID);
        let b = spawn(&mut ctx, 40, 40, 8, MobjFlags::SOLID);
        let c = spawn(&mut ctx, 60, 60, 8, MobjFlags::SOLID);

        // removing only the next one relinks around it
        let mut visited = Vec::new();
        assert!(ctx.block_things_iterator(0, 0, |ctx, id| {
            visited.push(id);
            if id == c {
                ctx.remove_mobj(b);
            }
            Visit::Continue
        }));
        assert_eq!(visited, vec![c, a]);

        // removing itself and the next one ends the walk
        let d = spawn(&mut ctx, 80, 80, 8, MobjFlags::SOLID);
        let mut visited = Vec::new();
        assert!(ctx.block_things_iterator(0, 0, |ctx, id| {
            visited.push(id);
            if id == d {
                ctx.remove_mobj(d);
                ctx.remove_mobj(c);
            }
            Visit::Continue
        }));
        assert_eq!(visited, vec![d]);
        assert!(ctx.mobjs.contains(a));
    }

    #[test]
    fn trace_crosses_wall_at_half() {
        let mut ctx = wall_at_50();
        let mut fracs = Vec::new();
        let done = ctx.path_traverse(0, 0, fx(100), 0, PathFlags::ADD_LINES, |_, _, icpt| {
            fracs.push((icpt.frac, icpt.target));
            Visit::Continue
        });
        assert!(done);
        assert_eq!(fracs, vec![(FRACUNIT / 2, InterceptTarget::Line(4))]);
    }

    #[test]
    fn early_out_stops_on_solid_wall() {
        let mut ctx = wall_at_50();
        let mut called = false;
        let done = ctx.path_traverse(
            0,
            0,
            fx(100),
            0,
            PathFlags::ADD_LINES | PathFlags::EARLY_OUT,
            |_, _, _| {
                called = true;
                Visit::Continue
            },
        );
        assert!(!done);
        assert!(!called);
    }

    #[test]
    fn short_trace_uses_line_side_test() {
        let mut ctx = wall_at_50();
        let mut fracs = Vec::new();
        ctx.path_traverse(fx(45), fx(1), fx(55), fx(1), PathFlags::ADD_LINES, |_, _, icpt| {
            fracs.push(icpt.frac);
            Visit::Continue
        });
        assert_eq!(fracs, vec![FRACUNIT / 2]);
    }

    #[test]
    fn things_are_hit_in_distance_order() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(-64, -64, 512, 0, 128), PlayConfig::default());
        let far = spawn(&mut ctx, 200, 0, 16, MobjFlags::SHOOTABLE);
        let near = spawn(&mut ctx, 100, 0, 16, MobjFlags::SHOOTABLE);
        let behind = spawn(&mut ctx, -40, 0, 16, MobjFlags::SHOOTABLE);
        let off = spawn(&mut ctx, 150, 100, 16, MobjFlags::SHOOTABLE);

        let mut hits = Vec::new();
        ctx.path_traverse(0, 0, fx(300), 0, PathFlags::ADD_THINGS, |_, _, icpt| {
            if let InterceptTarget::Thing(t) = icpt.target {
                hits.push(t);
            }
            Visit::Continue
        });
        assert_eq!(hits, vec![near, far]);
        assert!(!hits.contains(&behind));
        assert!(!hits.contains(&off));
    }

    #[test]
    fn visitor_stop_ends_traversal() {
        let mut ctx = PlayCtx::new(LevelBuilder::open_room(-64, -64, 512, 0, 128), PlayConfig::default());
        spawn(&mut ctx, 100, 0, 16, MobjFlags::SHOOTABLE);
        spawn(&mut ctx, 200, 0, 16, MobjFlags::SHOOTABLE);
        let mut n = 0;
        let done = ctx.path_traverse(0, 0, fx(300), 0, PathFlags::ADD_THINGS, |_, _, _| {
            n += 1;
            Visit::Stop
        });
        assert!(!done);
        assert_eq!(n, 1);
    }

    #[test]
    fn ties_go_to_the_first_entry() {
        let mut ctx = wall_at_50();
        let mut buf = vec![
            Intercept { frac: 10, target: InterceptTarget::Line(2) },
            Intercept { frac: 5, target: InterceptTarget::Line(0) },
            Intercept { frac: 5, target: InterceptTarget::Line(1) },
            Intercept { frac: FRACUNIT + 1, target: InterceptTarget::Line(3) },
        ];
        let trace = Divline::default();
        let mut order = Vec::new();
        let done = traverse_intercepts(&mut ctx, &mut buf, &trace, |_, _, icpt| {
            order.push(icpt.target);
            Visit::Continue
        }, FRACUNIT);
        assert!(done);
        assert_eq!(
            order,
            vec![InterceptTarget::Line(0), InterceptTarget::Line(1), InterceptTarget::Line(2)]
        );
        // consumed entries are marked, the out of range one is left alone
        assert_eq!(buf[1].frac, i32::MAX);
        assert_eq!(buf[3].frac, FRACUNIT + 1);
    }

    /// 140 small walls across a 1000 unit trace.
    fn picket_fence(config: PlayConfig) -> PlayCtx {
        let mut b = LevelBuilder::new();
        let s = b.sector(0, 128);
        b.room(-64, -64, 1100, 64, s);
        for i in 0..140 {
            let x = 10 + i * 4;
            b.one_sided(x, -8, x, 8, s);
        }
        PlayCtx::new(b.build(), config)
    }

    #[test]
    fn intercepts_grow_without_emulation() {
        let mut ctx = picket_fence(PlayConfig::default());
        let mut n = 0;
        ctx.path_traverse(0, 0, fx(1000), 0, PathFlags::ADD_LINES, |_, _, _| {
            n += 1;
            Visit::Continue
        });
        assert_eq!(n, 140);
        assert_eq!(ctx.overrun, Default::default());
    }

    #[test]
    fn intercept_overflow_is_replayed_when_emulated() {
        let config = PlayConfig { intercepts: InterceptPolicy::LegacyEmulated, ..Default::default() };
        let mut ctx = picket_fence(config);
        let mut fracs = Vec::new();
        ctx.path_traverse(0, 0, fx(1000), 0, PathFlags::ADD_LINES, |_, _, icpt| {
            fracs.push(icpt.frac);
            Visit::Continue
        });
        // traversal itself is unaffected
        assert_eq!(fracs.len(), 140);
        assert_eq!(ctx.overrun.intercept_overruns, 140 - 129);

        // entry 130 is the wall at x = 530, the 131st fence post (line 4 + 130)
        let trace = Divline { x: 0, y: 0, dx: fx(1000), dy: 0 };
        let post = Divline { x: fx(530), y: fx(-8), dx: 0, dy: fx(16) };
        assert_eq!(ctx.overrun.lowfloor, Some(intercept_vector(&trace, &post)));
        assert_eq!(ctx.overrun.openbottom, Some(1));
        assert_eq!(ctx.overrun.opentop, Some(4 + 130));
    }

    #[test]
    fn nested_traversal_gets_its_own_buffer() {
        let mut ctx = wall_at_50();
        let mut inner = 0;
        let mut outer = 0;
        ctx.path_traverse(0, 0, fx(100), 0, PathFlags::ADD_LINES, |ctx, _, _| {
            outer += 1;
            ctx.path_traverse(0, fx(1), fx(100), fx(1), PathFlags::ADD_LINES, |_, _, _| {
                inner += 1;
                Visit::Continue
            });
            Visit::Continue
        });
        assert_eq!(outer, 1);
        assert_eq!(inner, 1);
    }

    proptest! {
        #[test]
        fn approx_distance_never_underestimates(dx in -30000i32..30000, dy in -30000i32..30000) {
            let est = approx_distance(fx(dx), fx(dy)) as f64 / FRACUNIT as f64;
            let real = ((dx as f64).powi(2) + (dy as f64).powi(2)).sqrt();
            prop_assert!(est + 1e-9 >= real);
            prop_assert_eq!(approx_distance(fx(dx), 0), fx(dx.abs()));
        }

        #[test]
        fn trace_fractions_never_decrease(
            ex in 0i32..900,
            ey in -300i32..300,
            things in proptest::collection::vec((0i32..900, -300i32..300), 0..12),
        ) {
            let mut b = LevelBuilder::new();
            let s = b.sector(0, 128);
            b.room(-100, -400, 1000, 400, s);
            for i in 0..10 {
                b.one_sided(80 * i, -200 + 30 * i, 80 * i + 40, 200 - 20 * i, s);
            }
            let mut ctx = PlayCtx::new(b.build(), PlayConfig::default());
            for &(x, y) in &things {
                spawn(&mut ctx, x, y, 20, MobjFlags::SHOOTABLE);
            }
            let mut fracs = Vec::new();
            ctx.path_traverse(fx(3), fx(5), fx(ex), fx(ey), PathFlags::ADD_LINES | PathFlags::ADD_THINGS, |_, _, icpt| {
                fracs.push(icpt.frac);
                Visit::Continue
            });
            prop_assert!(fracs.windows(2).all(|w| w[0] <= w[1]));
            prop_assert!(fracs.iter().all(|&f| (0..=FRACUNIT).contains(&f)));
        }

        #[test]
        fn relinking_keeps_every_actor_in_its_cell(
            moves in proptest::collection::vec((0usize..6, -50i32..600, -50i32..600), 1..40),
        ) {
            let mut ctx = PlayCtx::new(LevelBuilder::open_room(0, 0, 512, 0, 128), PlayConfig::default());
            let ids: Vec<MobjId> = (0..6).map(|i| spawn(&mut ctx, 30 + i * 70, 30 + i * 70, 16, MobjFlags::SOLID)).collect();
            for &(who, x, y) in &moves {
                let id = ids[who];
                ctx.unset_thing_position(id);
                ctx.mobjs[id].x = fx(x);
                ctx.mobjs[id].y = fx(y);
                ctx.set_thing_position(id);
            }

            // every on-grid actor appears exactly once, in the right cell
            let mut seen: Vec<MobjId> = Vec::new();
            for cell in 0..ctx.level.blockmap.num_cells() {
                let mut prev: Option<MobjId> = None;
                let mut it = ctx.level.blockmap.blocklinks[cell];
                while let Some(id) = it {
                    let m: &Mobj = &ctx.mobjs[id];
                    let bm = &ctx.level.blockmap;
                    prop_assert_eq!(bm.cell_index(bm.block_x(m.x), bm.block_y(m.y)), Some(cell));
                    prop_assert_eq!(m.bprev, prev);
                    seen.push(id);
                    prev = it;
                    it = m.bnext;
                }
            }
            for &id in &ids {
                let m = &ctx.mobjs[id];
                let bm = &ctx.level.blockmap;
                let on_grid = bm.cell_index(bm.block_x(m.x), bm.block_y(m.y)).is_some();
                prop_assert_eq!(seen.iter().filter(|&&s| s == id).count(), on_grid as usize);
            }
            // and the sector list holds all of them
            prop_assert_eq!(ctx.sector_things(0).len(), ids.len());
        }
    }
}
