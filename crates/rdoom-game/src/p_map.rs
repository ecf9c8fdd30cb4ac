// p_map.rs — movement, collision detection and sector height changes
//
// The per-check state the legacy engine kept in globals (tmthing, tmbbox,
// tmfloorz ...) lives in a call-scoped CheckState; the results callers read
// afterwards are published on PlayCtx.

use rdoom_common::tables::{finecosine, finesine, point_to_angle2, ANG180, ANGLETOFINESHIFT};

use crate::p_ctx::{GameRules, PlayCtx};
use crate::p_level::{LineFlags, SlopeType};
use crate::p_local::*;
use crate::p_maputl::{approx_distance, box_on_line_side, point_on_line_side};
use crate::p_mobj::{Mobj, MobjFlags, MobjId, SpawnZ};
use crate::p_overrun::SpechitClobber;

/// What a velocity move did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// No horizontal momentum.
    Idle,
    /// Moved, slid or came to a stop against something.
    Moved,
    /// A missile hit something. `sky` when it hit a sky ceiling, in which
    /// case it should vanish instead of exploding.
    Blocked { sky: bool },
}

struct CheckState {
    thing: MobjId,
    flags: MobjFlags,
    radius: Fixed,
    player: bool,
    x: Fixed,
    y: Fixed,
    bbox: BBox,
    floorz: Fixed,
    ceilingz: Fixed,
    dropoffz: Fixed,
    ceilingline: Option<usize>,
}

impl CheckState {
    fn new(ctx: &PlayCtx, thing: MobjId, x: Fixed, y: Fixed) -> Self {
        let m = &ctx.mobjs[thing];
        let sector = &ctx.level.sectors[ctx.level.sector_at(x, y)];
        let mut bbox = [0; 4];
        bbox[BOXTOP] = y + m.radius;
        bbox[BOXBOTTOM] = y - m.radius;
        bbox[BOXRIGHT] = x + m.radius;
        bbox[BOXLEFT] = x - m.radius;
        Self {
            thing,
            flags: m.flags,
            radius: m.radius,
            player: m.is_player(),
            x,
            y,
            bbox,
            floorz: sector.floorheight,
            ceilingz: sector.ceilingheight,
            dropoffz: sector.floorheight,
            ceilingline: None,
        }
    }

    /// Blockmap cell range of the box, widened by `pad`.
    fn cells(&self, ctx: &PlayCtx, pad: Fixed) -> (i32, i32, i32, i32) {
        let bm = &ctx.level.blockmap;
        (
            bm.block_x(self.bbox[BOXLEFT] - pad),
            bm.block_x(self.bbox[BOXRIGHT] + pad),
            bm.block_y(self.bbox[BOXBOTTOM] - pad),
            bm.block_y(self.bbox[BOXTOP] + pad),
        )
    }
}

#[inline]
fn touching(a: &Mobj, x: Fixed, y: Fixed, radius: Fixed) -> bool {
    let blockdist = a.radius + radius;
    (a.x - x).abs() < blockdist && (a.y - y).abs() < blockdist
}

// ============================================================
// Position checks
// ============================================================

fn pit_check_line(ctx: &mut PlayCtx, tm: &mut CheckState, ld: usize) -> Visit {
    let line = &ctx.level.lines[ld];
    if tm.bbox[BOXRIGHT] <= line.bbox[BOXLEFT]
        || tm.bbox[BOXLEFT] >= line.bbox[BOXRIGHT]
        || tm.bbox[BOXTOP] <= line.bbox[BOXBOTTOM]
        || tm.bbox[BOXBOTTOM] >= line.bbox[BOXTOP]
    {
        return Visit::Continue;
    }
    if box_on_line_side(&tm.bbox, line) != -1 {
        return Visit::Continue;
    }

    // The line touches the box. A one-sided line is a solid wall; a
    // two-sided one may still be too low or too high to pass.
    if line.backsector.is_none() {
        return Visit::Stop;
    }
    if !tm.flags.contains(MobjFlags::MISSILE) {
        if line.flags.contains(LineFlags::BLOCKING) {
            return Visit::Stop; // explicitly blocking everything
        }
        if !tm.player && line.flags.contains(LineFlags::BLOCKMONSTERS) {
            return Visit::Stop;
        }
    }
    let special = line.special != 0;

    let open = ctx.line_opening(ld);
    if open.top < tm.ceilingz {
        tm.ceilingz = open.top;
        tm.ceilingline = Some(ld);
    }
    if open.bottom > tm.floorz {
        tm.floorz = open.bottom;
    }
    if open.lowfloor < tm.dropoffz {
        tm.dropoffz = open.lowfloor;
    }

    // remember to check for crossing it once the move is committed
    if special {
        ctx.spechit.push(ld);
        if ctx.config.spechit_emulate {
            let clobber = ctx
                .overrun
                .record_spechit(ctx.spechit.len(), ld, ctx.config.spechit_magic);
            match clobber {
                Some(SpechitClobber::TmBbox(i, v)) => tm.bbox[i] = v,
                Some(c) => ctx.spechit_clobbers.push(c),
                None => {}
            }
        }
    }
    Visit::Continue
}

fn pit_check_thing(
    ctx: &mut PlayCtx,
    rules: &mut dyn GameRules,
    tm: &CheckState,
    other: MobjId,
) -> Visit {
    // an earlier touch may have removed the mover
    if !ctx.mobjs.contains(tm.thing) {
        return Visit::Stop;
    }
    let (oflags, touch) = {
        let o = &ctx.mobjs[other];
        (o.flags, touching(o, tm.x, tm.y, tm.radius))
    };
    if !oflags.intersects(MobjFlags::SOLID | MobjFlags::SPECIAL | MobjFlags::SHOOTABLE) {
        return Visit::Continue;
    }
    if !touch || other == tm.thing {
        return Visit::Continue;
    }

    // a charging skull slams into things
    if tm.flags.contains(MobjFlags::SKULLFLY) {
        let damage = rules.impact_damage(ctx, tm.thing);
        rules.damage_mobj(ctx, other, Some(tm.thing), Some(tm.thing), damage);
        if let Some(skull) = ctx.mobjs.get_mut(tm.thing) {
            skull.flags.remove(MobjFlags::SKULLFLY);
            skull.momx = 0;
            skull.momy = 0;
            skull.momz = 0;
            rules.skull_slam_finished(ctx, tm.thing);
        }
        return Visit::Stop;
    }

    // missiles can hit other things
    if tm.flags.contains(MobjFlags::MISSILE) {
        let (mz, mtop, originator) = {
            let m = &ctx.mobjs[tm.thing];
            (m.z, m.top(), m.target)
        };
        let (oz, otop, oplayer) = {
            let o = &ctx.mobjs[other];
            (o.z, o.top(), o.is_player())
        };
        if mz > otop {
            return Visit::Continue; // overhead
        }
        if mtop < oz {
            return Visit::Continue; // underneath
        }

        if let Some(src) = originator.filter(|&s| ctx.mobjs.contains(s)) {
            if rules.same_species(ctx, src, other) {
                // don't hit the shooter, and monsters don't hurt their kind
                if other == src {
                    return Visit::Continue;
                }
                if !oplayer {
                    return Visit::Stop; // explode, but do no damage
                }
            }
        }

        if !oflags.contains(MobjFlags::SHOOTABLE) {
            return Visit::continue_if(!oflags.contains(MobjFlags::SOLID));
        }

        let damage = rules.impact_damage(ctx, tm.thing);
        rules.damage_mobj(ctx, other, Some(tm.thing), originator, damage);
        return Visit::Stop;
    }

    // check for special pickup
    if oflags.contains(MobjFlags::SPECIAL) {
        let solid = oflags.contains(MobjFlags::SOLID);
        if tm.flags.contains(MobjFlags::PICKUP) {
            rules.touch_special_thing(ctx, other, tm.thing);
        }
        return Visit::continue_if(!solid);
    }

    Visit::continue_if(!oflags.contains(MobjFlags::SOLID))
}

fn pit_stomp_thing(
    ctx: &mut PlayCtx,
    rules: &mut dyn GameRules,
    tm: &CheckState,
    other: MobjId,
) -> Visit {
    if !ctx.mobjs.contains(tm.thing) {
        return Visit::Stop;
    }
    let (shootable, touch) = {
        let o = &ctx.mobjs[other];
        (o.flags.contains(MobjFlags::SHOOTABLE), touching(o, tm.x, tm.y, tm.radius))
    };
    if !shootable || !touch || other == tm.thing {
        return Visit::Continue;
    }

    // monsters don't stomp things except where the rules allow it
    if !tm.player && !rules.monsters_telefrag(ctx, tm.thing) {
        return Visit::Stop;
    }

    rules.damage_mobj(ctx, other, Some(tm.thing), Some(tm.thing), 10000);
    Visit::Continue
}

impl PlayCtx {
    fn publish(&mut self, tm: &CheckState) {
        self.tmfloorz = tm.floorz;
        self.tmceilingz = tm.ceilingz;
        self.tmdropoffz = tm.dropoffz;
        self.ceilingline = tm.ceilingline;
    }

    /// Whether `thing` could stand at (x, y), ignoring its z. Other actors
    /// are checked first, then lines. Touching a special item with PICKUP,
    /// a missile hit or a skull slam all happen here.
    ///
    /// Afterwards `tmfloorz`, `tmceilingz`, `tmdropoffz` and `ceilingline`
    /// describe the spot, and `spechit` lists the special lines touched.
    pub fn check_position(&mut self, rules: &mut dyn GameRules, thing: MobjId, x: Fixed, y: Fixed) -> bool {
        let mut tm = CheckState::new(self, thing, x, y);
        let fits = self.check_position_state(rules, &mut tm);
        self.publish(&tm);
        fits
    }

    fn check_position_state(&mut self, rules: &mut dyn GameRules, tm: &mut CheckState) -> bool {
        self.next_validcount();
        self.spechit.clear();
        self.spechit_clobbers.clear();

        if tm.flags.contains(MobjFlags::NOCLIP) {
            return true;
        }

        // Things are linked by their origin, so look MAXRADIUS further out
        // for any that could reach into the box.
        let (xl, xh, yl, yh) = tm.cells(self, MAXRADIUS);
        for bx in xl..=xh {
            for by in yl..=yh {
                if !self.block_things_iterator(bx, by, |ctx, other| pit_check_thing(ctx, rules, tm, other)) {
                    return false;
                }
            }
        }

        let (xl, xh, yl, yh) = tm.cells(self, 0);
        for bx in xl..=xh {
            for by in yl..=yh {
                if !self.block_lines_iterator(bx, by, |ctx, ld| pit_check_line(ctx, tm, ld)) {
                    return false;
                }
            }
        }
        true
    }

    /// Attempt to move to a new position, crossing special lines unless
    /// TELEPORT or NOCLIP is set. A failed move changes nothing.
    pub fn try_move(&mut self, rules: &mut dyn GameRules, thing: MobjId, x: Fixed, y: Fixed) -> bool {
        self.floatok = false;
        if !self.check_position(rules, thing, x, y) {
            return false; // solid wall or thing
        }

        // a touch or damage hook may have removed the mover
        let Some(m) = self.mobjs.get(thing) else { return false };
        let flags = m.flags;
        if !flags.contains(MobjFlags::NOCLIP) {
            if self.tmceilingz - self.tmfloorz < m.height {
                return false; // doesn't fit
            }
            self.floatok = true;

            if !flags.contains(MobjFlags::TELEPORT) && self.tmceilingz - m.z < m.height {
                return false; // mobj must lower itself to fit
            }
            if !flags.contains(MobjFlags::TELEPORT) && self.tmfloorz - m.z > STEPHEIGHT {
                return false; // too big a step up
            }
            if !flags.intersects(MobjFlags::DROPOFF | MobjFlags::FLOAT)
                && self.tmfloorz - self.tmdropoffz > STEPHEIGHT
            {
                return false; // don't stand over a dropoff
            }
        }

        // the move is ok, so link the thing into its new position
        self.unset_thing_position(thing);
        let (oldx, oldy) = {
            let m = &mut self.mobjs[thing];
            let old = (m.x, m.y);
            m.floorz = self.tmfloorz;
            m.ceilingz = self.tmceilingz;
            m.dropoffz = self.tmdropoffz;
            m.x = x;
            m.y = y;
            old
        };
        self.set_thing_position(thing);

        // if any special lines were hit, do the effect
        if !flags.intersects(MobjFlags::TELEPORT | MobjFlags::NOCLIP) {
            // a crossing may start another move that refills the list
            while let Some(ld) = self.spechit.pop() {
                // a crossing may also move or remove the thing
                let Some(m) = self.mobjs.get(thing) else { break };
                let line = &self.level.lines[ld];
                let side = point_on_line_side(m.x, m.y, line);
                let oldside = point_on_line_side(oldx, oldy, line);
                if side != oldside && line.special != 0 {
                    rules.cross_special_line(self, ld, oldside, thing);
                }
            }
        }
        true
    }

    /// Move to (x, y) regardless of what is there, killing anything
    /// shootable in the way. Non-players cannot telefrag unless the rules
    /// allow it.
    pub fn teleport_move(&mut self, rules: &mut dyn GameRules, thing: MobjId, x: Fixed, y: Fixed) -> bool {
        let tm = CheckState::new(self, thing, x, y);
        self.next_validcount();
        self.spechit.clear();

        // stomp on any things contacted
        let (xl, xh, yl, yh) = tm.cells(self, MAXRADIUS);
        let mut ok = true;
        'cells: for bx in xl..=xh {
            for by in yl..=yh {
                if !self.block_things_iterator(bx, by, |ctx, other| pit_stomp_thing(ctx, rules, &tm, other)) {
                    ok = false;
                    break 'cells;
                }
            }
        }
        self.publish(&tm);
        if !ok || !self.mobjs.contains(thing) {
            return false;
        }

        self.unset_thing_position(thing);
        {
            let m = &mut self.mobjs[thing];
            m.floorz = tm.floorz;
            m.ceilingz = tm.ceilingz;
            m.dropoffz = tm.dropoffz;
            m.x = x;
            m.y = y;
        }
        self.set_thing_position(thing);
        true
    }

    // ============================================================
    // Sliding
    // ============================================================

    /// A blocked move becomes a move up to the nearest wall and then a
    /// move along it. Falls back to trying the two axes separately.
    pub fn slide_move(&mut self, rules: &mut dyn GameRules, mo: MobjId) {
        let mut hitcount = 0;
        loop {
            hitcount += 1;
            if hitcount == MAX_SLIDE_ATTEMPTS {
                self.stairstep(rules, mo);
                return;
            }

            let Some(m) = self.mobjs.get(mo) else { return };
            let (x, y, radius, momx, momy) = (m.x, m.y, m.radius, m.momx, m.momy);

            // trace along the three leading corners
            let (leadx, trailx) = if momx > 0 { (x + radius, x - radius) } else { (x - radius, x + radius) };
            let (leady, traily) = if momy > 0 { (y + radius, y - radius) } else { (y - radius, y + radius) };

            let mut slide = SlideState::new(m);
            for (sx, sy) in [(leadx, leady), (trailx, leady), (leadx, traily)] {
                self.path_traverse(sx, sy, sx + momx, sy + momy, PathFlags::ADD_LINES, |ctx, _, icpt| {
                    slide.traverse(ctx, icpt)
                });
            }

            // move up to the wall
            if slide.bestslidefrac == FRACUNIT + 1 {
                // the move must have hit the middle, so stairstep
                self.stairstep(rules, mo);
                return;
            }

            // fudge a bit to make sure it doesn't hit
            let mut frac = slide.bestslidefrac - 0x800;
            if frac > 0 {
                let newx = fixed_mul(momx, frac);
                let newy = fixed_mul(momy, frac);
                if !self.try_move(rules, mo, x + newx, y + newy) {
                    self.stairstep(rules, mo);
                    return;
                }
            }

            // now continue along the wall, with what is left of the move
            frac = FRACUNIT - (frac + 0x800);
            if frac > FRACUNIT {
                frac = FRACUNIT;
            }
            if frac <= 0 {
                return;
            }

            let Some(bestline) = slide.bestslideline else { return };
            // the partial move may have removed the mover
            let Some(m) = self.mobjs.get(mo) else { return };
            let (mx, my) = hit_slide_line(self, m.x, m.y, bestline, fixed_mul(momx, frac), fixed_mul(momy, frac));
            let (nx, ny) = {
                let Some(m) = self.mobjs.get_mut(mo) else { return };
                m.momx = mx;
                m.momy = my;
                (m.x + mx, m.y + my)
            };
            if self.try_move(rules, mo, nx, ny) {
                return;
            }
        }
    }

    /// Y first, then X.
    fn stairstep(&mut self, rules: &mut dyn GameRules, mo: MobjId) {
        let Some(m) = self.mobjs.get(mo) else { return };
        let (x, y, momx, momy) = (m.x, m.y, m.momx, m.momy);
        if !self.try_move(rules, mo, x, y + momy) {
            self.try_move(rules, mo, x + momx, y);
        }
    }

    // ============================================================
    // Velocity moves
    // ============================================================

    /// Apply one tic of horizontal momentum. Large moves are split in half
    /// steps so nothing skips through a thin wall.
    ///
    /// A missile stopped by a wall explodes, and the remaining half steps
    /// are still tried. A missile stopped under a sky ceiling returns at
    /// once so the caller can remove it.
    pub fn xy_movement(&mut self, rules: &mut dyn GameRules, mo: MobjId) -> MoveOutcome {
        {
            let Some(m) = self.mobjs.get_mut(mo) else { return MoveOutcome::Idle };
            if m.momx == 0 && m.momy == 0 {
                if m.flags.contains(MobjFlags::SKULLFLY) {
                    // the skull slammed into something
                    m.flags.remove(MobjFlags::SKULLFLY);
                    m.momz = 0;
                    rules.skull_slam_finished(self, mo);
                }
                return MoveOutcome::Idle;
            }
            m.momx = m.momx.clamp(-MAXMOVE, MAXMOVE);
            m.momy = m.momy.clamp(-MAXMOVE, MAXMOVE);
        }

        let (mut xmove, mut ymove) = {
            let m = &self.mobjs[mo];
            (m.momx, m.momy)
        };
        let mut exploded = false;
        loop {
            // any hook in the last step may have removed the mover
            let Some(m) = self.mobjs.get(mo) else { break };
            let (x, y) = (m.x, m.y);
            let (ptryx, ptryy) = if xmove > MAXMOVE / 2 || ymove > MAXMOVE / 2 {
                let p = (x + xmove / 2, y + ymove / 2);
                xmove >>= 1;
                ymove >>= 1;
                p
            } else {
                let p = (x + xmove, y + ymove);
                xmove = 0;
                ymove = 0;
                p
            };

            if !self.try_move(rules, mo, ptryx, ptryy) {
                // blocked move
                let Some(m) = self.mobjs.get(mo) else { break };
                if m.is_player() || m.flags.contains(MobjFlags::SLIDE) {
                    self.slide_move(rules, mo);
                } else if m.flags.contains(MobjFlags::MISSILE) {
                    // missiles vanish into sky ceilings instead of exploding
                    let skyflat = self.level.skyflatnum;
                    let sky = self
                        .ceilingline
                        .and_then(|ld| self.level.lines[ld].backsector)
                        .is_some_and(|back| self.level.sectors[back].ceilingpic == skyflat);
                    if sky {
                        return MoveOutcome::Blocked { sky };
                    }
                    rules.explode_missile(self, mo);
                    exploded = true;
                } else if let Some(m) = self.mobjs.get_mut(mo) {
                    m.momx = 0;
                    m.momy = 0;
                }
            }

            if xmove == 0 && ymove == 0 {
                break;
            }
        }
        if exploded {
            MoveOutcome::Blocked { sky: false }
        } else {
            MoveOutcome::Moved
        }
    }

    // ============================================================
    // Sector height changes
    // ============================================================

    /// Re-fit an actor after the floor or ceiling around it moved. Keeps
    /// it on the floor if it was standing there. Returns false if it no
    /// longer fits.
    pub fn thing_height_clip(&mut self, rules: &mut dyn GameRules, thing: MobjId) -> bool {
        let (x, y, onfloor) = {
            let m = &self.mobjs[thing];
            (m.x, m.y, m.z == m.floorz)
        };
        self.check_position(rules, thing, x, y);

        // the actor may have been removed by a hook during the check
        let (floorz, ceilingz, dropoffz) = (self.tmfloorz, self.tmceilingz, self.tmdropoffz);
        let Some(m) = self.mobjs.get_mut(thing) else { return true };
        m.floorz = floorz;
        m.ceilingz = ceilingz;
        m.dropoffz = dropoffz;

        if onfloor {
            // walking monsters rise and fall with the floor
            m.z = m.floorz;
        } else if m.z + m.height > m.ceilingz {
            // don't adjust a floating monster unless forced to
            m.z = m.ceilingz - m.height;
        }
        m.ceilingz - m.floorz >= m.height
    }

    /// Re-check every actor that could touch `sector` after its floor or
    /// ceiling moved. Corpses are crushed to gibs, dropped items removed,
    /// and with `crunch` living things take 10 damage every fourth tic.
    /// Returns true if something did not fit.
    pub fn change_sector(&mut self, rules: &mut dyn GameRules, sector: usize, crunch: bool, leveltime: u32) -> bool {
        let mut state = ChangeState { crunch, nofit: false, leveltime };
        let bb = self.level.sectors[sector].blockbox;

        for x in bb[BOXLEFT]..=bb[BOXRIGHT] {
            for y in bb[BOXBOTTOM]..=bb[BOXTOP] {
                self.block_things_iterator(x, y, |ctx, thing| ctx.pit_change_sector(rules, &mut state, thing));
            }
        }
        state.nofit
    }

    fn pit_change_sector(&mut self, rules: &mut dyn GameRules, state: &mut ChangeState, thing: MobjId) -> Visit {
        let fits = self.thing_height_clip(rules, thing);
        if self.config.spechit_emulate {
            for c in std::mem::take(&mut self.spechit_clobbers) {
                match c {
                    SpechitClobber::CrushChange(v) => state.crunch = v != 0,
                    SpechitClobber::NoFit(v) => state.nofit = v != 0,
                    SpechitClobber::TmBbox(..) => {}
                }
            }
        }
        if fits {
            return Visit::Continue;
        }
        let Some(m) = self.mobjs.get_mut(thing) else { return Visit::Continue };

        // crunch bodies to giblets
        if m.health <= 0 {
            m.flags.remove(MobjFlags::SOLID);
            m.height = 0;
            m.radius = 0;
            rules.crush_gibs(self, thing);
            return Visit::Continue;
        }

        // crunch dropped items
        if m.flags.contains(MobjFlags::DROPPED) {
            rules.remove_mobj(self, thing);
            return Visit::Continue;
        }

        if !m.flags.contains(MobjFlags::SHOOTABLE) {
            return Visit::Continue; // assume it is bloody gibs or something
        }

        state.nofit = true;
        if state.crunch && state.leveltime & 3 == 0 {
            rules.damage_mobj(self, thing, None, None, 10);
            // a kill may have removed it
            if self.mobjs.contains(thing) {
                rules.crush_blood(self, thing);
            }
        }
        Visit::Continue
    }

    // ============================================================
    // Spawning
    // ============================================================

    /// Add an actor to the level at its x/y, linked and resting on the
    /// floor or ceiling (or at an explicit z).
    pub fn spawn_mobj(&mut self, mobj: Mobj, spawnz: SpawnZ) -> MobjId {
        let id = self.mobjs.insert(mobj);
        self.set_thing_position(id);

        let sec = self.level.subsector_sector(self.mobjs[id].subsector);
        let (floor, ceiling) = {
            let s = &self.level.sectors[sec];
            (s.floorheight, s.ceilingheight)
        };
        let m = &mut self.mobjs[id];
        m.floorz = floor;
        m.ceilingz = ceiling;
        m.dropoffz = floor;
        m.z = match spawnz {
            SpawnZ::Auto if m.flags.contains(MobjFlags::SPAWNCEILING) => ceiling - m.height,
            SpawnZ::Auto | SpawnZ::OnFloor => floor,
            SpawnZ::OnCeiling => ceiling - m.height,
            SpawnZ::At(z) => z,
        };
        id
    }
}

struct ChangeState {
    crunch: bool,
    nofit: bool,
    leveltime: u32,
}

struct SlideState {
    x: Fixed,
    y: Fixed,
    z: Fixed,
    height: Fixed,
    bestslidefrac: Fixed,
    bestslideline: Option<usize>,
}

impl SlideState {
    fn new(mo: &Mobj) -> Self {
        Self {
            x: mo.x,
            y: mo.y,
            z: mo.z,
            height: mo.height,
            bestslidefrac: FRACUNIT + 1,
            bestslideline: None,
        }
    }

    fn traverse(&mut self, ctx: &mut PlayCtx, icpt: &Intercept) -> Visit {
        let InterceptTarget::Line(ld) = icpt.target else {
            return Visit::Continue;
        };
        let line = &ctx.level.lines[ld];

        let blocking = if !line.flags.contains(LineFlags::TWOSIDED) {
            if point_on_line_side(self.x, self.y, line) != 0 {
                return Visit::Continue; // don't hit the back side
            }
            true
        } else {
            let open = ctx.line_opening(ld);
            open.range < self.height // doesn't fit
                || open.top - self.z < self.height // mobj is too high
                || open.bottom - self.z > STEPHEIGHT // too big a step up
        };
        if !blocking {
            return Visit::Continue; // this line doesn't block movement
        }

        // the line does block movement, see if it is closer than best so far
        if icpt.frac < self.bestslidefrac {
            self.bestslidefrac = icpt.frac;
            self.bestslideline = Some(ld);
        }
        Visit::Stop
    }
}

/// Clip a move against a wall so that only the part along the wall is
/// left. Returns the new (xmove, ymove).
pub(crate) fn hit_slide_line(
    ctx: &PlayCtx,
    x: Fixed,
    y: Fixed,
    ld: usize,
    tmxmove: Fixed,
    tmymove: Fixed,
) -> (Fixed, Fixed) {
    let line = &ctx.level.lines[ld];
    match line.slopetype {
        SlopeType::Horizontal => return (tmxmove, 0),
        SlopeType::Vertical => return (0, tmymove),
        _ => {}
    }

    let side = point_on_line_side(x, y, line);
    let mut lineangle = point_to_angle2(0, 0, line.dx, line.dy);
    if side == 1 {
        lineangle = lineangle.wrapping_add(ANG180);
    }
    let moveangle = point_to_angle2(0, 0, tmxmove, tmymove);
    let mut deltaangle = moveangle.wrapping_sub(lineangle);
    if deltaangle > ANG180 {
        deltaangle = deltaangle.wrapping_add(ANG180);
    }

    let lineangle = (lineangle >> ANGLETOFINESHIFT) as usize;
    let deltaangle = (deltaangle >> ANGLETOFINESHIFT) as usize;

    let movelen = approx_distance(tmxmove, tmymove);
    let newlen = fixed_mul(movelen, finecosine(deltaangle));
    (
        fixed_mul(newlen, finecosine(lineangle)),
        fixed_mul(newlen, finesine(lineangle)),
    )
}
