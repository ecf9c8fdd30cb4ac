// p_hitscan.rs — aiming, gunfire, use presses and explosions
//
// All four walk the blockmap with path_traverse or the block iterators. The
// shooter state the legacy engine kept in globals lives in call-scoped structs.

use rayon::prelude::*;
use rdoom_common::tables::{finecosine, finesine, fine_index};

use crate::p_ctx::{GameRules, PlayCtx};
use crate::p_level::LineFlags;
use crate::p_local::*;
use crate::p_maputl::point_on_line_side;
use crate::p_mobj::{MobjFlags, MobjId};

/// Below this many candidates a radius attack measures distances inline.
const PARALLEL_RADIUS_THRESHOLD: usize = 64;

/// Initial vertical aiming window, +-100/160.
const AIM_TOPSLOPE: Fixed = 100 * FRACUNIT / 160;
const AIM_BOTTOMSLOPE: Fixed = -100 * FRACUNIT / 160;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AimResult {
    pub slope: Fixed,
    pub target: Option<MobjId>,
}

/// Where a shot ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Impact {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub target: Option<MobjId>,
    pub line: Option<usize>,
}

struct Shot {
    shooter: MobjId,
    shootz: Fixed,
    attackrange: Fixed,
}

impl Shot {
    /// Sets up a shot from the shooter's eye line, returning the end point.
    fn new(ctx: &PlayCtx, shooter: MobjId, angle: Angle, distance: Fixed) -> (Self, Fixed, Fixed) {
        let t1 = &ctx.mobjs[shooter];
        let fine = fine_index(angle);
        let x2 = t1.x.wrapping_add((distance >> FRACBITS).wrapping_mul(finecosine(fine)));
        let y2 = t1.y.wrapping_add((distance >> FRACBITS).wrapping_mul(finesine(fine)));
        let shot = Shot {
            shooter,
            shootz: t1.z + (t1.height >> 1) + 8 * FRACUNIT,
            attackrange: distance,
        };
        (shot, x2, y2)
    }

    fn dist(&self, frac: Fixed) -> Fixed {
        fixed_mul(self.attackrange, frac)
    }
}

struct Aim {
    shot: Shot,
    topslope: Fixed,
    bottomslope: Fixed,
    aimslope: Fixed,
    linetarget: Option<MobjId>,
}

impl Aim {
    fn traverse(&mut self, ctx: &mut PlayCtx, icpt: &Intercept) -> Visit {
        let th = match icpt.target {
            InterceptTarget::Line(ld) => return self.cross_line(ctx, ld, icpt.frac),
            InterceptTarget::Thing(th) => th,
        };

        if th == self.shot.shooter {
            return Visit::Continue; // can't shoot self
        }
        let Some(t) = ctx.mobjs.get(th) else { return Visit::Continue };
        if !t.flags.contains(MobjFlags::SHOOTABLE) {
            return Visit::Continue; // corpse or something
        }

        // check angles to see if the thing can be aimed at
        let dist = self.shot.dist(icpt.frac);
        let mut thingtopslope = fixed_div(t.top() - self.shot.shootz, dist);
        if thingtopslope < self.bottomslope {
            return Visit::Continue; // shot over the thing
        }
        let mut thingbottomslope = fixed_div(t.z - self.shot.shootz, dist);
        if thingbottomslope > self.topslope {
            return Visit::Continue; // shot under the thing
        }

        // this thing can be hit
        thingtopslope = thingtopslope.min(self.topslope);
        thingbottomslope = thingbottomslope.max(self.bottomslope);
        self.aimslope = (thingtopslope + thingbottomslope) / 2;
        self.linetarget = Some(th);
        Visit::Stop
    }

    /// A two-sided line narrows the window where its floor or ceiling steps.
    fn cross_line(&mut self, ctx: &PlayCtx, ld: usize, frac: Fixed) -> Visit {
        let line = &ctx.level.lines[ld];
        if !line.flags.contains(LineFlags::TWOSIDED) {
            return Visit::Stop;
        }
        let open = ctx.line_opening(ld);
        if open.bottom >= open.top {
            return Visit::Stop;
        }
        let Some(back) = line.backsector else { return Visit::Stop };
        let front = &ctx.level.sectors[line.frontsector];
        let back = &ctx.level.sectors[back];

        let dist = self.shot.dist(frac);
        if front.floorheight != back.floorheight {
            let slope = fixed_div(open.bottom - self.shot.shootz, dist);
            if slope > self.bottomslope {
                self.bottomslope = slope;
            }
        }
        if front.ceilingheight != back.ceilingheight {
            let slope = fixed_div(open.top - self.shot.shootz, dist);
            if slope < self.topslope {
                self.topslope = slope;
            }
        }
        Visit::continue_if(self.topslope > self.bottomslope)
    }
}

struct Fire<'r> {
    shot: Shot,
    aimslope: Fixed,
    damage: i32,
    rules: &'r mut dyn GameRules,
    impact: Option<Impact>,
}

impl Fire<'_> {
    fn probe(&self) -> bool {
        self.damage == LASER_PROBE_DAMAGE
    }

    /// The point `back` units short of `frac` along the trace.
    fn point(&self, trace: &Divline, frac: Fixed, back: Fixed) -> (Fixed, Fixed, Fixed) {
        let frac = frac - fixed_div(back, self.shot.attackrange);
        (
            trace.x + fixed_mul(trace.dx, frac),
            trace.y + fixed_mul(trace.dy, frac),
            self.shot.shootz + fixed_mul(self.aimslope, fixed_mul(frac, self.shot.attackrange)),
        )
    }

    fn traverse(&mut self, ctx: &mut PlayCtx, trace: &Divline, icpt: &Intercept) -> Visit {
        match icpt.target {
            InterceptTarget::Line(ld) => self.shoot_line(ctx, trace, ld, icpt.frac),
            InterceptTarget::Thing(th) => self.shoot_thing(ctx, trace, th, icpt.frac),
        }
    }

    fn shoot_line(&mut self, ctx: &mut PlayCtx, trace: &Divline, ld: usize, frac: Fixed) -> Visit {
        if ctx.level.lines[ld].special != 0 && !self.probe() {
            self.rules.shoot_special_line(ctx, self.shot.shooter, ld);
        }

        let line = &ctx.level.lines[ld];
        if line.flags.contains(LineFlags::TWOSIDED) {
            // crosses a two sided line
            let open = ctx.line_opening(ld);
            let dist = self.shot.dist(frac);
            let front = &ctx.level.sectors[line.frontsector];
            let back = line.backsector.map(|b| &ctx.level.sectors[b]);

            let floor_step = back.map_or(true, |b| b.floorheight != front.floorheight);
            let ceiling_step = back.map_or(true, |b| b.ceilingheight != front.ceilingheight);
            let under = floor_step && fixed_div(open.bottom - self.shot.shootz, dist) > self.aimslope;
            let over = ceiling_step && fixed_div(open.top - self.shot.shootz, dist) < self.aimslope;
            if !under && !over {
                return Visit::Continue; // shot continues
            }
        }

        // hit line, position a bit closer
        let (x, y, z) = self.point(trace, frac, 4 * FRACUNIT);

        let front = &ctx.level.sectors[line.frontsector];
        if front.ceilingpic == ctx.level.skyflatnum {
            // don't shoot the sky
            if z > front.ceilingheight {
                return Visit::Stop;
            }
            // it's a sky hack wall
            let back_sky = line
                .backsector
                .is_some_and(|b| ctx.level.sectors[b].ceilingpic == ctx.level.skyflatnum);
            if back_sky {
                return Visit::Stop;
            }
        }

        let z = clamp_to_sector(ctx, x, y, z);
        if !self.probe() {
            self.rules.spawn_puff(ctx, x, y, z);
        }
        self.impact = Some(Impact { x, y, z, target: None, line: Some(ld) });
        Visit::Stop
    }

    fn shoot_thing(&mut self, ctx: &mut PlayCtx, trace: &Divline, th: MobjId, frac: Fixed) -> Visit {
        if th == self.shot.shooter {
            return Visit::Continue; // can't shoot self
        }
        let Some(t) = ctx.mobjs.get(th) else { return Visit::Continue };
        if !t.flags.contains(MobjFlags::SHOOTABLE) {
            return Visit::Continue; // corpse or something
        }

        // check angles to see if the thing can be aimed at
        let dist = self.shot.dist(frac);
        if fixed_div(t.top() - self.shot.shootz, dist) < self.aimslope {
            return Visit::Continue; // shot over the thing
        }
        if fixed_div(t.z - self.shot.shootz, dist) > self.aimslope {
            return Visit::Continue; // shot under the thing
        }
        let noblood = t.flags.contains(MobjFlags::NOBLOOD);

        // hit thing, position a bit closer
        let (x, y, z) = self.point(trace, frac, 10 * FRACUNIT);
        let z = clamp_to_sector(ctx, x, y, z);
        self.impact = Some(Impact { x, y, z, target: Some(th), line: None });
        if self.probe() {
            return Visit::Stop;
        }

        if noblood {
            self.rules.spawn_puff(ctx, x, y, z);
        } else {
            self.rules.spawn_blood(ctx, x, y, z, self.damage);
        }
        if self.damage != 0 {
            let shooter = Some(self.shot.shooter);
            self.rules.damage_mobj(ctx, th, shooter, shooter, self.damage);
        }
        Visit::Stop
    }
}

/// Keep an impact height inside the sector it landed in.
fn clamp_to_sector(ctx: &PlayCtx, x: Fixed, y: Fixed, z: Fixed) -> Fixed {
    let sector = &ctx.level.sectors[ctx.level.sector_at(x, y)];
    if z > sector.ceilingheight {
        sector.ceilingheight
    } else if z < sector.floorheight {
        sector.floorheight
    } else {
        z
    }
}

impl PlayCtx {
    /// Find the first shootable actor along `angle` inside the vertical
    /// aiming window, and the slope to the middle of what is visible of it.
    /// A slope of 0 and no target when nothing is in view.
    pub fn aim_line_attack(&mut self, shooter: MobjId, angle: Angle, distance: Fixed) -> AimResult {
        let (x1, y1) = (self.mobjs[shooter].x, self.mobjs[shooter].y);
        let (shot, x2, y2) = Shot::new(self, shooter, angle, distance);
        let mut aim = Aim {
            shot,
            topslope: AIM_TOPSLOPE,
            bottomslope: AIM_BOTTOMSLOPE,
            aimslope: 0,
            linetarget: None,
        };

        self.path_traverse(x1, y1, x2, y2, PathFlags::ADD_LINES | PathFlags::ADD_THINGS, |ctx, _, icpt| {
            aim.traverse(ctx, icpt)
        });

        match aim.linetarget {
            Some(target) => AimResult { slope: aim.aimslope, target: Some(target) },
            None => AimResult::default(),
        }
    }

    /// Fire a hit-scan shot along `angle` and `slope`. Returns where it hit
    /// a wall or an actor, or None if it went into the sky or ran out of
    /// range. With `LASER_PROBE_DAMAGE` the shot only finds the impact.
    pub fn line_attack(
        &mut self,
        rules: &mut dyn GameRules,
        shooter: MobjId,
        angle: Angle,
        distance: Fixed,
        slope: Fixed,
        damage: i32,
    ) -> Option<Impact> {
        let (x1, y1) = (self.mobjs[shooter].x, self.mobjs[shooter].y);
        let (shot, x2, y2) = Shot::new(self, shooter, angle, distance);
        let mut fire = Fire { shot, aimslope: slope, damage, rules, impact: None };

        self.path_traverse(x1, y1, x2, y2, PathFlags::ADD_LINES | PathFlags::ADD_THINGS, |ctx, trace, icpt| {
            fire.traverse(ctx, trace, icpt)
        });
        fire.impact
    }

    /// Try to activate the first special line within USERANGE in front of
    /// `user`.
    pub fn use_lines(&mut self, rules: &mut dyn GameRules, user: MobjId) {
        let (x1, y1, fine) = {
            let m = &self.mobjs[user];
            (m.x, m.y, fine_index(m.angle))
        };
        let x2 = x1 + (USERANGE >> FRACBITS) * finecosine(fine);
        let y2 = y1 + (USERANGE >> FRACBITS) * finesine(fine);

        self.path_traverse(x1, y1, x2, y2, PathFlags::ADD_LINES, |ctx, _, icpt| {
            let InterceptTarget::Line(ld) = icpt.target else {
                return Visit::Continue;
            };
            if ctx.level.lines[ld].special == 0 {
                if ctx.line_opening(ld).range <= 0 {
                    // can't use through a wall
                    rules.use_blocked(ctx, user);
                    return Visit::Stop;
                }
                // not a special line, but keep checking
                return Visit::Continue;
            }

            let (ux, uy) = (ctx.mobjs[user].x, ctx.mobjs[user].y);
            let side = point_on_line_side(ux, uy, &ctx.level.lines[ld]);
            rules.use_special_line(ctx, user, ld, side);

            // can't use more than one special line in a row
            Visit::Stop
        });
    }

    /// Damage every shootable actor within `damage` units of `spot` that it
    /// can see. Damage falls off by one per unit of distance past the
    /// target's radius.
    pub fn radius_attack(&mut self, rules: &mut dyn GameRules, spot: MobjId, source: Option<MobjId>, damage: i32) {
        let Some(bomb) = self.mobjs.get(spot) else { return };
        let (bx, by) = (bomb.x, bomb.y);

        let dist = (damage + (MAXRADIUS >> FRACBITS)) << FRACBITS;
        let bm = &self.level.blockmap;
        let (xl, xh) = (bm.block_x(bx - dist), bm.block_x(bx + dist));
        let (yl, yh) = (bm.block_y(by - dist), bm.block_y(by + dist));

        let mut candidates = Vec::new();
        for y in yl..=yh {
            for x in xl..=xh {
                self.block_things_iterator(x, y, |ctx, thing| {
                    if ctx.mobjs[thing].flags.contains(MobjFlags::SHOOTABLE) && !rules.radius_immune(ctx, thing) {
                        candidates.push(thing);
                    }
                    Visit::Continue
                });
            }
        }

        let mobjs = &self.mobjs;
        let measure = |&thing: &MobjId| {
            let t = &mobjs[thing];
            let dist = (t.x - bx).abs().max((t.y - by).abs());
            (thing, ((dist - t.radius) >> FRACBITS).max(0))
        };
        let measured: Vec<(MobjId, i32)> = if candidates.len() >= PARALLEL_RADIUS_THRESHOLD {
            candidates.par_iter().map(measure).collect()
        } else {
            candidates.iter().map(measure).collect()
        };

        for (thing, dist) in measured {
            if dist >= damage {
                continue; // out of range
            }
            // an earlier hit may have removed it
            if !self.mobjs.contains(thing) {
                continue;
            }
            if rules.check_sight(self, thing, spot) {
                // must be in direct path
                rules.damage_mobj(self, thing, Some(spot), source, damage - dist);
            }
        }
    }
}
