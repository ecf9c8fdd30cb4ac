// test_level.rs — hand-built levels and a recording GameRules for tests

use crate::p_ctx::{GameRules, PlayConfig, PlayCtx};
use crate::p_level::{
    Level, LevelData, LineFlags, MapLine, MapSector, MapSide, Node, NodeChild, Subsector, Vertex,
};
use crate::p_local::*;
use crate::p_mobj::{Mobj, MobjFlags, MobjId, SpawnZ};

pub(crate) const fn fx(n: i32) -> Fixed {
    n << FRACBITS
}

pub(crate) struct LevelBuilder {
    pub data: LevelData,
}

impl LevelBuilder {
    /// No sky unless a test sets `skyflatnum`.
    pub fn new() -> Self {
        Self {
            data: LevelData {
                skyflatnum: -1,
                ..Default::default()
            },
        }
    }

    pub fn sector(&mut self, floor: i32, ceiling: i32) -> usize {
        self.data.sectors.push(MapSector {
            floorheight: fx(floor),
            ceilingheight: fx(ceiling),
            ..Default::default()
        });
        self.data.sectors.len() - 1
    }

    fn vertex(&mut self, x: i32, y: i32) -> usize {
        self.data.vertexes.push(Vertex { x: fx(x), y: fx(y) });
        self.data.vertexes.len() - 1
    }

    fn side(&mut self, sector: usize) -> usize {
        self.data.sides.push(MapSide { sector });
        self.data.sides.len() - 1
    }

    /// A wall with `sector` on its right.
    pub fn one_sided(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, sector: usize) -> usize {
        let v1 = self.vertex(x1, y1);
        let v2 = self.vertex(x2, y2);
        let front = self.side(sector);
        self.data.lines.push(MapLine {
            v1,
            v2,
            flags: LineFlags::BLOCKING,
            sidenum: [Some(front), None],
            ..Default::default()
        });
        self.data.lines.len() - 1
    }

    pub fn two_sided(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        front: usize,
        back: usize,
    ) -> usize {
        let v1 = self.vertex(x1, y1);
        let v2 = self.vertex(x2, y2);
        let fs = self.side(front);
        let bs = self.side(back);
        self.data.lines.push(MapLine {
            v1,
            v2,
            flags: LineFlags::TWOSIDED,
            sidenum: [Some(fs), Some(bs)],
            ..Default::default()
        });
        self.data.lines.len() - 1
    }

    pub fn special(&mut self, line: usize, special: i32) {
        self.data.lines[line].special = special;
    }

    /// Four walls facing inward.
    pub fn room(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, sector: usize) {
        self.one_sided(x0, y0, x0, y1, sector);
        self.one_sided(x0, y1, x1, y1, sector);
        self.one_sided(x1, y1, x1, y0, sector);
        self.one_sided(x1, y0, x0, y0, sector);
    }

    pub fn subsector(&mut self, sector: usize) -> usize {
        self.data.subsectors.push(Subsector { sector });
        self.data.subsectors.len() - 1
    }

    pub fn node(&mut self, x: i32, y: i32, dx: i32, dy: i32, front: NodeChild, back: NodeChild) -> usize {
        self.data.nodes.push(Node {
            x: fx(x),
            y: fx(y),
            dx: fx(dx),
            dy: fx(dy),
            children: [front, back],
        });
        self.data.nodes.len() - 1
    }

    /// Load with a built blockmap. Without explicit leaves the whole level
    /// is one subsector of sector 0.
    pub fn build(mut self) -> Level {
        if self.data.subsectors.is_empty() {
            self.data.subsectors.push(Subsector { sector: 0 });
        }
        match Level::load(self.data, true, false) {
            Ok(level) => level,
            Err(e) => panic!("test level failed to load: {}", e),
        }
    }

    /// A square room of one sector, `size` units on a side.
    pub fn open_room(x: i32, y: i32, size: i32, floor: i32, ceiling: i32) -> Level {
        let mut b = LevelBuilder::new();
        let s = b.sector(floor, ceiling);
        b.room(x, y, x + size, y + size, s);
        b.build()
    }
}

pub(crate) fn ctx_for(level: Level) -> PlayCtx {
    PlayCtx::new(level, PlayConfig::default())
}

/// Spawn a 56 unit tall actor on the floor.
pub(crate) fn spawn(ctx: &mut PlayCtx, x: i32, y: i32, radius: i32, flags: MobjFlags) -> MobjId {
    let mobj = Mobj::new(fx(x), fx(y), fx(radius), fx(56), flags);
    ctx.spawn_mobj(mobj, SpawnZ::OnFloor)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Cross { line: usize, side: usize, thing: MobjId },
    Shoot { line: usize, thing: MobjId },
    Use { line: usize, side: usize, thing: MobjId },
    UseBlocked(MobjId),
    Touch { special: MobjId, toucher: MobjId },
    Damage { target: MobjId, inflictor: Option<MobjId>, source: Option<MobjId>, damage: i32 },
    SkullSlam(MobjId),
    Puff { x: Fixed, y: Fixed, z: Fixed },
    Blood { x: Fixed, y: Fixed, z: Fixed, damage: i32 },
    Gibs(MobjId),
    Removed(MobjId),
    CrushBlood(MobjId),
    Explode(MobjId),
    Spawned(MobjId),
}

/// Records every hook call. Sight and damage rolls are fixed by the test,
/// and so is how the hooks change the world.
pub(crate) struct Recorder {
    pub events: Vec<Event>,
    pub sight: bool,
    pub impact: i32,
    pub telefrag: bool,
    pub immune: Vec<MobjId>,
    /// Crossing a special line removes the crosser.
    pub remove_on_cross: bool,
    /// Crossing a special line teleports the crosser here.
    pub cross_moves_to: Option<(Fixed, Fixed)>,
    /// Touching a special thing picks it up.
    pub remove_on_touch: bool,
    /// Touching a special thing removes the toucher.
    pub remove_toucher: bool,
    /// Damage kills and removes the target.
    pub remove_on_damage: bool,
    /// Damage drops a small non-solid actor where the target stands.
    pub spawn_on_damage: bool,
    /// Exploding missiles are removed at once.
    pub remove_on_explode: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            sight: true,
            impact: 10,
            telefrag: false,
            immune: Vec::new(),
            remove_on_cross: false,
            cross_moves_to: None,
            remove_on_touch: false,
            remove_toucher: false,
            remove_on_damage: false,
            spawn_on_damage: false,
            remove_on_explode: false,
        }
    }

    fn remove(&mut self, ctx: &mut PlayCtx, thing: MobjId) {
        if ctx.remove_mobj(thing).is_some() {
            self.events.push(Event::Removed(thing));
        }
    }

    pub fn damage_to(&self, target: MobjId) -> Vec<i32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Damage { target: t, damage, .. } if *t == target => Some(*damage),
                _ => None,
            })
            .collect()
    }
}

impl GameRules for Recorder {
    fn cross_special_line(&mut self, ctx: &mut PlayCtx, line: usize, side: usize, thing: MobjId) {
        self.events.push(Event::Cross { line, side, thing });
        if let Some((x, y)) = self.cross_moves_to {
            ctx.unset_thing_position(thing);
            ctx.mobjs[thing].x = x;
            ctx.mobjs[thing].y = y;
            ctx.set_thing_position(thing);
        }
        if self.remove_on_cross {
            self.remove(ctx, thing);
        }
    }

    fn shoot_special_line(&mut self, _ctx: &mut PlayCtx, thing: MobjId, line: usize) {
        self.events.push(Event::Shoot { line, thing });
    }

    fn use_special_line(&mut self, _ctx: &mut PlayCtx, thing: MobjId, line: usize, side: usize) {
        self.events.push(Event::Use { line, side, thing });
    }

    fn use_blocked(&mut self, _ctx: &mut PlayCtx, thing: MobjId) {
        self.events.push(Event::UseBlocked(thing));
    }

    fn touch_special_thing(&mut self, ctx: &mut PlayCtx, special: MobjId, toucher: MobjId) {
        self.events.push(Event::Touch { special, toucher });
        if self.remove_on_touch {
            self.remove(ctx, special);
        }
        if self.remove_toucher {
            self.remove(ctx, toucher);
        }
    }

    fn damage_mobj(
        &mut self,
        ctx: &mut PlayCtx,
        target: MobjId,
        inflictor: Option<MobjId>,
        source: Option<MobjId>,
        damage: i32,
    ) {
        let Some(m) = ctx.mobjs.get_mut(target) else { return };
        m.health -= damage;
        let (x, y) = (m.x, m.y);
        self.events.push(Event::Damage { target, inflictor, source, damage });
        if self.spawn_on_damage {
            let drop = ctx.spawn_mobj(Mobj::new(x, y, fx(4), fx(4), MobjFlags::empty()), SpawnZ::OnFloor);
            self.events.push(Event::Spawned(drop));
        }
        if self.remove_on_damage {
            self.remove(ctx, target);
        }
    }

    fn impact_damage(&mut self, _ctx: &mut PlayCtx, _attacker: MobjId) -> i32 {
        self.impact
    }

    fn skull_slam_finished(&mut self, _ctx: &mut PlayCtx, skull: MobjId) {
        self.events.push(Event::SkullSlam(skull));
    }

    fn explode_missile(&mut self, ctx: &mut PlayCtx, missile: MobjId) {
        self.events.push(Event::Explode(missile));
        if self.remove_on_explode {
            self.remove(ctx, missile);
        } else if let Some(m) = ctx.mobjs.get_mut(missile) {
            m.momx = 0;
            m.momy = 0;
            m.momz = 0;
        }
    }

    fn spawn_puff(&mut self, _ctx: &mut PlayCtx, x: Fixed, y: Fixed, z: Fixed) {
        self.events.push(Event::Puff { x, y, z });
    }

    fn spawn_blood(&mut self, _ctx: &mut PlayCtx, x: Fixed, y: Fixed, z: Fixed, damage: i32) {
        self.events.push(Event::Blood { x, y, z, damage });
    }

    fn crush_gibs(&mut self, _ctx: &mut PlayCtx, thing: MobjId) {
        self.events.push(Event::Gibs(thing));
    }

    fn remove_mobj(&mut self, ctx: &mut PlayCtx, thing: MobjId) {
        self.events.push(Event::Removed(thing));
        ctx.remove_mobj(thing);
    }

    fn crush_blood(&mut self, _ctx: &mut PlayCtx, thing: MobjId) {
        self.events.push(Event::CrushBlood(thing));
    }

    fn check_sight(&mut self, _ctx: &mut PlayCtx, _looker: MobjId, _target: MobjId) -> bool {
        self.sight
    }

    fn radius_immune(&self, _ctx: &PlayCtx, thing: MobjId) -> bool {
        self.immune.contains(&thing)
    }

    fn monsters_telefrag(&self, _ctx: &PlayCtx, _thing: MobjId) -> bool {
        self.telefrag
    }
}
