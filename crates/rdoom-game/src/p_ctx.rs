// p_ctx.rs — play context and the game-rule callbacks
//
// PlayCtx owns everything one level needs while it runs: the geometry, the
// actors, the per-line validcount stamps and the scratch buffers the traversal
// code reuses between calls. Movement and attack code is written as methods on
// it (see p_maputl, p_map, p_hitscan).

use rdoom_common::common::com_dprintf;
use rdoom_common::cvar::{with_cvar_ctx, CvarContext, CvarFlags};

use crate::p_level::{Level, LevelData, LevelResult};
use crate::p_local::*;
use crate::p_mobj::{Mobj, MobjId, MobjPool};
use crate::p_overrun::{InterceptPolicy, OverrunTable, SpechitClobber, DEFAULT_SPECHIT_MAGIC};

// ============================================================
// Configuration
// ============================================================

/// Compatibility switches, read from the cvar registry at level load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayConfig {
    pub intercepts: InterceptPolicy,
    pub spechit_emulate: bool,
    pub spechit_magic: u32,
    pub blockmap_rebuild: bool,
    /// Line 0 in every blockmap cell, as the lump reads without skipping
    /// its leading zeros.
    pub blockmap_line_zero: bool,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            intercepts: InterceptPolicy::Unbounded,
            spechit_emulate: false,
            spechit_magic: DEFAULT_SPECHIT_MAGIC,
            blockmap_rebuild: false,
            blockmap_line_zero: false,
        }
    }
}

impl PlayConfig {
    pub fn register_cvars(cvars: &mut CvarContext) {
        cvars.get("overrun_intercepts_emulate", "0", CvarFlags::LATCH);
        cvars.get("overrun_spechit_emulate", "0", CvarFlags::LATCH);
        cvars.get(
            "overrun_spechit_magic",
            &DEFAULT_SPECHIT_MAGIC.to_string(),
            CvarFlags::LATCH,
        );
        cvars.get("blockmap_rebuild", "0", CvarFlags::LATCH);
        cvars.get("blockmap_line_zero", "0", CvarFlags::LATCH);
    }

    pub fn from_cvar_ctx(cvars: &CvarContext) -> Self {
        let intercepts = if cvars.variable_value("overrun_intercepts_emulate") != 0.0 {
            InterceptPolicy::LegacyEmulated
        } else {
            InterceptPolicy::Unbounded
        };
        // parsed from the string, an f32 cannot hold every address
        let magic = cvars.variable_string("overrun_spechit_magic");
        let spechit_magic = parse_magic(magic).unwrap_or(DEFAULT_SPECHIT_MAGIC);

        Self {
            intercepts,
            spechit_emulate: cvars.variable_value("overrun_spechit_emulate") != 0.0,
            spechit_magic,
            blockmap_rebuild: cvars.variable_value("blockmap_rebuild") != 0.0,
            blockmap_line_zero: cvars.variable_value("blockmap_line_zero") != 0.0,
        }
    }

    /// Register the switches if needed, apply latched values, and read them.
    pub fn from_cvars() -> Self {
        with_cvar_ctx(|cvars| {
            Self::register_cvars(cvars);
            cvars.apply_latched();
            Self::from_cvar_ctx(cvars)
        })
    }
}

fn parse_magic(s: &str) -> Option<u32> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse::<u32>().ok(),
    }
}

// ============================================================
// Game rules
// ============================================================

/// Everything the movement and attack code asks of the game-rule layer.
/// Hooks get the play context so they can change actors, spawn effects, or
/// remove things.
pub trait GameRules {
    fn cross_special_line(&mut self, ctx: &mut PlayCtx, line: usize, side: usize, thing: MobjId);
    fn shoot_special_line(&mut self, ctx: &mut PlayCtx, thing: MobjId, line: usize);
    fn use_special_line(&mut self, ctx: &mut PlayCtx, thing: MobjId, line: usize, side: usize);
    /// A use press hit a wall with nothing to activate.
    fn use_blocked(&mut self, ctx: &mut PlayCtx, thing: MobjId);
    fn touch_special_thing(&mut self, ctx: &mut PlayCtx, special: MobjId, toucher: MobjId);
    fn damage_mobj(
        &mut self,
        ctx: &mut PlayCtx,
        target: MobjId,
        inflictor: Option<MobjId>,
        source: Option<MobjId>,
        damage: i32,
    );
    /// Damage a missile or charging skull deals on contact.
    fn impact_damage(&mut self, ctx: &mut PlayCtx, attacker: MobjId) -> i32;
    /// A charging skull hit something; put it back in its idle state.
    fn skull_slam_finished(&mut self, _ctx: &mut PlayCtx, _skull: MobjId) {}
    /// A missile ran into a wall. The default just stops it dead.
    fn explode_missile(&mut self, ctx: &mut PlayCtx, missile: MobjId) {
        if let Some(m) = ctx.mobjs.get_mut(missile) {
            m.momx = 0;
            m.momy = 0;
            m.momz = 0;
        }
    }
    fn same_species(&self, ctx: &PlayCtx, a: MobjId, b: MobjId) -> bool {
        ctx.mobjs[a].kind == ctx.mobjs[b].kind
    }
    fn spawn_puff(&mut self, ctx: &mut PlayCtx, x: Fixed, y: Fixed, z: Fixed);
    fn spawn_blood(&mut self, ctx: &mut PlayCtx, x: Fixed, y: Fixed, z: Fixed, damage: i32);
    /// A corpse was crushed into gibs. Its flags and size are already updated.
    fn crush_gibs(&mut self, _ctx: &mut PlayCtx, _thing: MobjId) {}
    /// Remove a crushed dropped item.
    fn remove_mobj(&mut self, ctx: &mut PlayCtx, thing: MobjId) {
        ctx.remove_mobj(thing);
    }
    fn crush_blood(&mut self, _ctx: &mut PlayCtx, _thing: MobjId) {}
    fn check_sight(&mut self, ctx: &mut PlayCtx, looker: MobjId, target: MobjId) -> bool;
    /// Actors that take no splash damage.
    fn radius_immune(&self, _ctx: &PlayCtx, _thing: MobjId) -> bool {
        false
    }
    /// Whether a non-player may telefrag on this level.
    fn monsters_telefrag(&self, _ctx: &PlayCtx, _thing: MobjId) -> bool {
        false
    }
}

// ============================================================
// Play context
// ============================================================

#[derive(Debug)]
pub struct PlayCtx {
    pub level: Level,
    pub mobjs: MobjPool,
    pub config: PlayConfig,

    pub validcount: i32,
    pub(crate) line_validcount: Vec<i32>,

    // taken out while a traversal runs
    pub(crate) intercepts: Vec<Intercept>,

    /// Special lines touched by the last position check, in touch order.
    pub spechit: Vec<usize>,
    pub overrun: OverrunTable,
    pub(crate) spechit_clobbers: Vec<SpechitClobber>,

    // results of the last position check
    pub tmfloorz: Fixed,
    pub tmceilingz: Fixed,
    pub tmdropoffz: Fixed,
    /// The line that set tmceilingz, if any. Missiles use it for the sky hack.
    pub ceilingline: Option<usize>,
    /// A move failed only because of height, so a floater may adjust.
    pub floatok: bool,
}

impl PlayCtx {
    pub fn new(level: Level, config: PlayConfig) -> Self {
        let numlines = level.lines.len();
        Self {
            level,
            mobjs: MobjPool::new(),
            config,
            validcount: 1,
            line_validcount: vec![0; numlines],
            intercepts: Vec::new(),
            spechit: Vec::new(),
            overrun: OverrunTable::new(),
            spechit_clobbers: Vec::new(),
            tmfloorz: 0,
            tmceilingz: 0,
            tmdropoffz: 0,
            ceilingline: None,
            floatok: false,
        }
    }

    /// Load a level with the switches currently set in the cvar registry.
    pub fn load_level(data: LevelData) -> LevelResult<PlayCtx> {
        let config = PlayConfig::from_cvars();
        let level = Level::load(data, config.blockmap_rebuild, config.blockmap_line_zero)?;
        com_dprintf(&format!("play config: {:?}\n", config));
        Ok(PlayCtx::new(level, config))
    }

    /// Start a new query: lines stamped before this are visible again.
    #[inline]
    pub fn next_validcount(&mut self) {
        self.validcount = self.validcount.wrapping_add(1);
    }

    /// Unlink an actor from the world and drop it from the arena.
    pub fn remove_mobj(&mut self, id: MobjId) -> Option<Mobj> {
        if !self.mobjs.contains(id) {
            return None;
        }
        self.unset_thing_position(id);
        self.mobjs.remove(id)
    }
}
