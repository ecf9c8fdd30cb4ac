// p_mobj.rs — actors and the generational actor arena

use std::ops::{Index, IndexMut};

use crate::p_local::{Angle, Fixed};

bitflags::bitflags! {
    /// Actor flags. Bit values match the legacy engine so that flag words
    /// stored in demos and saves keep their meaning.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MobjFlags: u32 {
        /// Call the touch hook when something touches this.
        const SPECIAL      = 0x0000_0001;
        /// Blocks movement.
        const SOLID        = 0x0000_0002;
        /// Can be hit by attacks.
        const SHOOTABLE    = 0x0000_0004;
        /// Not linked into a sector actor list (invisible but touchable).
        const NOSECTOR     = 0x0000_0008;
        /// Not linked into the blockmap (inert but displayable).
        const NOBLOCKMAP   = 0x0000_0010;
        const AMBUSH       = 0x0000_0020;
        const JUSTHIT      = 0x0000_0040;
        const JUSTATTACKED = 0x0000_0080;
        /// Spawned hanging from the ceiling.
        const SPAWNCEILING = 0x0000_0100;
        const NOGRAVITY    = 0x0000_0200;
        /// Allowed to step off high ledges.
        const DROPOFF      = 0x0000_0400;
        /// Picks up SPECIAL items.
        const PICKUP       = 0x0000_0800;
        /// Ignores every collision test.
        const NOCLIP       = 0x0000_1000;
        /// Slides along walls when a move is blocked.
        const SLIDE        = 0x0000_2000;
        const FLOAT        = 0x0000_4000;
        /// Skips fit and step checks and never crosses special lines.
        const TELEPORT     = 0x0000_8000;
        const MISSILE      = 0x0001_0000;
        /// Dropped by a monster; removed when crushed.
        const DROPPED      = 0x0002_0000;
        const SHADOW       = 0x0004_0000;
        /// Puffs instead of bleeding.
        const NOBLOOD      = 0x0008_0000;
        const CORPSE       = 0x0010_0000;
        const INFLOAT      = 0x0020_0000;
        const COUNTKILL    = 0x0040_0000;
        const COUNTITEM    = 0x0080_0000;
        /// Charging lost soul; slams into whatever it hits.
        const SKULLFLY     = 0x0100_0000;
        const NOTDMATCH    = 0x0200_0000;
    }
}

/// Stable handle to an actor. The generation is bumped every time a slot is
/// reused, so a handle kept past its actor's removal never resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MobjId {
    pub index: u32,
    pub generation: u32,
}

/// Where a newly spawned actor is placed vertically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnZ {
    /// Floor, or ceiling for SPAWNCEILING actors.
    Auto,
    OnFloor,
    OnCeiling,
    At(Fixed),
}

/// A mobile object: the player, a monster, a missile, an item.
#[derive(Clone, Debug, Default)]
pub struct Mobj {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,

    pub radius: Fixed,
    pub height: Fixed,

    pub momx: Fixed,
    pub momy: Fixed,
    pub momz: Fixed,

    pub flags: MobjFlags,
    pub health: i32,
    /// Type tag owned by the game rules.
    pub kind: u32,
    pub player: Option<usize>,
    pub target: Option<MobjId>,

    /// Contact heights from the last successful position check.
    pub floorz: Fixed,
    pub ceilingz: Fixed,
    pub dropoffz: Fixed,

    pub subsector: usize,

    // sector actor list
    pub snext: Option<MobjId>,
    pub sprev: Option<MobjId>,
    // blockmap cell chain
    pub bnext: Option<MobjId>,
    pub bprev: Option<MobjId>,
}

impl Mobj {
    pub fn new(x: Fixed, y: Fixed, radius: Fixed, height: Fixed, flags: MobjFlags) -> Self {
        Self {
            x,
            y,
            radius,
            height,
            flags,
            health: 100,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_player(&self) -> bool {
        self.player.is_some()
    }

    #[inline]
    pub fn top(&self) -> Fixed {
        self.z + self.height
    }
}

// ============================================================
// Arena
// ============================================================

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    mobj: Option<Mobj>,
}

#[derive(Debug, Default)]
pub struct MobjPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    count: usize,
}

impl MobjPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mobj: Mobj) -> MobjId {
        self.count += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.mobj = Some(mobj);
            return MobjId { index, generation: slot.generation };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, mobj: Some(mobj) });
        MobjId { index, generation: 0 }
    }

    /// Take an actor out of the arena. Its links are not touched; unlink
    /// it from the world first.
    pub fn remove(&mut self, id: MobjId) -> Option<Mobj> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let mobj = slot.mobj.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.count -= 1;
        Some(mobj)
    }

    pub fn get(&self, id: MobjId) -> Option<&Mobj> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.mobj.as_ref())
    }

    pub fn get_mut(&mut self, id: MobjId) -> Option<&mut Mobj> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.mobj.as_mut())
    }

    #[inline]
    pub fn contains(&self, id: MobjId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (MobjId, &Mobj)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.mobj.as_ref().map(|m| {
                (MobjId { index: i as u32, generation: s.generation }, m)
            })
        })
    }

    pub fn ids(&self) -> Vec<MobjId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

impl Index<MobjId> for MobjPool {
    type Output = Mobj;

    fn index(&self, id: MobjId) -> &Mobj {
        match self.get(id) {
            Some(m) => m,
            None => panic!("stale mobj id {:?}", id),
        }
    }
}

impl IndexMut<MobjId> for MobjPool {
    fn index_mut(&mut self, id: MobjId) -> &mut Mobj {
        match self.get_mut(id) {
            Some(m) => m,
            None => panic!("stale mobj id {:?}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p_local::FRACUNIT;

    fn dummy() -> Mobj {
        Mobj::new(0, 0, 16 * FRACUNIT, 56 * FRACUNIT, MobjFlags::SOLID)
    }

    #[test]
    fn legacy_flag_bits() {
        assert_eq!(MobjFlags::SHOOTABLE.bits(), 4);
        assert_eq!(MobjFlags::NOCLIP.bits(), 0x1000);
        assert_eq!(MobjFlags::MISSILE.bits(), 0x10000);
        assert_eq!(MobjFlags::SKULLFLY.bits(), 0x1000000);
    }

    #[test]
    fn insert_get_remove() {
        let mut pool = MobjPool::new();
        let a = pool.insert(dummy());
        let b = pool.insert(dummy());
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert!(pool.remove(a).is_some());
        assert!(pool.get(a).is_none());
        assert!(pool.remove(a).is_none());
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(b));
    }

    #[test]
    fn stale_id_does_not_alias_reused_slot() {
        let mut pool = MobjPool::new();
        let a = pool.insert(dummy());
        pool.remove(a);
        let mut m = dummy();
        m.health = 7;
        let c = pool.insert(m);
        // same slot, new generation
        assert_eq!(c.index, a.index);
        assert_ne!(c.generation, a.generation);
        assert!(pool.get(a).is_none());
        assert_eq!(pool[c].health, 7);
    }

    #[test]
    fn iter_skips_empty_slots() {
        let mut pool = MobjPool::new();
        let a = pool.insert(dummy());
        let b = pool.insert(dummy());
        let c = pool.insert(dummy());
        pool.remove(b);
        let ids = pool.ids();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    #[should_panic]
    fn index_with_stale_id_panics() {
        let mut pool = MobjPool::new();
        let a = pool.insert(dummy());
        pool.remove(a);
        let _ = &pool[a];
    }
}
