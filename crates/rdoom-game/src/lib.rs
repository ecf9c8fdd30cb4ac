#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::collapsible_else_if,
         clippy::needless_range_loop, clippy::comparison_chain, clippy::manual_range_contains)]
// Play simulation core: movement, collision, hit-scan and radius effects.

pub mod p_local;
pub mod p_level;
pub mod p_mobj;
pub mod p_blockmap;
pub mod p_overrun;
pub mod p_ctx;
pub mod p_maputl;
pub mod p_map;
pub mod p_hitscan;

#[cfg(test)]
pub(crate) mod test_level;
