// p_level.rs — level geometry: vertexes, sectors, sides, lines, BSP leaves
//
// The loader hands over already-parsed map data (`LevelData`). Construction
// resolves every cross reference once. Broken side and sector references are
// pointed at a null sector appended after the real ones, so nothing later has
// to check them again.

use rdoom_common::common::{com_dprintf, com_warning};
use thiserror::Error;

use crate::p_blockmap::Blockmap;
use crate::p_local::*;
use crate::p_mobj::MobjId;

/// Structural problems a level cannot be played with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("level has no sectors")]
    NoSectors,
    #[error("line {line} references missing vertex {vertex}")]
    MissingVertex { line: usize, vertex: usize },
    #[error("blockmap lump too short: {len} words")]
    BlockmapTooShort { len: usize },
    #[error("blockmap lump has a bad {what} at word {offset}")]
    BlockmapCorrupt { what: &'static str, offset: usize },
}

pub type LevelResult<T> = Result<T, LevelError>;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LineFlags: u32 {
        /// Solid to everything but missiles.
        const BLOCKING      = 0x0001;
        /// Solid to monsters only.
        const BLOCKMONSTERS = 0x0002;
        /// Has a back side.
        const TWOSIDED      = 0x0004;
        const DONTPEGTOP    = 0x0008;
        const DONTPEGBOTTOM = 0x0010;
        const SECRET        = 0x0020;
        const SOUNDBLOCK    = 0x0040;
        const DONTDRAW      = 0x0080;
        const MAPPED        = 0x0100;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vertex {
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlopeType {
    Horizontal,
    Vertical,
    Positive,
    Negative,
}

#[derive(Clone, Debug, Default)]
pub struct Sector {
    pub floorheight: Fixed,
    pub ceilingheight: Fixed,
    pub ceilingpic: i32,
    pub special: i32,
    pub tag: i32,
    /// Every line with this sector on either side.
    pub lines: Vec<usize>,
    /// Blockmap cells an actor touching this sector can be in.
    pub blockbox: [i32; 4],
    pub thinglist: Option<MobjId>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Side {
    pub sector: usize,
}

#[derive(Clone, Debug)]
pub struct Line {
    pub v1: Vertex,
    pub v2: Vertex,
    pub dx: Fixed,
    pub dy: Fixed,
    pub flags: LineFlags,
    pub special: i32,
    pub tag: i32,
    pub sidenum: [Option<usize>; 2],
    pub bbox: BBox,
    pub slopetype: SlopeType,
    pub frontsector: usize,
    /// None for one-sided lines.
    pub backsector: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Subsector {
    pub sector: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeChild {
    Node(usize),
    Subsector(usize),
}

/// BSP partition line. `children[0]` is the front (right) side.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub x: Fixed,
    pub y: Fixed,
    pub dx: Fixed,
    pub dy: Fixed,
    pub children: [NodeChild; 2],
}

// ============================================================
// Loader input
// ============================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct MapSector {
    pub floorheight: Fixed,
    pub ceilingheight: Fixed,
    pub ceilingpic: i32,
    pub special: i32,
    pub tag: i32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MapSide {
    pub sector: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MapLine {
    pub v1: usize,
    pub v2: usize,
    pub flags: LineFlags,
    pub special: i32,
    pub tag: i32,
    pub sidenum: [Option<usize>; 2],
}

#[derive(Clone, Debug, Default)]
pub struct LevelData {
    pub vertexes: Vec<Vertex>,
    pub sectors: Vec<MapSector>,
    pub sides: Vec<MapSide>,
    pub lines: Vec<MapLine>,
    pub subsectors: Vec<Subsector>,
    pub nodes: Vec<Node>,
    /// Raw blockmap lump words, if the map carries one.
    pub blockmap: Option<Vec<i16>>,
    pub skyflatnum: i32,
}

// ============================================================
// Level
// ============================================================

#[derive(Debug)]
pub struct Level {
    pub vertexes: Vec<Vertex>,
    /// Real sectors followed by the null sector.
    pub sectors: Vec<Sector>,
    pub sides: Vec<Side>,
    pub lines: Vec<Line>,
    pub subsectors: Vec<Subsector>,
    pub nodes: Vec<Node>,
    pub blockmap: Blockmap,
    pub skyflatnum: i32,
    pub null_sector: usize,
}

impl Level {
    /// Resolve the map data into a playable level. With `rebuild_blockmap`
    /// the lump is ignored and the grid is always built from the lines.
    /// `blockmap_line_zero` reads the lump's leading zeros as line 0.
    pub fn load(data: LevelData, rebuild_blockmap: bool, blockmap_line_zero: bool) -> LevelResult<Level> {
        if data.sectors.is_empty() {
            return Err(LevelError::NoSectors);
        }

        let mut sectors: Vec<Sector> = data
            .sectors
            .iter()
            .map(|ms| Sector {
                floorheight: ms.floorheight,
                ceilingheight: ms.ceilingheight,
                ceilingpic: ms.ceilingpic,
                special: ms.special,
                tag: ms.tag,
                ..Default::default()
            })
            .collect();
        let null_sector = sectors.len();
        sectors.push(Sector::default());

        let sides: Vec<Side> = data
            .sides
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                if ms.sector >= null_sector {
                    com_warning(&format!(
                        "side {} references bad sector {}\n",
                        i, ms.sector
                    ));
                    Side { sector: null_sector }
                } else {
                    Side { sector: ms.sector }
                }
            })
            .collect();

        let side_sector = |line: usize, side: usize| -> usize {
            match sides.get(side) {
                Some(s) => s.sector,
                None => {
                    com_warning(&format!("line {} references bad side {}\n", line, side));
                    null_sector
                }
            }
        };

        let mut lines = Vec::with_capacity(data.lines.len());
        for (i, ml) in data.lines.iter().enumerate() {
            let v1 = *data
                .vertexes
                .get(ml.v1)
                .ok_or(LevelError::MissingVertex { line: i, vertex: ml.v1 })?;
            let v2 = *data
                .vertexes
                .get(ml.v2)
                .ok_or(LevelError::MissingVertex { line: i, vertex: ml.v2 })?;

            let dx = v2.x.wrapping_sub(v1.x);
            let dy = v2.y.wrapping_sub(v1.y);
            let slopetype = if dx == 0 {
                SlopeType::Vertical
            } else if dy == 0 {
                SlopeType::Horizontal
            } else if fixed_div(dy, dx) > 0 {
                SlopeType::Positive
            } else {
                SlopeType::Negative
            };

            let mut bbox = [0; 4];
            m_clear_box(&mut bbox);
            m_add_to_box(&mut bbox, v1.x, v1.y);
            m_add_to_box(&mut bbox, v2.x, v2.y);

            let frontsector = match ml.sidenum[0] {
                Some(s) => side_sector(i, s),
                None => {
                    com_warning(&format!("line {} has no front side\n", i));
                    null_sector
                }
            };
            let backsector = ml.sidenum[1].map(|s| side_sector(i, s));

            lines.push(Line {
                v1,
                v2,
                dx,
                dy,
                flags: ml.flags,
                special: ml.special,
                tag: ml.tag,
                sidenum: ml.sidenum,
                bbox,
                slopetype,
                frontsector,
                backsector,
            });
        }

        let subsectors = data
            .subsectors
            .iter()
            .enumerate()
            .map(|(i, ss)| {
                if ss.sector >= null_sector {
                    com_warning(&format!(
                        "subsector {} references bad sector {}\n",
                        i, ss.sector
                    ));
                    Subsector { sector: null_sector }
                } else {
                    *ss
                }
            })
            .collect();

        let nodes = check_nodes(data.nodes);

        let blockmap = match data.blockmap.as_deref() {
            Some(lump) if !rebuild_blockmap => match Blockmap::from_lump(lump, lines.len(), blockmap_line_zero) {
                Ok(bm) => bm,
                Err(e) => {
                    com_warning(&format!("{}, rebuilding blockmap\n", e));
                    Blockmap::build(&data.vertexes, &lines)
                }
            },
            _ => Blockmap::build(&data.vertexes, &lines),
        };

        let mut level = Level {
            vertexes: data.vertexes,
            sectors,
            sides,
            lines,
            subsectors,
            nodes,
            blockmap,
            skyflatnum: data.skyflatnum,
            null_sector,
        };
        level.group_lines();

        com_dprintf(&format!(
            "level: {} lines, {} sectors, blockmap {}x{}\n",
            level.lines.len(),
            null_sector,
            level.blockmap.width,
            level.blockmap.height
        ));
        Ok(level)
    }

    /// Build each sector's line list and blockbox.
    fn group_lines(&mut self) {
        for (i, line) in self.lines.iter().enumerate() {
            self.sectors[line.frontsector].lines.push(i);
            if let Some(back) = line.backsector {
                if back != line.frontsector {
                    self.sectors[back].lines.push(i);
                }
            }
        }

        let bm = &self.blockmap;
        for sector in self.sectors.iter_mut() {
            if sector.lines.is_empty() {
                // nothing can be in it; an empty range
                sector.blockbox = [-1, 0, 0, -1];
                continue;
            }
            let mut bbox = [0; 4];
            m_clear_box(&mut bbox);
            for &li in &sector.lines {
                let line = &self.lines[li];
                m_add_to_box(&mut bbox, line.v1.x, line.v1.y);
                m_add_to_box(&mut bbox, line.v2.x, line.v2.y);
            }

            let top = (bbox[BOXTOP].wrapping_sub(bm.orgy).wrapping_add(MAXRADIUS)) >> MAPBLOCKSHIFT;
            let bottom = (bbox[BOXBOTTOM].wrapping_sub(bm.orgy).wrapping_sub(MAXRADIUS)) >> MAPBLOCKSHIFT;
            let right = (bbox[BOXRIGHT].wrapping_sub(bm.orgx).wrapping_add(MAXRADIUS)) >> MAPBLOCKSHIFT;
            let left = (bbox[BOXLEFT].wrapping_sub(bm.orgx).wrapping_sub(MAXRADIUS)) >> MAPBLOCKSHIFT;

            sector.blockbox[BOXTOP] = top.min(bm.height - 1);
            sector.blockbox[BOXBOTTOM] = bottom.max(0);
            sector.blockbox[BOXRIGHT] = right.min(bm.width - 1);
            sector.blockbox[BOXLEFT] = left.max(0);
        }
    }

    /// Number of real sectors, not counting the null sector.
    #[inline]
    pub fn num_sectors(&self) -> usize {
        self.null_sector
    }

    /// BSP leaf containing a point. A level without nodes is one leaf.
    pub fn point_in_subsector(&self, x: Fixed, y: Fixed) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut child = NodeChild::Node(self.nodes.len() - 1);
        loop {
            match child {
                NodeChild::Subsector(ss) => return ss,
                NodeChild::Node(n) => {
                    let node = &self.nodes[n];
                    child = node.children[point_on_node_side(x, y, node)];
                }
            }
        }
    }

    /// Sector containing a point.
    pub fn sector_at(&self, x: Fixed, y: Fixed) -> usize {
        self.subsector_sector(self.point_in_subsector(x, y))
    }

    /// Sector number of a BSP leaf; the null sector for a bad leaf.
    #[inline]
    pub fn subsector_sector(&self, ss: usize) -> usize {
        self.subsectors.get(ss).map_or(self.null_sector, |s| s.sector)
    }
}

/// Node children must point at lower numbered nodes, which the root-last
/// node order guarantees for any real map. Anything else is cut off at a
/// leaf so point location cannot run off the array or loop.
fn check_nodes(mut nodes: Vec<Node>) -> Vec<Node> {
    for (i, node) in nodes.iter_mut().enumerate() {
        for child in node.children.iter_mut() {
            if let NodeChild::Node(n) = *child {
                if n >= i {
                    com_warning(&format!("node {} has bad child node {}\n", i, n));
                    *child = NodeChild::Subsector(0);
                }
            }
        }
    }
    nodes
}

/// 0 for the front (right) side of a partition, 1 for the back.
pub fn point_on_node_side(x: Fixed, y: Fixed, node: &Node) -> usize {
    if node.dx == 0 {
        if x <= node.x {
            return (node.dy > 0) as usize;
        }
        return (node.dy < 0) as usize;
    }
    if node.dy == 0 {
        if y <= node.y {
            return (node.dx < 0) as usize;
        }
        return (node.dx > 0) as usize;
    }

    let dx = x.wrapping_sub(node.x);
    let dy = y.wrapping_sub(node.y);

    // sign bits alone decide it
    if (node.dy ^ node.dx ^ dx ^ dy) < 0 {
        return ((node.dy ^ dx) < 0) as usize;
    }

    let left = fixed_mul(node.dy >> FRACBITS, dx);
    let right = fixed_mul(dy, node.dx >> FRACBITS);
    if right < left {
        0
    } else {
        1
    }
}
