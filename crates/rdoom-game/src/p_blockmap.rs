// p_blockmap.rs — uniform grid of 128 unit cells over the level
//
// Each cell holds an immutable list of the lines crossing it (flattened into
// `offsets` + `list`) and the head of a mutable chain of actors whose origin
// is in the cell. The chains themselves are threaded through the actors.

use std::ops::Range;

use rayon::prelude::*;

use crate::p_level::{LevelError, LevelResult, Line, Vertex};
use crate::p_local::*;
use crate::p_mobj::MobjId;

#[derive(Debug, Clone, Default)]
pub struct Blockmap {
    pub orgx: Fixed,
    pub orgy: Fixed,
    /// Columns.
    pub width: i32,
    /// Rows.
    pub height: i32,
    // lines of cell i are list[offsets[i]..offsets[i + 1]]
    offsets: Vec<u32>,
    list: Vec<usize>,
    pub blocklinks: Vec<Option<MobjId>>,
}

impl Blockmap {
    /// Below this many lines the builder does not bother with rayon.
    const PARALLEL_LINE_THRESHOLD: usize = 256;

    /// Read a blockmap lump: origin, size, one word offset per cell, then
    /// the cell lists, each `0, line, line, ..., -1`. The leading 0 is a
    /// delimiter unless `line_zero` asks for the old reading, where it is
    /// line 0 and so shows up in every cell.
    pub fn from_lump(lump: &[i16], numlines: usize, line_zero: bool) -> LevelResult<Blockmap> {
        if lump.len() < 4 {
            return Err(LevelError::BlockmapTooShort { len: lump.len() });
        }
        let orgx = (lump[0] as i32) << FRACBITS;
        let orgy = (lump[1] as i32) << FRACBITS;
        let width = lump[2] as i32;
        let height = lump[3] as i32;
        if width <= 0 || height <= 0 {
            return Err(LevelError::BlockmapCorrupt { what: "size", offset: 2 });
        }
        let cells = (width * height) as usize;
        if lump.len() < 4 + cells {
            return Err(LevelError::BlockmapTooShort { len: lump.len() });
        }

        let mut offsets = Vec::with_capacity(cells + 1);
        let mut list = Vec::new();
        offsets.push(0);

        for cell in 0..cells {
            // offsets are unsigned so lumps past 32k words still load
            let mut pos = lump[4 + cell] as u16 as usize;
            if pos < 4 + cells || pos >= lump.len() {
                return Err(LevelError::BlockmapCorrupt { what: "cell offset", offset: 4 + cell });
            }
            // leading delimiter
            if !line_zero && lump[pos] == 0 {
                pos += 1;
            }
            loop {
                let word = match lump.get(pos) {
                    Some(&w) => w,
                    None => {
                        return Err(LevelError::BlockmapCorrupt { what: "list terminator", offset: pos })
                    }
                };
                if word == -1 {
                    break;
                }
                let line = word as u16 as usize;
                if line >= numlines {
                    return Err(LevelError::BlockmapCorrupt { what: "line number", offset: pos });
                }
                list.push(line);
                pos += 1;
            }
            offsets.push(list.len() as u32);
        }

        Ok(Blockmap {
            orgx,
            orgy,
            width,
            height,
            offsets,
            list,
            blocklinks: vec![None; cells],
        })
    }

    /// Build the grid from the line geometry. The origin is the lowest vertex
    /// in whole units, and a line is registered in a cell only when the
    /// segment really passes through the cell's box.
    pub fn build(vertexes: &[Vertex], lines: &[Line]) -> Blockmap {
        let (mut minx, mut miny, mut maxx, mut maxy) = (0, 0, 0, 0);
        if let Some(first) = vertexes.first() {
            minx = first.x >> FRACBITS;
            maxx = minx;
            miny = first.y >> FRACBITS;
            maxy = miny;
            for v in vertexes {
                let (x, y) = (v.x >> FRACBITS, v.y >> FRACBITS);
                minx = minx.min(x);
                maxx = maxx.max(x);
                miny = miny.min(y);
                maxy = maxy.max(y);
            }
        }

        let orgx = minx << FRACBITS;
        let orgy = miny << FRACBITS;
        let width = ((maxx - minx) >> MAPBTOFRAC) + 1;
        let height = ((maxy - miny) >> MAPBTOFRAC) + 1;
        let cells = (width * height) as usize;

        let covered = |line: &Line| cells_crossed(line, orgx, orgy, width, height);
        let per_line: Vec<Vec<usize>> = if lines.len() >= Self::PARALLEL_LINE_THRESHOLD {
            lines.par_iter().map(covered).collect()
        } else {
            lines.iter().map(covered).collect()
        };

        // bucket by cell keeping ascending line order within each cell
        let mut counts = vec![0u32; cells + 1];
        for cell_list in &per_line {
            for &cell in cell_list {
                counts[cell + 1] += 1;
            }
        }
        for i in 0..cells {
            counts[i + 1] += counts[i];
        }
        let offsets = counts.clone();
        let mut fill = counts;
        let mut list = vec![0usize; offsets[cells] as usize];
        for (line, cell_list) in per_line.iter().enumerate() {
            for &cell in cell_list {
                list[fill[cell] as usize] = line;
                fill[cell] += 1;
            }
        }

        Blockmap {
            orgx,
            orgy,
            width,
            height,
            offsets,
            list,
            blocklinks: vec![None; cells],
        }
    }

    #[inline]
    pub fn cell_index(&self, bx: i32, by: i32) -> Option<usize> {
        if bx < 0 || by < 0 || bx >= self.width || by >= self.height {
            return None;
        }
        Some((by * self.width + bx) as usize)
    }

    /// Lines registered in a cell; empty for cells off the grid.
    pub fn cell_lines(&self, bx: i32, by: i32) -> &[usize] {
        &self.list[self.cell_span(bx, by)]
    }

    /// Positions of a cell's lines in the flattened list, so callers can
    /// walk them without holding a borrow of the grid.
    pub(crate) fn cell_span(&self, bx: i32, by: i32) -> Range<usize> {
        match self.cell_index(bx, by) {
            Some(i) => self.offsets[i] as usize..self.offsets[i + 1] as usize,
            None => 0..0,
        }
    }

    #[inline]
    pub(crate) fn list_line(&self, pos: usize) -> usize {
        self.list[pos]
    }

    #[inline]
    pub fn block_x(&self, x: Fixed) -> i32 {
        x.wrapping_sub(self.orgx) >> MAPBLOCKSHIFT
    }

    #[inline]
    pub fn block_y(&self, y: Fixed) -> i32 {
        y.wrapping_sub(self.orgy) >> MAPBLOCKSHIFT
    }

    pub fn num_cells(&self) -> usize {
        self.blocklinks.len()
    }
}

/// Cells of the grid the segment passes through, in row-major order.
fn cells_crossed(line: &Line, orgx: Fixed, orgy: Fixed, width: i32, height: i32) -> Vec<usize> {
    let bx0 = (line.bbox[BOXLEFT].wrapping_sub(orgx) >> MAPBLOCKSHIFT).max(0);
    let bx1 = (line.bbox[BOXRIGHT].wrapping_sub(orgx) >> MAPBLOCKSHIFT).min(width - 1);
    let by0 = (line.bbox[BOXBOTTOM].wrapping_sub(orgy) >> MAPBLOCKSHIFT).max(0);
    let by1 = (line.bbox[BOXTOP].wrapping_sub(orgy) >> MAPBLOCKSHIFT).min(height - 1);

    let x1 = line.v1.x as i128;
    let y1 = line.v1.y as i128;
    let dx = line.dx as i128;
    let dy = line.dy as i128;

    let mut cells = Vec::new();
    for by in by0..=by1 {
        for bx in bx0..=bx1 {
            let left = orgx as i128 + ((bx as i128) << MAPBLOCKSHIFT);
            let bottom = orgy as i128 + ((by as i128) << MAPBLOCKSHIFT);
            let right = left + MAPBLOCKSIZE as i128;
            let top = bottom + MAPBLOCKSIZE as i128;

            // the bboxes overlap; the line crosses the cell unless all four
            // corners lie strictly on one side of it
            let side = |px: i128, py: i128| ((px - x1) * dy - (py - y1) * dx).signum();
            let s = [side(left, bottom), side(right, bottom), side(left, top), side(right, top)];
            let all_pos = s.iter().all(|&v| v > 0);
            let all_neg = s.iter().all(|&v| v < 0);
            if !all_pos && !all_neg {
                cells.push((by * width + bx) as usize);
            }
        }
    }
    cells
}
