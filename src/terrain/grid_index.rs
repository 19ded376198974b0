use crate::terrain::cell::{CellCoordinate, CellSize, WorldPosition};
use crate::terrain::terrain_config::ViewShape;

// Every cell within `view_distance` of the follower's cell, nearest first.
//
// Ties are broken by squared euclidean distance and then by coordinate so the
// order is fully deterministic.
pub fn desired_cells(
    follower: WorldPosition,
    cell_size: CellSize,
    view_distance: u32,
    view_shape: ViewShape,
) -> Vec<CellCoordinate> {
    let centre = follower.cell(cell_size);
    let radius = view_distance.min(i32::MAX as u32) as i32;
    let radius_squared = (radius as i64) * (radius as i64);

    let side = 2 * radius as usize + 1;
    let mut cells = Vec::with_capacity(side * side);
    for z in centre.z.saturating_sub(radius)..=centre.z.saturating_add(radius) {
        for x in centre.x.saturating_sub(radius)..=centre.x.saturating_add(radius) {
            let cell = CellCoordinate::new(x, z);
            let inside = match view_shape {
                ViewShape::Square => true,
                ViewShape::Circle => cell.distance_squared(&centre) <= radius_squared,
            };
            if inside {
                cells.push(cell);
            }
        }
    }

    cells.sort_by_key(|cell| (view_rank(cell, &centre, view_shape), cell.distance_squared(&centre), *cell));
    cells
}

// Distance used for ordering, in the same metric as membership
fn view_rank(cell: &CellCoordinate, centre: &CellCoordinate, view_shape: ViewShape) -> i64 {
    match view_shape {
        ViewShape::Square => cell.chebyshev_distance(centre),
        ViewShape::Circle => cell.distance_squared(centre),
    }
}

pub fn is_within_view(
    cell: &CellCoordinate,
    centre: &CellCoordinate,
    view_distance: u32,
    view_shape: ViewShape,
) -> bool {
    let radius = view_distance as i64;
    match view_shape {
        ViewShape::Square => cell.chebyshev_distance(centre) <= radius,
        ViewShape::Circle => cell.distance_squared(centre) <= radius * radius,
    }
}
