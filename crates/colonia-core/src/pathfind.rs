use std::cmp::Reverse;
use std::collections::BinaryHeap;

use colonia_protocol::{Direction, Location, Position, Terrain, UnitId};

use crate::world::World;
use crate::movement::passable;

/// Map tiles that satisfy a goto destination for this unit.
pub fn goal_tiles(world: &World, unit: UnitId, destination: Location) -> Vec<Position> {
    match destination {
        Location::Tile { position } => vec![position],
        Location::Settlement { settlement } => world
            .settlements
            .get(settlement)
            .map(|s| vec![s.position])
            .unwrap_or_default(),
        Location::Europe => {
            let naval = world.units.get(unit).is_some_and(|u| world.is_naval(u));
            if !naval {
                return Vec::new();
            }
            world
                .map
                .positions()
                .filter(|p| world.map.terrain(*p) == Some(Terrain::HighSeas))
                .collect()
        }
        Location::HighSeas | Location::Carrier { .. } => Vec::new(),
    }
}

/// Cheapest path from the unit to any goal, as a list of steps. `None` when no
/// path exists; an empty list when the unit already stands on a goal.
pub fn find_path(world: &World, unit: UnitId, goals: &[Position]) -> Option<Vec<Direction>> {
    let u = world.units.get(unit)?;
    let start = world.unit_position(unit)?;
    let start_index = world.map.index_of(start)?;
    if goals.contains(&start) {
        return Some(Vec::new());
    }
    let naval = world.is_naval(u);

    let len = (world.map.width() * world.map.height()) as usize;
    let mut dist = vec![u32::MAX; len];
    let mut prev: Vec<Option<usize>> = vec![None; len];
    dist[start_index] = 0;

    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    heap.push(Reverse((0, start_index)));

    let mut reached = None;
    while let Some(Reverse((cost, index))) = heap.pop() {
        if cost != dist[index] {
            continue;
        }
        let here = world.map.position_of(index);
        if goals.contains(&here) {
            reached = Some(index);
            break;
        }
        for neighbor in here.neighbors() {
            let Some(n_index) = world.map.index_of(neighbor) else {
                continue;
            };
            // Goals may be occupied (a settlement or an enemy); intermediate tiles may not.
            if !goals.contains(&neighbor) && !passable(world, u, neighbor) {
                continue;
            }
            let step = if naval {
                1
            } else {
                world
                    .map
                    .terrain(neighbor)
                    .filter(|t| !t.is_water())
                    .map_or(u32::MAX, |t| world.rules.terrain(t).move_cost)
            };
            if step == u32::MAX {
                continue;
            }
            let new_cost = cost.saturating_add(step);
            if new_cost < dist[n_index] {
                dist[n_index] = new_cost;
                prev[n_index] = Some(index);
                heap.push(Reverse((new_cost, n_index)));
            }
        }
    }

    let mut index = reached?;
    let mut steps = Vec::new();
    while let Some(p) = prev[index] {
        let from = world.map.position_of(p);
        let to = world.map.position_of(index);
        steps.push(from.direction_to(to)?);
        index = p;
    }
    steps.reverse();
    Some(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::WorldBuilder;
    use colonia_protocol::{PlayerKind, UnitRole};

    #[test]
    fn routes_around_water() {
        let mut b = WorldBuilder::new(6, 3, Terrain::Plains).unwrap();
        b.terrain(Position::new(2, 0), Terrain::Ocean);
        b.terrain(Position::new(2, 1), Terrain::Ocean);
        let dutch = b.player("Dutch", PlayerKind::Colonial, true);
        let unit = b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(0, 0));
        let world = b.build().unwrap();

        let path = find_path(&world, unit, &[Position::new(4, 0)]).unwrap();
        let mut pos = Position::new(0, 0);
        for step in &path {
            pos = pos.step(*step);
            assert!(world.map.is_land(pos));
        }
        assert_eq!(pos, Position::new(4, 0));
    }

    #[test]
    fn unreachable_goal_has_no_path() {
        let mut b = WorldBuilder::new(5, 1, Terrain::Plains).unwrap();
        b.terrain(Position::new(2, 0), Terrain::Ocean);
        let dutch = b.player("Dutch", PlayerKind::Colonial, true);
        let unit = b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(0, 0));
        let world = b.build().unwrap();
        assert!(find_path(&world, unit, &[Position::new(4, 0)]).is_none());
        assert_eq!(find_path(&world, unit, &[Position::new(0, 0)]), Some(Vec::new()));
    }
}
