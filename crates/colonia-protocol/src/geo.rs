use serde::{Deserialize, Serialize};

/// Map coordinates on the square tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// The eight compass directions a unit can step in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::N => (0, -1),
            Direction::NE => (1, -1),
            Direction::E => (1, 0),
            Direction::SE => (1, 1),
            Direction::S => (0, 1),
            Direction::SW => (-1, 1),
            Direction::W => (-1, 0),
            Direction::NW => (-1, -1),
        }
    }

    pub const fn reverse(self) -> Direction {
        match self {
            Direction::N => Direction::S,
            Direction::NE => Direction::SW,
            Direction::E => Direction::W,
            Direction::SE => Direction::NW,
            Direction::S => Direction::N,
            Direction::SW => Direction::NE,
            Direction::W => Direction::E,
            Direction::NW => Direction::SE,
        }
    }
}

impl Position {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.offset();
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Chebyshev distance: diagonal steps cost the same as orthogonal ones.
    #[inline]
    pub fn distance(self, other: Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn neighbors(self) -> impl Iterator<Item = Position> {
        Direction::ALL.into_iter().map(move |d| self.step(d))
    }

    /// Direction of an adjacent position, if `other` is exactly one step away.
    pub fn direction_to(self, other: Position) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.step(*d) == other)
    }

    /// All positions with distance `<= radius`, row-major and deterministic.
    pub fn square(self, radius: i32) -> impl Iterator<Item = Position> {
        SquareIter::new(self, radius)
    }
}

struct SquareIter {
    center: Position,
    radius: i32,
    dx: i32,
    dy: i32,
    done: bool,
}

impl SquareIter {
    fn new(center: Position, radius: i32) -> Self {
        let radius = radius.max(0);
        Self {
            center,
            radius,
            dx: -radius,
            dy: -radius,
            done: false,
        }
    }
}

impl Iterator for SquareIter {
    type Item = Position;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let out = Position::new(self.center.x + self.dx, self.center.y + self.dy);

        self.dx += 1;
        if self.dx > self.radius {
            self.dx = -self.radius;
            self.dy += 1;
            if self.dy > self.radius {
                self.done = true;
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_covers_radius() {
        let center = Position::new(5, 5);
        let tiles: Vec<_> = center.square(1).collect();
        assert_eq!(tiles.len(), 9);
        assert!(tiles.iter().all(|p| p.distance(center) <= 1));
        assert_eq!(center.square(0).count(), 1);
        assert_eq!(center.square(2).count(), 25);
    }

    #[test]
    fn direction_round_trip() {
        let origin = Position::new(3, 3);
        for d in Direction::ALL {
            let next = origin.step(d);
            assert_eq!(origin.direction_to(next), Some(d));
            assert_eq!(next.step(d.reverse()), origin);
        }
        assert_eq!(origin.direction_to(Position::new(5, 3)), None);
    }
}
