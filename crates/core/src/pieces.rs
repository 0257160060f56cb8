//! Pieces module - Tetromino shapes and SRS rotation system
//!
//! Shapes are stored as mino offsets from the piece origin, indexed by piece id and
//! rotation. Wall kicks follow the Standard Rotation System.
//! Reference: https://tetris.wiki/SRS

use crate::types::{PieceKind, Rotation};

/// Offset of a single mino relative to piece origin
pub type MinoOffset = (i8, i8);

/// Shape of a piece - 4 mino offsets from piece origin
pub type PieceShape = [MinoOffset; 4];

/// Spawn position for new pieces (x, y)
pub const SPAWN_POSITION: (i8, i8) = (3, 0);

/// `SHAPES[piece_id][rotation]`, rotations in N, E, S, W order.
const SHAPES: [[PieceShape; 4]; 7] = [
    // I
    [
        [(0, 1), (1, 1), (2, 1), (3, 1)],
        [(2, 0), (2, 1), (2, 2), (2, 3)],
        [(0, 2), (1, 2), (2, 2), (3, 2)],
        [(1, 0), (1, 1), (1, 2), (1, 3)],
    ],
    // O
    [
        [(1, 0), (2, 0), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (2, 1)],
    ],
    // T
    [
        [(1, 0), (0, 1), (1, 1), (2, 1)],
        [(1, 0), (1, 1), (2, 1), (1, 2)],
        [(0, 1), (1, 1), (2, 1), (1, 2)],
        [(1, 0), (0, 1), (1, 1), (1, 2)],
    ],
    // S
    [
        [(1, 0), (2, 0), (0, 1), (1, 1)],
        [(1, 0), (1, 1), (2, 1), (2, 2)],
        [(1, 1), (2, 1), (0, 2), (1, 2)],
        [(0, 0), (0, 1), (1, 1), (1, 2)],
    ],
    // Z
    [
        [(0, 0), (1, 0), (1, 1), (2, 1)],
        [(2, 0), (1, 1), (2, 1), (1, 2)],
        [(0, 1), (1, 1), (1, 2), (2, 2)],
        [(1, 0), (0, 1), (1, 1), (0, 2)],
    ],
    // J
    [
        [(0, 0), (0, 1), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (1, 2)],
        [(0, 1), (1, 1), (2, 1), (2, 2)],
        [(1, 0), (1, 1), (0, 2), (1, 2)],
    ],
    // L
    [
        [(2, 0), (0, 1), (1, 1), (2, 1)],
        [(1, 0), (1, 1), (1, 2), (2, 2)],
        [(0, 1), (1, 1), (2, 1), (0, 2)],
        [(0, 0), (1, 0), (1, 1), (1, 2)],
    ],
];

/// Get the shape (mino offsets) for a piece kind and rotation
pub fn get_shape(kind: PieceKind, rotation: Rotation) -> PieceShape {
    SHAPES[kind.id() as usize][rotation.index()]
}

/// SRS wall kick data, indexed by [from_rotation * 2 + (0 for CW, 1 for CCW)]
type KickTable = [[(i8, i8); 5]; 8];

/// O piece has no kicks
const O_KICKS: KickTable = [[(0, 0); 5]; 8];

/// JLSTZ kick table (shared by J, L, S, T, Z)
const JLSTZ_KICKS: KickTable = [
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // N->E
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // N->W
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // E->S
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // E->N
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // S->W
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // S->E
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // W->N
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // W->S
];

/// I piece kick table
const I_KICKS: KickTable = [
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // N->E
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // N->W
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // E->S
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // E->N
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // S->W
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // S->E
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // W->N
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // W->S
];

fn kick_table(kind: PieceKind) -> &'static KickTable {
    match kind {
        PieceKind::O => &O_KICKS,
        PieceKind::I => &I_KICKS,
        _ => &JLSTZ_KICKS,
    }
}

/// Try to rotate a piece with wall kicks
/// Returns Some(new_rotation, kick_offset) if successful, None if all kicks fail
pub fn try_rotate(
    kind: PieceKind,
    rotation: Rotation,
    x: i8,
    y: i8,
    clockwise: bool,
    is_valid: impl Fn(i8, i8) -> bool,
) -> Option<(Rotation, (i8, i8))> {
    let new_rotation = if clockwise {
        rotation.rotate_cw()
    } else {
        rotation.rotate_ccw()
    };

    let new_shape = get_shape(kind, new_rotation);
    let row = rotation.index() * 2 + usize::from(!clockwise);

    kick_table(kind)[row]
        .iter()
        .find(|&&(dx, dy)| {
            new_shape
                .iter()
                .all(|&(mx, my)| is_valid(x + dx + mx, y + dy + my))
        })
        .map(|&kick| (new_rotation, kick))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shape_has_four_distinct_minos() {
        for kind in PieceKind::ALL {
            for rotation in Rotation::ALL {
                let shape = get_shape(kind, rotation);
                for i in 0..4 {
                    for j in (i + 1)..4 {
                        assert_ne!(shape[i], shape[j], "{:?} {:?}", kind, rotation);
                    }
                }
            }
        }
    }

    #[test]
    fn rotation_in_open_space_uses_no_kick() {
        let result = try_rotate(PieceKind::T, Rotation::North, 4, 5, true, |_, _| true);
        assert_eq!(result, Some((Rotation::East, (0, 0))));
    }

    #[test]
    fn rotation_kicks_off_left_wall() {
        // I piece vertical against the left wall cannot rotate in place.
        let result = try_rotate(PieceKind::I, Rotation::West, -1, 5, true, |x, y| {
            (0..10).contains(&x) && (0..20).contains(&y)
        });
        let (rotation, kick) = result.expect("kick should succeed");
        assert_eq!(rotation, Rotation::North);
        assert_ne!(kick, (0, 0));
    }

    #[test]
    fn rotation_fails_when_fully_blocked() {
        let result = try_rotate(PieceKind::S, Rotation::North, 4, 5, false, |_, _| false);
        assert_eq!(result, None);
    }
}
