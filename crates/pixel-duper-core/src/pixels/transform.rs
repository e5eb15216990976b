/// One of the eight orientations reachable by 90° rotations and a
/// horizontal mirror. The mirror is applied first, then the clockwise turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Identity,
    Turn90,
    Turn180,
    Turn270,
    Mirror,
    MirrorTurn90,
    MirrorTurn180,
    MirrorTurn270,
}

impl Transform {
    pub const ALL: [Transform; 8] = [
        Transform::Identity,
        Transform::Turn90,
        Transform::Turn180,
        Transform::Turn270,
        Transform::Mirror,
        Transform::MirrorTurn90,
        Transform::MirrorTurn180,
        Transform::MirrorTurn270,
    ];

    pub fn turns(self) -> usize {
        self.code() as usize % 4
    }

    pub fn mirrored(self) -> bool {
        self.code() >= 4
    }

    pub fn code(self) -> u8 {
        match self {
            Transform::Identity => 0,
            Transform::Turn90 => 1,
            Transform::Turn180 => 2,
            Transform::Turn270 => 3,
            Transform::Mirror => 4,
            Transform::MirrorTurn90 => 5,
            Transform::MirrorTurn180 => 6,
            Transform::MirrorTurn270 => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Transform> {
        Transform::ALL.get(code as usize).copied()
    }

    /// Transformed copy of a square row-major grid.
    pub fn apply_grid(self, src: &[u8], side: usize) -> Vec<u8> {
        let mut current = src.to_vec();
        let mut scratch = vec![0u8; src.len()];
        if self.mirrored() {
            mirror_grid(&current, &mut scratch, side);
            std::mem::swap(&mut current, &mut scratch);
        }
        for _ in 0..self.turns() {
            turn_grid(&current, &mut scratch, side);
            std::mem::swap(&mut current, &mut scratch);
        }
        current
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Transform::Identity => "none",
            Transform::Turn90 => "turn 90",
            Transform::Turn180 => "turn 180",
            Transform::Turn270 => "turn 270",
            Transform::Mirror => "mirror",
            Transform::MirrorTurn90 => "mirror + turn 90",
            Transform::MirrorTurn180 => "mirror + turn 180",
            Transform::MirrorTurn270 => "mirror + turn 270",
        };
        f.write_str(name)
    }
}

/// Clockwise quarter turn: `dst[x][side-1-y] = src[y][x]`. `src` and `dst`
/// must not alias.
pub(crate) fn turn_grid(src: &[u8], dst: &mut [u8], side: usize) {
    debug_assert_eq!(src.len(), side * side);
    debug_assert_eq!(dst.len(), side * side);
    for y in 0..side {
        for x in 0..side {
            dst[x * side + (side - 1 - y)] = src[y * side + x];
        }
    }
}

/// Horizontal reflection. `src` and `dst` must not alias.
pub(crate) fn mirror_grid(src: &[u8], dst: &mut [u8], side: usize) {
    debug_assert_eq!(src.len(), side * side);
    debug_assert_eq!(dst.len(), side * side);
    for y in 0..side {
        let row = y * side;
        for x in 0..side {
            dst[row + (side - 1 - x)] = src[row + x];
        }
    }
}
