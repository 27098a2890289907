use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All directions in enumeration order. Move ordering ties fall back to this order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Move::Up => "Up",
            Move::Down => "Down",
            Move::Left => "Left",
            Move::Right => "Right",
        };
        f.pad(s)
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines
const MAX_EXPONENT: u8 = 0xf;

struct Stores {
    slide_left: Box<[u16]>,
    slide_right: Box<[u16]>,
    build_score: Box<[u64]>,
}

type BoardRaw = u64;
type Line = u16;

/// Invalid cell input when building a [`Board`] from exponents.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("expected 16 cells, got {0}")]
    Length(usize),
    #[error("cell {index} holds exponent {exponent}, the largest allowed is 15")]
    Exponent { index: usize, exponent: u8 },
}

/// Packed 4x4 2048 board: 16 tile exponents as 4-bit nibbles in a `u64`.
///
/// Cell 0 is the top-left corner and lives in the most significant nibble;
/// cells run row-major. An exponent of 0 is an empty cell, `e` is the tile `2^e`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Build a board from 16 row-major exponents.
    ///
    /// ```
    /// use ab_2048::engine::{Board, BoardError};
    /// let b = Board::from_cells(&[2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    /// assert_eq!(b.tile_value(0), 4);
    /// assert_eq!(Board::from_cells(&[1, 2, 3]), Err(BoardError::Length(3)));
    /// ```
    pub fn from_cells(cells: &[u8]) -> Result<Self, BoardError> {
        if cells.len() != 16 {
            return Err(BoardError::Length(cells.len()));
        }
        cells.iter().enumerate().try_fold(Board::EMPTY, |board, (index, &exponent)| {
            if exponent > MAX_EXPONENT {
                Err(BoardError::Exponent { index, exponent })
            } else {
                Ok(board.with_tile(index, exponent))
            }
        })
    }

    /// The 16 exponents in row-major order.
    pub fn cells(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = self.cell(idx);
        }
        out
    }

    /// Exponent stored at `idx` (0 when empty).
    #[inline]
    pub fn cell(self, idx: usize) -> u8 {
        ((self.0 >> (60 - 4 * idx)) & 0xf) as u8
    }

    /// Actual tile value at `idx` (0 when empty), e.g. 2, 4, 8, ...
    #[inline]
    pub fn tile_value(self, idx: usize) -> u64 {
        exponent_value(self.cell(idx))
    }

    /// Replace the exponent at `idx`.
    #[inline]
    pub fn with_tile(self, idx: usize, exponent: u8) -> Self {
        let shift = 60 - 4 * idx;
        let cleared = self.0 & !(0xf_u64 << shift);
        Board(cleared | (u64::from(exponent & 0xf) << shift))
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    #[inline]
    pub fn shift(self, dir: Move) -> Self {
        let s = stores();
        match dir {
            Move::Left => self.map_rows(&s.slide_left),
            Move::Right => self.map_rows(&s.slide_right),
            Move::Up => self.transpose().map_rows(&s.slide_left).transpose(),
            Move::Down => self.transpose().map_rows(&s.slide_right).transpose(),
        }
    }

    /// Sum over tiles of the merge points needed to build each of them from 2s.
    ///
    /// The difference across a shift is exactly the value of the merged tiles.
    #[inline]
    pub fn build_score(self) -> u64 {
        let table = &stores().build_score;
        (0..4).map(|row| table[self.line(row) as usize]).sum()
    }

    /// Return true if no move in any direction changes the board.
    ///
    /// ```
    /// use ab_2048::engine::Board;
    /// // Nothing can slide on an empty board.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| self.shift(dir) == self)
    }

    /// Count the number of empty cells on the board.
    // https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
    #[inline]
    pub fn count_empty(self) -> u32 {
        let mut x = self.0;
        x |= x >> 1;
        x |= x >> 2;
        x &= 0x1111_1111_1111_1111;
        16 - x.count_ones()
    }

    /// Indices of empty cells, ascending.
    pub fn empty_cells(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |&idx| self.cell(idx) == 0)
    }

    /// Largest exponent on the board (0 for an empty board).
    pub fn max_exponent(self) -> u8 {
        (0..16).map(|idx| self.cell(idx)).max().unwrap_or(0)
    }

    /// Highest tile value (e.g., 2048) present on the board.
    #[inline]
    pub fn highest_tile(self) -> u64 {
        exponent_value(self.max_exponent())
    }

    /// Rotate the board 90° clockwise `k` times.
    pub fn rotate(self, k: u32) -> Self {
        (0..k % 4).fold(self, |board, _| {
            (0..16).fold(Board::EMPTY, |acc, idx| {
                let (row, col) = (idx / 4, idx % 4);
                acc.with_tile(idx, board.cell((3 - col) * 4 + row))
            })
        })
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty cell.
    ///
    /// A full board is returned unchanged.
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let pick = rng.gen_range(0..empty) as usize;
        let exponent = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
        match self.empty_cells().nth(pick) {
            Some(idx) => self.with_tile(idx, exponent),
            None => self,
        }
    }

    // Credit to Nneonneo
    #[inline]
    fn transpose(self) -> Self {
        let x = self.0;
        let a1 = x & 0xF0F00F0FF0F00F0F;
        let a2 = x & 0x0000F0F00000F0F0;
        let a3 = x & 0x0F0F00000F0F0000;
        let a = a1 | (a2 << 12) | (a3 >> 12);
        let b1 = a & 0xFF00FF0000FF00FF;
        let b2 = a & 0x00FF00FF00000000;
        let b3 = a & 0x00000000FF00FF00;
        Board(b1 | (b2 >> 24) | (b3 << 24))
    }

    #[inline]
    fn line(self, row: u32) -> Line {
        ((self.0 >> ((3 - row) * 16)) & 0xffff) as Line
    }

    #[inline]
    fn map_rows(self, table: &[u16]) -> Self {
        let raw = (0..4).fold(0u64, |acc, row| {
            let moved = table[self.line(row) as usize];
            acc | (u64::from(moved) << ((3 - row) * 16))
        });
        Board(raw)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = self.cells();
        for (row, chunk) in cells.chunks(4).enumerate() {
            if row > 0 {
                writeln!(f, "--------------------------------")?;
            }
            let line: Vec<String> = chunk.iter().map(|&e| format_val(e)).collect();
            writeln!(f, "{}", line.join("|"))?;
        }
        Ok(())
    }
}

/// A board plus the score accumulated by the merges that produced it.
///
/// States are `Copy`; every transition returns a fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GameState {
    board: Board,
    score: u64,
}

impl GameState {
    /// A state with no accumulated score.
    pub fn new(board: Board) -> Self { Self { board, score: 0 } }

    pub fn with_score(board: Board, score: u64) -> Self { Self { board, score } }

    /// Empty board with two random tiles, the usual opening position.
    pub fn random_start<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(Board::EMPTY.with_random_tile(rng).with_random_tile(rng))
    }

    #[inline]
    pub fn board(&self) -> Board { self.board }

    #[inline]
    pub fn score(&self) -> u64 { self.score }

    /// Directions that change the board, in enumeration order.
    ///
    /// An empty result means the game is over.
    pub fn legal_actions(&self) -> Vec<Move> {
        Move::ALL
            .iter()
            .copied()
            .filter(|&dir| self.board.shift(dir) != self.board)
            .collect()
    }

    /// Slide/merge in `dir` and add the merged tile values to the score.
    ///
    /// ```
    /// use ab_2048::engine::{Board, GameState, Move};
    /// let s = GameState::new(Board::from_cells(&[1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap());
    /// let next = s.apply_move(Move::Left);
    /// assert_eq!(next.board().tile_value(0), 4);
    /// assert_eq!(next.score(), 4);
    /// ```
    pub fn apply_move(&self, dir: Move) -> Self {
        let moved = self.board.shift(dir);
        let gained = moved.build_score() - self.board.build_score();
        Self { board: moved, score: self.score + gained }
    }

    /// Every state the environment can produce: each empty cell holding a 2, then a 4.
    pub fn tile_placements(&self) -> impl Iterator<Item = GameState> {
        let state = *self;
        state.board.empty_cells().flat_map(move |idx| {
            [1u8, 2].into_iter().map(move |exponent| GameState {
                board: state.board.with_tile(idx, exponent),
                score: state.score,
            })
        })
    }

    #[inline]
    pub fn is_terminal(&self) -> bool { self.board.is_game_over() }

    /// Rotate the board 90° clockwise `k` times; the score is unchanged.
    pub fn rotate(&self, k: u32) -> Self {
        Self { board: self.board.rotate(k), score: self.score }
    }

    /// Insert a random tile, using the provided RNG.
    pub fn with_random_tile<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        Self { board: self.board.with_random_tile(rng), score: self.score }
    }

    /// Perform a move then insert a random tile if the move changed the board.
    pub fn make_move<R: Rng + ?Sized>(&self, dir: Move, rng: &mut R) -> Self {
        let moved = self.apply_move(dir);
        if moved.board != self.board { moved.with_random_tile(rng) } else { *self }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "score: {}", self.score)?;
        write!(f, "{}", self.board)
    }
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    let _ = stores();
}

#[inline]
pub(crate) fn exponent_value(exponent: u8) -> u64 {
    if exponent == 0 { 0 } else { 1u64 << exponent }
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut slide_left = vec![0u16; LINE_TABLE_SIZE];
    let mut slide_right = vec![0u16; LINE_TABLE_SIZE];
    let mut build_score = vec![0u64; LINE_TABLE_SIZE];

    for (idx, ((left, right), score)) in slide_left
        .iter_mut()
        .zip(slide_right.iter_mut())
        .zip(build_score.iter_mut())
        .enumerate()
    {
        let tiles = unpack_line(idx as Line);
        *left = pack_line(slide_tiles_left(tiles));
        *right = pack_line(slide_tiles_right(tiles));
        *score = line_build_score(tiles);
    }

    Stores {
        slide_left: slide_left.into_boxed_slice(),
        slide_right: slide_right.into_boxed_slice(),
        build_score: build_score.into_boxed_slice(),
    }
}

fn unpack_line(line: Line) -> [u8; 4] {
    [
        ((line >> 12) & 0xf) as u8,
        ((line >> 8) & 0xf) as u8,
        ((line >> 4) & 0xf) as u8,
        (line & 0xf) as u8,
    ]
}

fn pack_line(tiles: [u8; 4]) -> Line {
    tiles.iter().fold(0, |acc, &t| (acc << 4) | Line::from(t))
}

// Each tile merges at most once per move; two 32768 tiles don't merge (nibble limit).
fn slide_tiles_left(tiles: [u8; 4]) -> [u8; 4] {
    let mut out = [0u8; 4];
    let mut len = 0;
    let mut can_merge = false;
    for &tile in tiles.iter().filter(|&&t| t != 0) {
        if can_merge && out[len - 1] == tile && tile < MAX_EXPONENT {
            out[len - 1] += 1;
            can_merge = false;
        } else {
            out[len] = tile;
            len += 1;
            can_merge = true;
        }
    }
    out
}

fn slide_tiles_right(mut tiles: [u8; 4]) -> [u8; 4] {
    tiles.reverse();
    let mut out = slide_tiles_left(tiles);
    out.reverse();
    out
}

// Credit to Nneonneo
fn line_build_score(tiles: [u8; 4]) -> u64 {
    tiles
        .iter()
        .filter(|&&t| t >= 2)
        .map(|&t| u64::from(t - 1) << t)
        .sum()
}

fn format_val(exponent: u8) -> String {
    match exponent {
        0 => " ".repeat(7),
        e => format!("{:^7}", exponent_value(e)),
    }
}
