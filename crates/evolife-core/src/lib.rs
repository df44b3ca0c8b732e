//! Core types for the EvoLife artificial-life simulator.
//!
//! The world is a fixed grid of cells bounded by wall rows at the top and
//! bottom, toroidal along the x axis. Bots carry a fixed-length genome of
//! 6-bit codes executed as a circular program: one scheduled turn runs until
//! a terminating instruction fires or the non-terminating instruction budget
//! is exhausted. The scheduler advances exactly one bot per [`Simulation::step`]
//! and ticks world physics (organic gravity) once afterwards.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Number of codes in every genome; fixed for a bot's lifetime.
pub const GENOME_SIZE: usize = 64;
/// Largest value a genome code may hold (codes are 6-bit).
pub const GENOME_CODE_MAX: u8 = 63;
/// Non-terminating instructions allowed within one turn before a forced stop.
pub const VM_MAX_NONTERMINATING: u32 = 15;

/// Energy granted to the seed organism.
pub const INITIAL_ENERGY: i32 = 20;
/// Basal metabolism deducted once at the end of every turn.
pub const BASE_METABOLISM: i32 = 1;
/// Cost of a Step action, charged whether or not the move succeeds.
pub const MOVE_COST: i32 = 1;
/// Cost of a Share action.
pub const SHARE_COST: i32 = 1;
/// Cost of an Eat action.
pub const EAT_COST: i32 = 0;
/// Photosynthesis yield at the first playable row beneath the top wall.
pub const PHOTO_BASE_TOP: i32 = 8;

/// Fraction of the world height above which cells carry no minerals.
pub const MINERALS_BAND_TOP_FRAC: f32 = 0.5;
/// Mineral quantity seeded at the top of the mineral band.
pub const MINERALS_BASE_PER_CELL: f32 = 20.0;
/// Per-row depth bonus applied to the mineral seed.
pub const MINERALS_DEPTH_MULT: f32 = 0.5;
/// Most minerals harvestable by a single Mine action.
pub const MINE_MAX_PER_ACTION: f32 = 6.0;
/// Energy gained per mineral unit consumed.
pub const MINE_EFFICIENCY: f32 = 1.0;
/// Most organic matter consumable by a single Eat action.
pub const ORGANIC_EAT_MAX: f32 = 8.0;

/// Energy at which voluntary reproduction becomes possible.
pub const REPRODUCTION_THRESHOLD: i32 = 40;
/// Energy ceiling; reaching it forces reproduction (or death without space).
pub const MAX_ENERGY: i32 = 80;
/// Energy deducted from a parent and granted to its child.
pub const REPRODUCTION_COST: i32 = 20;
/// Chance that a child genome receives one point mutation.
pub const MUTATION_RATE: f32 = 0.25;
/// Multiplier applied to the EnergyCompare operand to form a threshold.
pub const ENERGY_COMPARE_UNIT: i32 = 15;

/// Smallest legal world dimension on either axis.
pub const MIN_WORLD_DIM: usize = 8;

/// Energy value marking a bot as dead before its next scheduling.
const DEATH_SENTINEL: i32 = -1;

/// Stable identifier assigned at registration; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BotId(pub u64);

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the eight compass facings a bot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Map an index to a facing, reducing modulo 8.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index % 8 {
            0 => Self::North,
            1 => Self::NorthEast,
            2 => Self::East,
            3 => Self::SouthEast,
            4 => Self::South,
            5 => Self::SouthWest,
            6 => Self::West,
            _ => Self::NorthWest,
        }
    }

    /// Index of this facing in clockwise order starting at north.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::North => 0,
            Self::NorthEast => 1,
            Self::East => 2,
            Self::SouthEast => 3,
            Self::South => 4,
            Self::SouthWest => 5,
            Self::West => 6,
            Self::NorthWest => 7,
        }
    }

    /// Grid offset of the adjacent cell in this facing (y grows downward).
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// Facing reached by rotating clockwise by `steps` eighths of a turn.
    #[must_use]
    pub const fn rotated(self, steps: u8) -> Self {
        Self::from_index(self.index().wrapping_add(steps))
    }
}

/// What occupies the surface of a cell.
///
/// Minerals are deliberately not a variant: they are sub-surface resource
/// carried by every cell regardless of what sits on top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Surface {
    #[default]
    Empty,
    Wall,
    /// Occupied by the one live bot with this id.
    Bot(BotId),
    /// Decaying matter with a non-negative quantity, subject to gravity.
    Organic(f32),
}

/// One grid position: a surface plus its independent mineral reserve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Cell {
    pub surface: Surface,
    pub minerals: f32,
}

/// Errors raised when constructing a world.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("world dimensions {width}x{height} too small; both axes must be at least {MIN_WORLD_DIM}")]
    DimensionsTooSmall { width: usize, height: usize },
}

/// The shared grid world: walls, minerals, organic matter, bot occupancy.
///
/// The x axis wraps toroidally; the y axis clamps. Row `0` and row
/// `height - 1` are permanent walls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl World {
    /// Build a walled world with the mineral band pre-seeded in the lower half.
    pub fn new(width: usize, height: usize) -> Result<Self, WorldError> {
        if width < MIN_WORLD_DIM || height < MIN_WORLD_DIM {
            return Err(WorldError::DimensionsTooSmall { width, height });
        }
        let mut cells = vec![Cell::default(); width * height];
        for x in 0..width {
            cells[x].surface = Surface::Wall;
            cells[(height - 1) * width + x].surface = Surface::Wall;
        }
        // Minerals increase with depth and stop above the bottom wall.
        let band_top = (height as f32 * MINERALS_BAND_TOP_FRAC) as usize;
        for y in band_top..height - 1 {
            let depth_factor = (y - band_top + 1) as f32;
            let seeded = MINERALS_BASE_PER_CELL + depth_factor * MINERALS_DEPTH_MULT * MINERALS_BASE_PER_CELL;
            for x in 0..width {
                cells[y * width + x].minerals = seeded;
            }
        }
        Ok(Self { width, height, cells })
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells, wall rows included.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height, "unwrapped coordinate reached cell access");
        y * self.width + x
    }

    /// Reduce an x coordinate into `[0, width)`, wrapping negatives.
    #[must_use]
    pub fn wrap_x(&self, x: i32) -> usize {
        x.rem_euclid(self.width as i32) as usize
    }

    /// Saturate a y coordinate into `[0, height)`.
    #[must_use]
    pub fn clamp_y(&self, y: i32) -> usize {
        y.clamp(0, self.height as i32 - 1) as usize
    }

    /// Whether `(x, y)` lies inside the grid and off the wall rows.
    #[must_use]
    pub fn in_bounds_playable(&self, x: usize, y: usize) -> bool {
        x < self.width && y > 0 && y < self.height - 1
    }

    /// Cell at already-wrapped/clamped coordinates.
    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        &self.cells[self.offset(x, y)]
    }

    /// Mutable cell access at already-wrapped/clamped coordinates.
    pub fn cell_mut(&mut self, x: usize, y: usize) -> &mut Cell {
        let idx = self.offset(x, y);
        &mut self.cells[idx]
    }

    /// Mark a cell as occupied by `occupant`, or clear bot occupancy when
    /// `None` (a no-op unless the cell currently holds a bot).
    pub fn set_bot(&mut self, x: usize, y: usize, occupant: Option<BotId>) {
        let cell = self.cell_mut(x, y);
        match occupant {
            Some(id) => cell.surface = Surface::Bot(id),
            None => {
                if matches!(cell.surface, Surface::Bot(_)) {
                    cell.surface = Surface::Empty;
                }
            }
        }
    }

    /// Force a cell to `Empty`, discarding any surface payload. Minerals persist.
    pub fn set_empty(&mut self, x: usize, y: usize) {
        self.cell_mut(x, y).surface = Surface::Empty;
    }

    /// Mark a cell `Organic`, stacking a non-negative amount onto whatever
    /// organic quantity is already there.
    pub fn add_organic(&mut self, x: usize, y: usize, amount: f32) {
        let cell = self.cell_mut(x, y);
        let existing = match cell.surface {
            Surface::Organic(quantity) => quantity,
            _ => 0.0,
        };
        cell.surface = Surface::Organic(existing + amount.max(0.0));
    }

    /// Advance world physics by one tick: organic matter sinks one row.
    ///
    /// The sweep runs bottom-to-top in a single pass, which bounds every unit
    /// of organic matter to at most one row of fall per tick: a row already
    /// visited this tick is never revisited.
    pub fn tick_physics(&mut self) {
        for y in (1..self.height - 1).rev() {
            for x in 0..self.width {
                let here = self.offset(x, y);
                let below = self.offset(x, y + 1);
                if let Surface::Organic(quantity) = self.cells[here].surface
                    && quantity > 0.0
                    && matches!(self.cells[below].surface, Surface::Empty)
                {
                    self.cells[below].surface = Surface::Organic(quantity);
                    self.cells[here].surface = Surface::Empty;
                }
            }
        }
    }

    /// Photosynthesis yield at row `y`: maximal at the first playable row,
    /// falling off linearly to zero at the vertical midpoint.
    #[must_use]
    pub fn photo_energy_at(&self, y: usize) -> i32 {
        if y >= self.height / 2 {
            return 0;
        }
        let top_playable = 1;
        let depth = y.saturating_sub(top_playable);
        let span = (self.height / 2 - top_playable).max(1);
        let level = (1.0 - depth as f32 / span as f32).max(0.0);
        ((PHOTO_BASE_TOP as f32 * level) as i32).max(0)
    }
}

/// Errors raised when validating a genome supplied by a caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenomeError {
    #[error("genome must contain exactly {GENOME_SIZE} codes, got {0}")]
    WrongLength(usize),
    #[error("genome code {value} at position {index} exceeds {GENOME_CODE_MAX}")]
    CodeOutOfRange { index: usize, value: u8 },
}

/// A bot's program: `GENOME_SIZE` codes in `[0, GENOME_CODE_MAX]`, read
/// circularly. A code is an instruction when the instruction pointer rests on
/// it and operand data when referenced relative to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genome {
    codes: [u8; GENOME_SIZE],
}

impl Genome {
    /// Validate and adopt a caller-supplied code sequence.
    pub fn new(codes: &[u8]) -> Result<Self, GenomeError> {
        if codes.len() != GENOME_SIZE {
            return Err(GenomeError::WrongLength(codes.len()));
        }
        for (index, &value) in codes.iter().enumerate() {
            if value > GENOME_CODE_MAX {
                return Err(GenomeError::CodeOutOfRange { index, value });
            }
        }
        let mut adopted = [0u8; GENOME_SIZE];
        adopted.copy_from_slice(codes);
        Ok(Self { codes: adopted })
    }

    /// A genome filled with a single repeated code.
    pub fn uniform(code: u8) -> Result<Self, GenomeError> {
        if code > GENOME_CODE_MAX {
            return Err(GenomeError::CodeOutOfRange { index: 0, value: code });
        }
        Ok(Self { codes: [code; GENOME_SIZE] })
    }

    /// Code at `at`, reduced modulo the genome length.
    #[must_use]
    pub fn code(&self, at: usize) -> u8 {
        self.codes[at % GENOME_SIZE]
    }

    /// Raw code view.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.codes
    }

    /// Two genomes are the same species iff they differ in at most one
    /// position. Exits on the second difference.
    #[must_use]
    pub fn same_species(&self, other: &Self) -> bool {
        let mut differences = 0;
        for (a, b) in self.codes.iter().zip(other.codes.iter()) {
            if a != b {
                differences += 1;
                if differences > 1 {
                    return false;
                }
            }
        }
        true
    }
}

/// Instructions the genome interpreter understands. Any code that decodes to
/// `None` acts as an unconditional relative jump by its own value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Photosynthesis,
    TurnAbsolute,
    Step,
    Look,
    Eat,
    Share,
    EnergyCompare,
    Mine,
    TurnRelative,
}

impl Opcode {
    /// Decode a genome code into an instruction, if it names one.
    #[must_use]
    pub const fn decode(code: u8) -> Option<Self> {
        match code {
            23 => Some(Self::Photosynthesis),
            25 => Some(Self::TurnAbsolute),
            26 => Some(Self::Step),
            30 => Some(Self::Look),
            31 => Some(Self::Eat),
            32 => Some(Self::Share),
            33 => Some(Self::EnergyCompare),
            34 => Some(Self::Mine),
            35 => Some(Self::TurnRelative),
            _ => None,
        }
    }

    /// The genome code naming this instruction.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Photosynthesis => 23,
            Self::TurnAbsolute => 25,
            Self::Step => 26,
            Self::Look => 30,
            Self::Eat => 31,
            Self::Share => 32,
            Self::EnergyCompare => 33,
            Self::Mine => 34,
            Self::TurnRelative => 35,
        }
    }
}

/// Scheduler services injected into a bot's turn: lookup of other live bots
/// and the predation ledger. Built by [`Simulation::step`] from the
/// population split around the acting bot.
pub struct TurnContext<'a> {
    before: &'a mut [Bot],
    after: &'a mut [Bot],
    consumed: &'a mut HashSet<BotId>,
}

impl<'a> TurnContext<'a> {
    /// Assemble a context over the rest of the population.
    #[must_use]
    pub fn new(before: &'a mut [Bot], after: &'a mut [Bot], consumed: &'a mut HashSet<BotId>) -> Self {
        Self { before, after, consumed }
    }

    /// Find another live bot by id. A miss means the target is already gone
    /// and the caller degrades to its no-target behavior.
    #[must_use]
    pub fn lookup_mut(&mut self, id: BotId) -> Option<&mut Bot> {
        self.before
            .iter_mut()
            .chain(self.after.iter_mut())
            .find(|bot| bot.id == id)
    }

    /// Record a bot as consumed by predation so its removal skips the
    /// organic deposit.
    pub fn mark_consumed(&mut self, id: BotId) {
        self.consumed.insert(id);
    }
}

/// Caller-supplied data for introducing a bot; the simulation assigns the id.
#[derive(Debug, Clone)]
pub struct BotSeed {
    pub genome: Genome,
    pub x: usize,
    pub y: usize,
    pub energy: i32,
}

/// An energy-driven agent: genome program, grid position, facing, instruction
/// pointer, and energy. Negative energy marks death.
#[derive(Debug, Clone)]
pub struct Bot {
    id: BotId,
    genome: Genome,
    x: usize,
    y: usize,
    dir: Direction,
    ip: usize,
    energy: i32,
    executed_nonterm: u32,
}

impl Bot {
    /// Identifier assigned at registration.
    #[must_use]
    pub const fn id(&self) -> BotId {
        self.id
    }

    /// Current grid position.
    #[must_use]
    pub const fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    /// Current facing.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.dir
    }

    /// Current instruction pointer, always in `[0, GENOME_SIZE)`.
    #[must_use]
    pub const fn ip(&self) -> usize {
        self.ip
    }

    /// Current energy; may transiently exceed [`MAX_ENERGY`].
    #[must_use]
    pub const fn energy(&self) -> i32 {
        self.energy
    }

    /// The bot's program.
    #[must_use]
    pub const fn genome(&self) -> &Genome {
        &self.genome
    }

    #[inline]
    fn advance_ip(&mut self, by: usize) {
        self.ip = (self.ip + by) % GENOME_SIZE;
    }

    #[inline]
    fn jump(&mut self, offset: u8) {
        self.advance_ip(offset as usize);
    }

    fn facing_cell(&self, world: &World) -> (usize, usize) {
        let (dx, dy) = self.dir.delta();
        (world.wrap_x(self.x as i32 + dx), world.clamp_y(self.y as i32 + dy))
    }

    /// Branch operand for a plain kind-keyed selection: Empty, Bot, Organic,
    /// Wall read the codes at `ip+1` through `ip+4`.
    fn branch_operand(&self, surface: Surface) -> u8 {
        let slot = match surface {
            Surface::Empty => 1,
            Surface::Bot(_) => 2,
            Surface::Organic(_) => 3,
            Surface::Wall => 4,
        };
        self.genome.code(self.ip + slot)
    }

    /// Execute one scheduled turn: instructions run from the current `ip`
    /// until a terminating instruction fires or [`VM_MAX_NONTERMINATING`]
    /// non-terminating instructions have executed. Basal metabolism is
    /// charged exactly once on exit, whichever path ended the turn.
    pub fn run_turn(&mut self, world: &mut World, ctx: &mut TurnContext<'_>) {
        self.executed_nonterm = 0;

        while self.executed_nonterm < VM_MAX_NONTERMINATING {
            let code = self.genome.code(self.ip);
            match Opcode::decode(code) {
                Some(Opcode::Photosynthesis) => {
                    self.energy += world.photo_energy_at(self.y);
                    self.advance_ip(1);
                    break;
                }
                Some(Opcode::TurnAbsolute) => {
                    let operand = self.genome.code(self.ip + 1);
                    self.dir = Direction::from_index(operand);
                    self.advance_ip(2);
                    self.executed_nonterm += 1;
                }
                Some(Opcode::TurnRelative) => {
                    let operand = self.genome.code(self.ip + 1);
                    self.dir = self.dir.rotated(operand % 8);
                    self.advance_ip(2);
                    self.executed_nonterm += 1;
                }
                Some(Opcode::Look) => {
                    let (nx, ny) = self.facing_cell(world);
                    let branch = self.branch_operand(world.cell(nx, ny).surface);
                    self.jump(branch);
                    self.executed_nonterm += 1;
                }
                Some(Opcode::Step) => {
                    let (nx, ny) = self.facing_cell(world);
                    let target = world.cell(nx, ny).surface;
                    let branch = if matches!(target, Surface::Empty) {
                        world.set_empty(self.x, self.y);
                        self.x = nx;
                        self.y = ny;
                        world.set_bot(nx, ny, Some(self.id));
                        self.genome.code(self.ip + 1)
                    } else {
                        self.branch_operand(target)
                    };
                    // The attempt costs energy whether or not the move landed.
                    self.energy -= MOVE_COST;
                    self.jump(branch);
                    break;
                }
                Some(Opcode::Eat) => {
                    let (nx, ny) = self.facing_cell(world);
                    let branch = match world.cell(nx, ny).surface {
                        Surface::Bot(prey_id) => {
                            let mut devoured = false;
                            if let Some(prey) = ctx.lookup_mut(prey_id)
                                && prey.energy >= 0
                            {
                                self.energy += prey.energy.max(0);
                                prey.energy = DEATH_SENTINEL;
                                devoured = true;
                            }
                            if devoured {
                                ctx.mark_consumed(prey_id);
                            }
                            self.genome.code(self.ip + 2)
                        }
                        Surface::Organic(quantity) if quantity > 0.0 => {
                            let eaten = quantity.min(ORGANIC_EAT_MAX);
                            let remaining = quantity - eaten;
                            self.energy += eaten as i32;
                            if remaining <= 0.0 {
                                world.set_empty(nx, ny);
                            } else {
                                world.cell_mut(nx, ny).surface = Surface::Organic(remaining);
                            }
                            self.genome.code(self.ip + 3)
                        }
                        Surface::Empty => self.genome.code(self.ip + 1),
                        // Walls, and organic already picked clean.
                        _ => self.genome.code(self.ip + 4),
                    };
                    self.energy -= EAT_COST;
                    self.jump(branch);
                    break;
                }
                Some(Opcode::Share) => {
                    let (nx, ny) = self.facing_cell(world);
                    let target = world.cell(nx, ny).surface;
                    let branch = if let Surface::Bot(other_id) = target {
                        if let Some(other) = ctx.lookup_mut(other_id)
                            && self.genome.same_species(&other.genome)
                            && self.energy > 1
                        {
                            let give = (self.energy / 4).max(1).min(self.energy - 1);
                            self.energy -= give;
                            other.energy = (other.energy + give).min(MAX_ENERGY);
                        }
                        self.genome.code(self.ip + 2)
                    } else {
                        self.branch_operand(target)
                    };
                    self.energy -= SHARE_COST;
                    self.jump(branch);
                    break;
                }
                Some(Opcode::EnergyCompare) => {
                    let threshold = i32::from(self.genome.code(self.ip + 1)) * ENERGY_COMPARE_UNIT;
                    let ge_branch = self.genome.code(self.ip + 2);
                    let lt_branch = self.genome.code(self.ip + 3);
                    let branch = if self.energy >= threshold { ge_branch } else { lt_branch };
                    self.jump(branch);
                    self.executed_nonterm += 1;
                }
                Some(Opcode::Mine) => {
                    let cell = world.cell_mut(self.x, self.y);
                    if cell.minerals > 0.0 {
                        let mined = cell.minerals.min(MINE_MAX_PER_ACTION);
                        cell.minerals -= mined;
                        self.energy += (mined * MINE_EFFICIENCY) as i32;
                    }
                    self.advance_ip(1);
                    break;
                }
                None => {
                    // Undefined codes are unconditional relative jumps.
                    self.jump(code);
                    self.executed_nonterm += 1;
                }
            }
        }

        self.energy -= BASE_METABOLISM;
    }

    /// Scan the eight neighbors clockwise from the current facing for an
    /// empty playable cell.
    fn find_child_cell(&self, world: &World) -> Option<(usize, usize)> {
        for offset in 0..8 {
            let (dx, dy) = self.dir.rotated(offset).delta();
            let nx = world.wrap_x(self.x as i32 + dx);
            let ny = world.clamp_y(self.y as i32 + dy);
            if !world.in_bounds_playable(nx, ny) {
                continue;
            }
            if matches!(world.cell(nx, ny).surface, Surface::Empty) {
                return Some((nx, ny));
            }
        }
        None
    }

    /// Bud a child: costs the parent [`REPRODUCTION_COST`], which becomes the
    /// child's starting energy. The child inherits the parent's facing, gets
    /// a fresh instruction pointer, and mutates at most one genome code.
    /// Returns `None` when the parent cannot pay or no adjacent cell is free.
    fn clone_with_mutation(&mut self, child_id: BotId, world: &World, rng: &mut SmallRng) -> Option<Bot> {
        if self.energy < REPRODUCTION_COST {
            return None;
        }
        let (x, y) = self.find_child_cell(world)?;

        let mut genome = self.genome.clone();
        if rng.random::<f32>() < MUTATION_RATE {
            let index = rng.random_range(0..GENOME_SIZE);
            genome.codes[index] = rng.random_range(0..=GENOME_CODE_MAX);
        }

        self.energy -= REPRODUCTION_COST;
        Some(Bot {
            id: child_id,
            genome,
            x,
            y,
            dir: self.dir,
            ip: 0,
            energy: REPRODUCTION_COST,
            executed_nonterm: 0,
        })
    }

    /// Voluntary reproduction: only fires in the energy window between the
    /// threshold and the ceiling minus the reproduction cost.
    fn try_reproduce(&mut self, child_id: BotId, world: &World, rng: &mut SmallRng) -> Option<Bot> {
        if self.energy >= REPRODUCTION_THRESHOLD && self.energy <= MAX_ENERGY - REPRODUCTION_COST {
            self.clone_with_mutation(child_id, world, rng)
        } else {
            None
        }
    }
}

/// Static configuration supplied once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Grid width in cells.
    pub width: usize,
    /// Grid height in cells, wall rows included.
    pub height: usize,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 30,
            rng_seed: None,
        }
    }
}

impl SimConfig {
    /// The configured RNG, seeded from entropy when no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}

/// Point-in-time population summary for renderers and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Census {
    pub step: u64,
    pub population: usize,
    pub births: u64,
    pub deaths: u64,
    pub total_energy: i64,
}

/// The turn scheduler: an ordered round-robin ring of bots over a world.
///
/// One [`step`](Self::step) runs exactly one bot turn (or one corpse
/// removal), then ticks world physics once.
pub struct Simulation {
    config: SimConfig,
    world: World,
    bots: Vec<Bot>,
    next_id: u64,
    cursor: usize,
    consumed: HashSet<BotId>,
    steps: u64,
    births: u64,
    deaths: u64,
    rng: SmallRng,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("step", &self.steps)
            .field("population", &self.bots.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Simulation {
    /// Build a simulation over a freshly constructed world.
    pub fn new(config: SimConfig) -> Result<Self, WorldError> {
        let world = World::new(config.width, config.height)?;
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            world,
            bots: Vec::new(),
            next_id: 1,
            cursor: 0,
            consumed: HashSet::new(),
            steps: 0,
            births: 0,
            deaths: 0,
            rng,
        })
    }

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Read-only view of the world grid.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Ordered population ring, next-to-act order not implied.
    #[must_use]
    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    /// Number of live bots.
    #[must_use]
    pub fn population(&self) -> usize {
        self.bots.len()
    }

    /// Scheduler steps taken so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Current cursor index into the population ring.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Summarise the population for a display frame or report.
    #[must_use]
    pub fn census(&self) -> Census {
        Census {
            step: self.steps,
            population: self.bots.len(),
            births: self.births,
            deaths: self.deaths,
            total_energy: self.bots.iter().map(|bot| i64::from(bot.energy)).sum(),
        }
    }

    /// Register a caller-seeded bot: assigns the next id, inserts it at the
    /// cursor position, and places it on the grid.
    pub fn add_bot(&mut self, seed: BotSeed) -> BotId {
        debug_assert!(
            self.world.in_bounds_playable(seed.x, seed.y),
            "seed position must be playable"
        );
        let id = BotId(self.next_id);
        self.next_id += 1;
        let bot = Bot {
            id,
            genome: seed.genome,
            x: seed.x,
            y: seed.y,
            dir: Direction::North,
            ip: 0,
            energy: seed.energy,
            executed_nonterm: 0,
        };
        self.world.set_bot(bot.x, bot.y, Some(id));
        self.bots.insert(self.cursor.min(self.bots.len()), bot);
        id
    }

    /// Advance the simulation by exactly one bot turn plus one physics tick.
    pub fn step(&mut self) {
        self.steps += 1;

        if self.bots.is_empty() {
            self.world.tick_physics();
            return;
        }

        // A bot killed earlier this pass loses its turn entirely.
        if self.bots[self.cursor].energy < 0 {
            self.remove_dead_at(self.cursor);
            self.advance_cursor();
            self.world.tick_physics();
            return;
        }

        let (before, rest) = self.bots.split_at_mut(self.cursor);
        if let Some((bot, after)) = rest.split_first_mut() {
            let mut ctx = TurnContext::new(before, after, &mut self.consumed);
            bot.run_turn(&mut self.world, &mut ctx);
        }

        if self.bots[self.cursor].energy < 0 {
            self.remove_dead_at(self.cursor);
        } else {
            self.process_reproduction();
        }

        self.advance_cursor();
        self.world.tick_physics();
    }

    /// Reproduction bookkeeping for the bot at the cursor. At the energy
    /// ceiling budding is forced and failure to find space is fatal; in the
    /// voluntary window a failed attempt is simply skipped.
    fn process_reproduction(&mut self) {
        let child_id = BotId(self.next_id);
        let forced = self.bots[self.cursor].energy >= MAX_ENERGY;
        let child = if forced {
            self.bots[self.cursor].clone_with_mutation(child_id, &self.world, &mut self.rng)
        } else {
            self.bots[self.cursor].try_reproduce(child_id, &self.world, &mut self.rng)
        };

        match child {
            Some(child) => {
                self.world.set_bot(child.x, child.y, Some(child.id));
                // Inserting at the cursor defers the child's first turn to
                // the next pass around the ring.
                self.bots.insert(self.cursor, child);
                self.next_id += 1;
                self.births += 1;
            }
            None if forced => {
                self.bots[self.cursor].energy = DEATH_SENTINEL;
            }
            None => {}
        }
    }

    fn advance_cursor(&mut self) {
        if self.bots.is_empty() {
            self.cursor = 0;
        } else {
            self.cursor = (self.cursor + 1) % self.bots.len();
        }
    }

    /// Remove a dead bot from the ring. Unless it was consumed by predation,
    /// its non-negative remainder is deposited as organic matter at its last
    /// cell; the deposit itself flips the cell off `Bot`, so the occupancy
    /// clear below only fires for predation corpses.
    fn remove_dead_at(&mut self, index: usize) {
        let bot = self.bots.remove(index);
        self.deaths += 1;
        let consumed = self.consumed.remove(&bot.id);

        let occupies = |world: &World| matches!(world.cell(bot.x, bot.y).surface, Surface::Bot(id) if id == bot.id);

        if !consumed && occupies(&self.world) {
            self.world.add_organic(bot.x, bot.y, bot.energy.max(0) as f32);
        }
        if occupies(&self.world) {
            self.world.set_empty(bot.x, bot.y);
        }
        if self.cursor >= self.bots.len() {
            self.cursor = 0;
        }
    }
}
