//! End-to-end scheduler scenarios: seeded runs driven only through the
//! public `Simulation` surface.

use evolife_core::{
    BASE_METABOLISM, BotId, BotSeed, Census, EAT_COST, Genome, INITIAL_ENERGY, Opcode,
    REPRODUCTION_COST, SimConfig, Simulation, Surface,
};

fn config(seed: u64) -> SimConfig {
    SimConfig {
        width: 80,
        height: 30,
        rng_seed: Some(seed),
    }
}

fn photosynthesiser() -> Genome {
    Genome::uniform(Opcode::Photosynthesis.code()).expect("valid genome")
}

fn idler() -> Genome {
    Genome::uniform(0).expect("valid genome")
}

/// Genome whose first instruction eats the facing cell; the branch operands
/// land on zero codes that park the instruction pointer.
fn eater() -> Genome {
    let mut codes = [0u8; 64];
    codes[0] = Opcode::Eat.code();
    Genome::new(&codes).expect("valid genome")
}

#[test]
fn seed_organism_grows_and_buds_before_the_parent() {
    let mut sim = Simulation::new(config(7)).expect("simulation");
    let parent = sim.add_bot(BotSeed {
        genome: photosynthesiser(),
        x: 40,
        y: 2,
        energy: INITIAL_ENERGY,
    });

    // Photosynthesis at row 2 of a height-30 world yields 7; each turn nets
    // +6 after metabolism: 20, 26, 32, 38, then 44 crosses the threshold.
    for expected in [26, 32, 38] {
        sim.step();
        assert_eq!(sim.bots()[0].energy(), expected);
        assert_eq!(sim.population(), 1);
    }

    sim.step();
    assert_eq!(sim.population(), 2);
    let census = sim.census();
    assert_eq!(census.births, 1);
    assert_eq!(census.deaths, 0);

    // The child sits before the parent in the ring, freshly initialised, and
    // spawned in the parent's facing cell.
    let child = &sim.bots()[0];
    assert_ne!(child.id(), parent);
    assert_eq!(child.energy(), REPRODUCTION_COST);
    assert_eq!(child.ip(), 0);
    assert_eq!(child.position(), (40, 1));
    let parent_bot = &sim.bots()[1];
    assert_eq!(parent_bot.id(), parent);
    assert_eq!(parent_bot.energy(), 44 - REPRODUCTION_COST);
    assert_eq!(
        sim.world().cell(40, 1).surface,
        Surface::Bot(child.id()),
    );

    // The parent acts again before the newborn gets its first turn.
    let child_id = child.id();
    sim.step();
    let newborn = sim
        .bots()
        .iter()
        .find(|b| b.id() == child_id)
        .expect("child alive");
    assert_eq!(newborn.ip(), 0);
    assert_eq!(newborn.energy(), REPRODUCTION_COST);
}

#[test]
fn starvation_leaves_a_decaying_cell() {
    let mut sim = Simulation::new(config(11)).expect("simulation");
    sim.add_bot(BotSeed {
        genome: idler(),
        x: 12,
        y: 20,
        energy: 3,
    });

    // 3, 2, 1, 0, then -1 on the fourth turn kills mid-step.
    for _ in 0..3 {
        sim.step();
        assert_eq!(sim.population(), 1);
    }
    sim.step();
    assert_eq!(sim.population(), 0);
    assert_eq!(sim.census().deaths, 1);
    // The corpse decays in place; nothing remains to deposit, but the cell
    // still flips to organic rather than being wiped.
    assert_eq!(sim.world().cell(12, 20).surface, Surface::Organic(0.0));
}

#[test]
fn predation_transfers_energy_and_clears_the_corpse() {
    let mut sim = Simulation::new(config(13)).expect("simulation");
    // The predator is registered second, which places it first in the ring.
    let prey = sim.add_bot(BotSeed {
        genome: idler(),
        x: 40,
        y: 2,
        energy: 20,
    });
    let predator = sim.add_bot(BotSeed {
        genome: eater(),
        x: 40,
        y: 3,
        energy: 20,
    });

    sim.step();
    let hunter = sim
        .bots()
        .iter()
        .find(|b| b.id() == predator)
        .expect("predator alive");
    assert_eq!(hunter.energy(), 20 + 20 - EAT_COST - BASE_METABOLISM);
    let victim = sim
        .bots()
        .iter()
        .find(|b| b.id() == prey)
        .expect("prey still scheduled");
    assert!(victim.energy() < 0);

    // The prey's next scheduling collects the corpse; eaten bots leave no
    // organic matter behind.
    sim.step();
    assert_eq!(sim.population(), 1);
    assert_eq!(sim.census().deaths, 1);
    assert_eq!(sim.world().cell(40, 2).surface, Surface::Empty);
}

#[test]
fn population_changes_by_at_most_one_per_step() {
    let mut sim = Simulation::new(config(17)).expect("simulation");
    sim.add_bot(BotSeed {
        genome: photosynthesiser(),
        x: 40,
        y: 2,
        energy: INITIAL_ENERGY,
    });

    let mut previous = sim.population();
    for _ in 0..500 {
        sim.step();
        let current = sim.population();
        assert!(current.abs_diff(previous) <= 1);
        previous = current;
    }
}

#[test]
fn occupancy_stays_consistent_across_a_long_run() {
    let mut sim = Simulation::new(config(19)).expect("simulation");
    sim.add_bot(BotSeed {
        genome: photosynthesiser(),
        x: 40,
        y: 2,
        energy: INITIAL_ENERGY,
    });

    // Every live bot owns its cell; the walls never erode.
    for _ in 0..2000 {
        sim.step();
        for bot in sim.bots() {
            if bot.energy() >= 0 {
                let (x, y) = bot.position();
                assert!(sim.world().in_bounds_playable(x, y));
                assert_eq!(sim.world().cell(x, y).surface, Surface::Bot(bot.id()));
            }
        }
        for x in 0..sim.world().width() {
            assert_eq!(sim.world().cell(x, 0).surface, Surface::Wall);
            assert_eq!(sim.world().cell(x, sim.world().height() - 1).surface, Surface::Wall);
        }
    }
}

#[test]
fn identical_seeds_produce_identical_census_traces() {
    let run = |seed: u64| -> Vec<Census> {
        let mut sim = Simulation::new(config(seed)).expect("simulation");
        sim.add_bot(BotSeed {
            genome: photosynthesiser(),
            x: 40,
            y: 2,
            energy: INITIAL_ENERGY,
        });
        (0..1000)
            .map(|_| {
                sim.step();
                sim.census()
            })
            .collect()
    };

    assert_eq!(run(42), run(42));
}

#[test]
fn bot_ids_are_never_reused() {
    let mut sim = Simulation::new(config(23)).expect("simulation");
    sim.add_bot(BotSeed {
        genome: photosynthesiser(),
        x: 40,
        y: 2,
        energy: INITIAL_ENERGY,
    });

    let mut seen: Vec<BotId> = Vec::new();
    for _ in 0..1000 {
        sim.step();
        for bot in sim.bots() {
            if !seen.contains(&bot.id()) {
                seen.push(bot.id());
            }
        }
    }
    // First appearances come in creation order, so ids strictly increase.
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(sim.census().births as usize + 1, seen.len());
}
