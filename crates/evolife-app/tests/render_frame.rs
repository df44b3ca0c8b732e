use evolife_app::terminal::{Palette, render_frame};
use evolife_core::{BotSeed, Genome, INITIAL_ENERGY, Opcode, SimConfig, Simulation};
use ratatui::{Terminal, backend::TestBackend};

fn seeded_sim() -> Simulation {
    let mut sim = Simulation::new(SimConfig {
        width: 40,
        height: 12,
        rng_seed: Some(5),
    })
    .expect("simulation");
    sim.add_bot(BotSeed {
        genome: Genome::uniform(Opcode::Photosynthesis.code()).expect("genome"),
        x: 20,
        y: 2,
        energy: INITIAL_ENERGY,
    });
    sim
}

#[test]
fn frame_shows_header_walls_and_the_seeded_bot() {
    let sim = seeded_sim();
    let backend = TestBackend::new(72, 20);
    let mut terminal = Terminal::new(backend).expect("terminal");
    let palette = Palette::monochrome();

    terminal
        .draw(|frame| render_frame(frame, &sim, &palette, "paused"))
        .expect("draw");

    let buffer = terminal.backend().buffer();
    let header: String = (0..72).map(|x| buffer[(x, 0)].symbol().to_string()).collect();
    assert!(header.contains("EvoLife"));
    assert!(header.contains("step 0"));
    assert!(header.contains("pop 1"));
    assert!(header.contains("paused"));

    // The grid starts on the row under the header: wall rows top and bottom,
    // the seeded bot at its world position.
    assert_eq!(buffer[(0, 1)].symbol(), "#");
    assert_eq!(buffer[(39, 1)].symbol(), "#");
    assert_eq!(buffer[(0, 12)].symbol(), "#");
    assert_eq!(buffer[(20, 3)].symbol(), "B");
    assert_eq!(buffer[(20, 4)].symbol(), " ");
}

#[test]
fn frame_clips_to_a_small_backend_without_panicking() {
    let sim = seeded_sim();
    let backend = TestBackend::new(10, 4);
    let mut terminal = Terminal::new(backend).expect("terminal");
    let palette = Palette::monochrome();

    terminal
        .draw(|frame| render_frame(frame, &sim, &palette, "x1.0"))
        .expect("draw");

    let buffer = terminal.backend().buffer();
    assert_eq!(buffer[(0, 1)].symbol(), "#");
}
