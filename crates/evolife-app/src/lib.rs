//! Application plumbing for the EvoLife binary: a fullscreen terminal
//! renderer and a CI-friendly headless runner over the core simulation.

pub mod headless;
pub mod terminal;

/// Run-loop knobs shared by the renderer entry points.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Auto-stepping stops once the simulation reaches this step count.
    pub steps: u64,
    /// Target draw rate; also the base stepping rate at speed x1.
    pub fps: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { steps: 2000, fps: 15 }
    }
}
