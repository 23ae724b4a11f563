//! Frame sequencer: step the grid, render, hand off to the wallpaper setter,
//! cull old frames, sleep, repeat until asked to stop.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::SequencerConfig;
use crate::constants::frames::EXTENSION;
use crate::constants::timing::STOP_POLL_MS;
use crate::grid::Grid;
use crate::render::render;
use crate::wallpaper::WallpaperSetter;

/// What happened during one pass of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Frame written and handed to the setter; grid advanced
    Displayed,
    /// Render or save failed; grid and counter unchanged
    RenderFailed,
}

/// Owns the simulation state and drives the wallpaper loop
pub struct FrameSequencer<S: WallpaperSetter> {
    config: SequencerConfig,
    grid: Grid,
    iteration: u64,
    setter: S,
    stop: Arc<AtomicBool>,
}

impl<S: WallpaperSetter> FrameSequencer<S> {
    pub fn new(config: SequencerConfig, grid: Grid, setter: S, stop: Arc<AtomicBool>) -> Result<Self> {
        config.validate()?;
        anyhow::ensure!(
            grid.cols() == config.cols && grid.rows() == config.rows,
            "Initial grid is {}x{} but configuration expects {}x{}",
            grid.cols(),
            grid.rows(),
            config.cols,
            config.rows
        );
        Ok(Self {
            config,
            grid,
            iteration: 0,
            setter,
            stop,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Completed render+display cycles so far
    #[cfg(test)]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    #[cfg(test)]
    pub fn setter(&self) -> &S {
        &self.setter
    }

    /// `{base}_{iteration}.png`, no zero padding
    pub fn frame_path(&self, iteration: u64) -> PathBuf {
        let mut name = self.config.base_path.clone().into_os_string();
        name.push(format!("_{iteration}.{EXTENSION}"));
        PathBuf::from(name)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Run cycles until the stop flag is raised; returns the number of frames displayed
    pub fn run(&mut self) -> u64 {
        info!(
            base_path = %self.config.base_path.display(),
            cols = self.config.cols,
            rows = self.config.rows,
            cell_size = self.config.cell_size,
            interval_ms = self.config.interval.as_millis() as u64,
            "Frame sequencer started"
        );
        let start_iteration = self.iteration;
        while !self.stop_requested() {
            self.run_cycle();
        }
        let displayed = self.iteration - start_iteration;
        info!(frames = displayed, iteration = self.iteration, "Frame sequencer stopped");
        displayed
    }

    /// One pass: render, display, advance, sleep, cull
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let path = self.frame_path(self.iteration);
        let outcome = match self.render_frame(&path) {
            Ok(()) => {
                if let Err(e) = self.setter.apply(&path) {
                    error!(path = %path.display(), error = ?e, "Failed to set wallpaper");
                }
                debug!(
                    iteration = self.iteration,
                    path = %path.display(),
                    population = self.grid.population(),
                    "Wallpaper updated"
                );
                self.iteration += 1;
                self.grid = self.grid.step();
                CycleOutcome::Displayed
            }
            Err(e) => {
                error!(path = %path.display(), error = ?e, "Failed to render frame");
                CycleOutcome::RenderFailed
            }
        };

        self.sleep();

        if self.iteration > 1 {
            self.cull(self.iteration - 2);
        }
        outcome
    }

    fn render_frame(&self, path: &std::path::Path) -> Result<()> {
        let frame = render(&self.grid, self.config.cell_size)
            .context(format!("Failed to render iteration {}", self.iteration))?;
        frame.save(path)
    }

    /// Wait out the frame interval, waking early if a stop is requested
    fn sleep(&self) {
        let deadline = Instant::now() + self.config.interval;
        loop {
            if self.stop_requested() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(STOP_POLL_MS)));
        }
    }

    /// Delete an old frame; a frame that is already gone is fine
    fn cull(&self, iteration: u64) {
        let path = self.frame_path(iteration);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed old frame"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!(path = %path.display(), error = ?e, "Failed to remove old frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Records every applied path and whether the previous frame was still on disk
    #[derive(Default)]
    struct RecordingSetter {
        applied: Vec<PathBuf>,
        previous_present: Vec<bool>,
        fail: bool,
        stop_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl WallpaperSetter for RecordingSetter {
        fn apply(&mut self, path: &Path) -> Result<()> {
            assert!(path.exists(), "setter received missing frame {}", path.display());
            if let Some(prev) = self.applied.last() {
                self.previous_present.push(prev.exists());
            }
            self.applied.push(path.to_path_buf());
            if let Some((limit, stop)) = &self.stop_after {
                if self.applied.len() >= *limit {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            if self.fail {
                anyhow::bail!("display unavailable");
            }
            Ok(())
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("life-wallpaper-seq-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(base_path: PathBuf) -> SequencerConfig {
        SequencerConfig {
            base_path,
            cols: 8,
            rows: 8,
            cell_size: 2,
            interval: Duration::ZERO,
        }
    }

    fn glider() -> Grid {
        Grid::with_live_cells(8, 8, &[(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)]).unwrap()
    }

    fn sequencer(base: PathBuf, setter: RecordingSetter) -> FrameSequencer<RecordingSetter> {
        FrameSequencer::new(config(base), glider(), setter, Arc::new(AtomicBool::new(false))).unwrap()
    }

    #[test]
    fn test_frame_path_naming() {
        let seq = sequencer(PathBuf::from("/tmp/walls/life"), RecordingSetter::default());
        assert_eq!(seq.frame_path(0), PathBuf::from("/tmp/walls/life_0.png"));
        assert_eq!(seq.frame_path(12), PathBuf::from("/tmp/walls/life_12.png"));
    }

    #[test]
    fn test_new_rejects_mismatched_grid() {
        let grid = Grid::new(4, 4).unwrap();
        let result = FrameSequencer::new(
            config(PathBuf::from("/tmp/frame")),
            grid,
            RecordingSetter::default(),
            Arc::new(AtomicBool::new(false)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_rejects_zero_cell_size() {
        let mut cfg = config(PathBuf::from("/tmp/frame"));
        cfg.cell_size = 0;
        let result = FrameSequencer::new(cfg, glider(), RecordingSetter::default(), Arc::new(AtomicBool::new(false)));
        assert!(result.is_err());
    }

    #[test]
    fn test_cycle_displays_and_advances() {
        let dir = temp_dir("advance");
        let mut seq = sequencer(dir.join("life"), RecordingSetter::default());
        let expected_next = seq.grid().step();

        assert_eq!(seq.run_cycle(), CycleOutcome::Displayed);
        assert_eq!(seq.iteration(), 1);
        assert_eq!(seq.grid(), &expected_next);
        assert_eq!(seq.setter().applied, vec![dir.join("life_0.png")]);
        assert!(dir.join("life_0.png").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_retention_keeps_previous_frame_during_display() {
        let dir = temp_dir("retention");
        let mut seq = sequencer(dir.join("life"), RecordingSetter::default());

        for k in 1..=5u64 {
            seq.run_cycle();
            assert_eq!(seq.iteration(), k);
            // Newest frame stays on disk
            assert!(seq.frame_path(k - 1).exists(), "frame {} missing after cycle {}", k - 1, k);
            if k >= 2 {
                assert!(!seq.frame_path(k - 2).exists(), "frame {} kept after cycle {}", k - 2, k);
            }
        }

        // When each new frame was applied, the one before it had not been deleted yet
        assert_eq!(seq.setter().previous_present, vec![true; 4]);

        let remaining = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(remaining, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_render_failure_skips_display_and_keeps_state() {
        let dir = temp_dir("failure");
        let base = dir.join("missing-subdir").join("life");
        let mut seq = sequencer(base, RecordingSetter::default());
        let before = seq.grid().clone();

        assert_eq!(seq.run_cycle(), CycleOutcome::RenderFailed);
        assert_eq!(seq.run_cycle(), CycleOutcome::RenderFailed);
        assert_eq!(seq.iteration(), 0);
        assert_eq!(seq.grid(), &before);
        assert!(seq.setter().applied.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_render_failure_still_culls_old_frame() {
        let dir = temp_dir("fail-cull");
        let mut seq = sequencer(dir.join("life"), RecordingSetter::default());
        seq.run_cycle();
        seq.run_cycle();
        assert_eq!(seq.iteration(), 2);

        // Stale frame 0 reappears; frame 2 cannot be written because a directory holds its name
        std::fs::write(seq.frame_path(0), b"stale").unwrap();
        std::fs::create_dir(seq.frame_path(2)).unwrap();

        assert_eq!(seq.run_cycle(), CycleOutcome::RenderFailed);
        assert_eq!(seq.iteration(), 2);
        assert!(!seq.frame_path(0).exists());
        assert!(seq.frame_path(1).exists());
        assert_eq!(seq.setter().applied.len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_setter_failure_does_not_stop_progress() {
        let dir = temp_dir("setter-fail");
        let setter = RecordingSetter { fail: true, ..Default::default() };
        let mut seq = sequencer(dir.join("life"), setter);

        assert_eq!(seq.run_cycle(), CycleOutcome::Displayed);
        assert_eq!(seq.run_cycle(), CycleOutcome::Displayed);
        assert_eq!(seq.iteration(), 2);
        assert_eq!(seq.setter().applied.len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_cull_missing_frame_is_silent() {
        let dir = temp_dir("cull");
        let mut seq = sequencer(dir.join("life"), RecordingSetter::default());
        seq.run_cycle();
        seq.run_cycle();

        // Frame 0 was culled by cycle 2; culling again must be harmless
        seq.cull(0);
        seq.cull(99);
        assert_eq!(seq.iteration(), 2);
        assert!(seq.frame_path(1).exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_stops_on_flag() {
        let dir = temp_dir("run");
        let stop = Arc::new(AtomicBool::new(false));
        let setter = RecordingSetter {
            stop_after: Some((3, Arc::clone(&stop))),
            ..Default::default()
        };
        let mut seq = FrameSequencer::new(config(dir.join("life")), glider(), setter, Arc::clone(&stop)).unwrap();

        assert_eq!(seq.run(), 3);
        assert_eq!(seq.iteration(), 3);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_returns_immediately_when_already_stopped() {
        let mut seq = FrameSequencer::new(
            config(PathBuf::from("/nonexistent/life")),
            glider(),
            RecordingSetter::default(),
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();
        assert_eq!(seq.run(), 0);
        assert!(seq.setter().applied.is_empty());
    }

    #[test]
    fn test_sleep_wakes_on_stop() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut cfg = config(PathBuf::from("/tmp/life"));
        cfg.interval = Duration::from_secs(30);
        let seq = FrameSequencer::new(cfg, glider(), RecordingSetter::default(), Arc::clone(&stop)).unwrap();

        let flag = Arc::clone(&stop);
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::Relaxed);
        });
        let started = Instant::now();
        seq.sleep();
        waker.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
