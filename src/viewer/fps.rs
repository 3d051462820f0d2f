use super::FPS_INTERVAL;

/// Frame rate and worst frame time, averaged over `FPS_INTERVAL`.
pub struct FpsCounter {
    fps: f64,
    worst_frame: f64,
    elapsed: f64,
    frames: u32,
    longest: f64,
}

impl FpsCounter {
    pub fn new() -> FpsCounter {
        FpsCounter {
            fps: 0.0,
            worst_frame: 0.0,
            elapsed: 0.0,
            frames: 0,
            longest: 0.0,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Longest frame of the last interval, in milliseconds.
    pub fn worst_frame_ms(&self) -> f64 {
        self.worst_frame * 1000.0
    }

    pub fn update(&mut self, dt: f64) {
        self.elapsed += dt;
        self.frames += 1;
        self.longest = self.longest.max(dt);

        if self.elapsed > FPS_INTERVAL {
            self.fps = self.frames as f64 / self.elapsed;
            self.worst_frame = self.longest;
            self.elapsed = 0.0;
            self.frames = 0;
            self.longest = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_the_interval() {
        let mut fps = FpsCounter::new();
        assert_eq!(fps.fps(), 0.0);
        for &dt in &[0.25, 0.25, 1.0, 0.25, 0.25] {
            fps.update(dt);
        }
        // Reaching exactly FPS_INTERVAL doesn't finish an interval
        assert_eq!(fps.fps(), 0.0);
        fps.update(0.25);
        assert!((fps.fps() - 6.0 / 2.25).abs() < 1e-9);
        assert!((fps.worst_frame_ms() - 1000.0).abs() < 1e-9);
    }
}
