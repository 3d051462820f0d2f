use std::default::Default;

/// Multipliers on the configured movement speed.
const FACTORS: [f32; 9] = [0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0];
const DEFAULT_LEVEL: u8 = 4;

/// Movement speed that advances in discrete steps.
pub struct SpeedLevel {
    level: u8,
}

impl SpeedLevel {
    pub fn speed_up(&mut self) {
        if self.level + 1 != FACTORS.len() as u8 {
            self.level += 1
        }
    }

    pub fn speed_down(&mut self) {
        if self.level != 0 {
            self.level -= 1
        }
    }

    pub fn factor(&self) -> f32 {
        FACTORS[self.level as usize]
    }
}

impl Default for SpeedLevel {
    fn default() -> SpeedLevel {
        SpeedLevel { level: DEFAULT_LEVEL }
    }
}

#[test]
fn test_speed_level_saturates() {
    let mut speed = SpeedLevel::default();
    assert_eq!(speed.factor(), 1.0);
    for _ in 0..20 {
        speed.speed_up();
    }
    assert_eq!(speed.factor(), 16.0);
    for _ in 0..20 {
        speed.speed_down();
    }
    assert_eq!(speed.factor(), 0.05);
}
