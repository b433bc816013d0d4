//! Per-player match statistics and end-of-match scoring

/// Accumulated combat stats for one player, finalized at match end
#[derive(Debug, Clone, Default)]
pub struct PlayerStats {
    pub shells_used: u32,
    pub total_damage: f32,
    pub points: u32,
}

impl PlayerStats {
    pub fn log_shell_used(&mut self) {
        self.shells_used += 1;
    }

    pub fn log_damage(&mut self, amount: f32) {
        self.total_damage += amount;
    }

    /// Compute final points: accuracy-weighted shell economy (20%) plus damage
    /// output (80%). Zero shells fired scores zero outright.
    pub fn calc_points(&self) -> u32 {
        if self.shells_used == 0 {
            return 0;
        }
        (((3.0 / self.shells_used as f64) * 0.2 + (self.total_damage as f64 / 100.0) * 0.8)
            * 100.0)
            .floor() as u32
    }

    /// Finalize points from the accumulated stats
    pub fn finalize(&mut self) {
        self.points = self.calc_points();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_shells_scores_zero_regardless_of_damage() {
        let stats = PlayerStats {
            shells_used: 0,
            total_damage: 500.0,
            points: 0,
        };
        assert_eq!(stats.calc_points(), 0);
    }

    #[test]
    fn three_shells_full_damage_scores_one_hundred() {
        let stats = PlayerStats {
            shells_used: 3,
            total_damage: 100.0,
            points: 0,
        };
        // (3/3 * 0.2 + 100/100 * 0.8) * 100 = 100
        assert_eq!(stats.calc_points(), 100);
    }

    #[test]
    fn points_floor_rather_than_round() {
        let stats = PlayerStats {
            shells_used: 7,
            total_damage: 55.0,
            points: 0,
        };
        // (3/7 * 0.2 + 55/100 * 0.8) * 100 = 52.571... -> 52
        assert_eq!(stats.calc_points(), 52);
    }

    #[test]
    fn finalize_stores_computed_points() {
        let mut stats = PlayerStats::default();
        stats.log_shell_used();
        stats.log_shell_used();
        stats.log_damage(30.0);
        stats.log_damage(25.0);
        stats.finalize();
        // (3/2 * 0.2 + 55/100 * 0.8) * 100 = 74
        assert_eq!(stats.points, 74);
    }
}
