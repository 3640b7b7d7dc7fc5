use std::fmt;

use rgb_entity::LevelCallback;

use crate::mob::Mob;

/// Running totals of lifecycle callbacks. `tracked` and `ticking` are the
/// current number of entities in each state.
#[derive(Debug, Default)]
pub struct Counters {
    pub created: u64,
    pub destroyed: u64,
    pub section_changes: u64,
    pub tracked: i64,
    pub ticking: i64,
}

impl LevelCallback<Mob> for Counters {
    fn on_created(&mut self, _: &Mob) {
        self.created += 1;
    }

    fn on_destroyed(&mut self, _: &Mob) {
        self.destroyed += 1;
    }

    fn on_tracking_start(&mut self, _: &Mob) {
        self.tracked += 1;
    }

    fn on_tracking_end(&mut self, _: &Mob) {
        self.tracked -= 1;
    }

    fn on_ticking_start(&mut self, _: &Mob) {
        self.ticking += 1;
    }

    fn on_ticking_end(&mut self, _: &Mob) {
        self.ticking -= 1;
    }

    fn on_section_change(&mut self, _: &Mob) {
        self.section_changes += 1;
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} destroyed={} tracked={} ticking={} section_changes={}",
            self.created, self.destroyed, self.tracked, self.ticking, self.section_changes
        )
    }
}
