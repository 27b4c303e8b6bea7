use crate::{
    clock::LocalClock,
    schedule::Schedule,
    types::{Channel, ControllerStatus, Levels, Override},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    SetDuty { channel: Channel, duty: u8 },
}

/// Everything the tick and the control surface share: schedule, override,
/// local clock and the intensities last written to the outputs.
#[derive(Debug, Clone)]
pub struct LightingController {
    schedule: Schedule,
    overrule: Override,
    clock: LocalClock,
    // Outputs are driven to zero at startup.
    written: Levels,
}

impl LightingController {
    pub fn new(schedule: Schedule, clock: LocalClock) -> Self {
        Self {
            schedule,
            overrule: Override::default(),
            clock,
            written: Levels::default(),
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn snapshot(&self) -> [u8; crate::schedule::SLOT_COUNT] {
        *self.schedule.values()
    }

    /// Swaps in a whole new table and drops any active override.
    pub fn replace_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
        self.overrule.clear();
    }

    pub fn set_override(&mut self, a: u8, b: Option<u8>) -> Levels {
        self.overrule.set(a, b);
        self.overrule.get().unwrap_or_default()
    }

    pub fn clear_override(&mut self) -> bool {
        let was_active = self.overrule.is_active();
        self.overrule.clear();
        was_active
    }

    pub fn override_levels(&self) -> Option<Levels> {
        self.overrule.get()
    }

    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut LocalClock {
        &mut self.clock
    }

    pub fn intensities(&self) -> Levels {
        self.written
    }

    /// Intensities the outputs should show now, or `None` while the local hour
    /// is unknown.
    pub fn target(&self) -> Option<Levels> {
        let hour = self.clock.hour()?;
        let levels = self
            .overrule
            .get()
            .unwrap_or_else(|| self.schedule.levels_at(hour));
        Some(levels.clamped())
    }

    /// One control step. Returns a write only for channels whose target moved.
    pub fn tick(&mut self) -> Vec<OutputAction> {
        let Some(target) = self.target() else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        for channel in Channel::ALL {
            let duty = target.get(channel);
            if duty != self.written.get(channel) {
                self.written.set(channel, duty);
                actions.push(OutputAction::SetDuty { channel, duty });
            }
        }
        actions
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            time_synced: self.clock.is_synchronized(),
            local_time: self.clock.formatted(),
            timezone: self.clock.rules().label(),
            hour: self.clock.hour(),
            override_active: self.overrule.is_active(),
            override_levels: self.overrule.get(),
            scheduled_levels: self.clock.hour().map(|hour| self.schedule.levels_at(hour)),
            intensities: self.written,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schedule::SLOT_COUNT, timezone::TimeZoneRules};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    // Local time is `hour`:30 CET.
    fn synced_clock_at_local_hour(hour: u32) -> LocalClock {
        let mut clock = LocalClock::new(TimeZoneRules::default(), 600_000);
        let midnight = Utc.with_ymd_and_hms(2026, 1, 14, 23, 30, 0).unwrap();
        clock.sync(midnight + Duration::hours(hour as i64), 0);
        clock
    }

    fn evening_schedule() -> Schedule {
        let mut values = [0u8; SLOT_COUNT];
        values[Schedule::slot_index(20, Channel::A)] = 80;
        values[Schedule::slot_index(20, Channel::B)] = 40;
        Schedule::from_values(&values).unwrap()
    }

    fn evening_controller() -> LightingController {
        LightingController::new(evening_schedule(), synced_clock_at_local_hour(20))
    }

    fn set(channel: Channel, duty: u8) -> OutputAction {
        OutputAction::SetDuty { channel, duty }
    }

    #[test]
    fn evening_slot_written_once() {
        let mut controller = evening_controller();

        assert_eq!(
            controller.tick(),
            vec![set(Channel::A, 80), set(Channel::B, 40)]
        );
        assert_eq!(controller.intensities(), Levels::new(80, 40));
        assert!(controller.tick().is_empty());
    }

    #[test]
    fn target_follows_schedule_for_every_hour() {
        let values: Vec<u8> = (0..SLOT_COUNT as u8).collect();
        let schedule = Schedule::from_values(&values).unwrap();

        for hour in 0..24u32 {
            let clock = synced_clock_at_local_hour(hour);
            let controller = LightingController::new(schedule.clone(), clock);
            let slot = hour as usize * 2;
            let expected = Levels::new(values[slot], values[slot + 1]);
            assert_eq!(controller.target(), Some(expected), "hour {hour}");
        }
    }

    #[test]
    fn unsynchronized_clock_holds_outputs() {
        let clock = LocalClock::new(TimeZoneRules::default(), 600_000);
        let mut controller = LightingController::new(evening_schedule(), clock);
        controller.set_override(50, Some(50));

        assert_eq!(controller.target(), None);
        assert!(controller.tick().is_empty());
        assert_eq!(controller.intensities(), Levels::default());
    }

    #[test]
    fn override_supersedes_both_channels_until_replace() {
        let mut controller = evening_controller();
        controller.tick();

        controller.set_override(5, Some(5));
        assert_eq!(
            controller.tick(),
            vec![set(Channel::A, 5), set(Channel::B, 5)]
        );
        assert!(controller.tick().is_empty());

        controller.replace_schedule(evening_schedule());
        assert_eq!(controller.override_levels(), None);
        assert_eq!(
            controller.tick(),
            vec![set(Channel::A, 80), set(Channel::B, 40)]
        );
    }

    #[test]
    fn clear_override_restores_schedule() {
        let mut controller = evening_controller();
        controller.set_override(0, Some(40));
        assert_eq!(controller.tick(), vec![set(Channel::B, 40)]);

        assert!(controller.clear_override());
        assert!(!controller.clear_override());
        assert_eq!(controller.tick(), vec![set(Channel::A, 80)]);
    }

    #[test]
    fn override_without_second_value_keeps_previous_b() {
        let clock = synced_clock_at_local_hour(8);
        let mut controller = LightingController::new(Schedule::default(), clock);
        controller.set_override(10, Some(30));
        controller.replace_schedule(Schedule::default());

        assert_eq!(controller.set_override(60, None), Levels::new(60, 30));
    }

    #[test]
    fn out_of_range_slots_are_clamped() {
        let mut block = [0u8; SLOT_COUNT];
        block[Schedule::slot_index(20, Channel::A)] = 255;
        let mut controller =
            LightingController::new(Schedule::from_block(&block), synced_clock_at_local_hour(20));

        assert_eq!(controller.tick(), vec![set(Channel::A, 100)]);
    }

    #[test]
    fn hour_change_writes_only_changed_channel() {
        let mut values = [0u8; SLOT_COUNT];
        values[Schedule::slot_index(7, Channel::A)] = 30;
        values[Schedule::slot_index(7, Channel::B)] = 30;
        values[Schedule::slot_index(8, Channel::A)] = 30;
        values[Schedule::slot_index(8, Channel::B)] = 70;
        let mut controller = LightingController::new(
            Schedule::from_values(&values).unwrap(),
            synced_clock_at_local_hour(7),
        );
        controller.tick();

        controller.clock_mut().advance(Duration::hours(1));
        assert_eq!(controller.tick(), vec![set(Channel::B, 70)]);
    }
}
