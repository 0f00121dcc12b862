//! Simulation clock: Julian-date bookkeeping, time-scale control, and
//! change notification.

use time::{Date, Duration, OffsetDateTime, Time, UtcOffset};
use tracing::warn;

use crate::constants::{DAYS_PER_JULIAN_CENTURY, J2000_JD, SECONDS_PER_DAY};
use crate::error::{Error, Result};

/// Observer invoked after every clock change with the new Julian date.
///
/// A returned error is logged and counted, never propagated: one broken
/// observer must not destabilize the simulation tick.
pub type TimeCallback = Box<dyn FnMut(f64) -> std::result::Result<(), Box<dyn std::error::Error>>>;

/// Handle for removing a registered [`TimeCallback`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Convert a civil datetime to a Julian date.
pub fn datetime_to_julian(datetime: OffsetDateTime) -> f64 {
    let utc = datetime.to_offset(UtcOffset::UTC);
    let day_number = f64::from(utc.date().to_julian_day());
    let seconds = f64::from(utc.hour()) * 3600.0
        + f64::from(utc.minute()) * 60.0
        + f64::from(utc.second())
        + f64::from(utc.nanosecond()) * 1e-9;
    day_number + seconds / SECONDS_PER_DAY - 0.5
}

/// Convert a Julian date back to a UTC datetime. Round-trips with
/// [`datetime_to_julian`] to well under a second.
pub fn julian_to_datetime(julian_date: f64) -> Result<OffsetDateTime> {
    let shifted = julian_date + 0.5;
    let day_number = libm::floor(shifted);
    let date = Date::from_julian_day(day_number as i32)
        .map_err(|e| Error::Validation(format!("julian date {julian_date} out of range: {e}")))?;
    let day_fraction = shifted - day_number;
    let time = Time::MIDNIGHT + Duration::seconds_f64(day_fraction * SECONDS_PER_DAY);
    Ok(date.with_time(time).assume_utc())
}

/// Simulation time source.
///
/// Tracks the current Julian date, a non-negative time scale mapping real
/// seconds to simulated seconds, and a pause flag. All mutating entry
/// points notify registered callbacks in registration order.
pub struct TimeManager {
    current_julian_date: f64,
    time_scale: f64,
    is_paused: bool,
    callbacks: Vec<(CallbackId, TimeCallback)>,
    next_callback_id: u64,
    callback_failures: u64,
}

impl TimeManager {
    /// Start the clock at the current wall-clock instant.
    pub fn new() -> Self {
        Self::at_julian_date(datetime_to_julian(OffsetDateTime::now_utc()))
    }

    pub fn at_julian_date(julian_date: f64) -> Self {
        Self {
            current_julian_date: julian_date,
            time_scale: 1.0,
            is_paused: false,
            callbacks: Vec::new(),
            next_callback_id: 0,
            callback_failures: 0,
        }
    }

    pub fn current_julian_date(&self) -> f64 {
        self.current_julian_date
    }

    pub fn current_datetime(&self) -> Result<OffsetDateTime> {
        julian_to_datetime(self.current_julian_date)
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Jump the clock to a civil datetime.
    pub fn set_date(&mut self, datetime: OffsetDateTime) {
        self.current_julian_date = datetime_to_julian(datetime);
        self.notify_time_change();
    }

    /// Advance by `real_dt_seconds` of wall-clock time, scaled by the
    /// current time scale. Does nothing while paused.
    pub fn update(&mut self, real_dt_seconds: f64) {
        if self.is_paused {
            return;
        }
        self.current_julian_date += real_dt_seconds * self.time_scale / SECONDS_PER_DAY;
        self.notify_time_change();
    }

    /// Jump forward by a fixed number of days, independent of the time
    /// scale. Respects the pause flag.
    pub fn advance_by_days(&mut self, days: f64) {
        if !self.is_paused {
            self.current_julian_date += days;
            self.notify_time_change();
        }
    }

    /// Jump forward by a fixed number of seconds, independent of the time
    /// scale. Respects the pause flag.
    pub fn advance_by_seconds(&mut self, seconds: f64) {
        self.advance_by_days(seconds / SECONDS_PER_DAY);
    }

    /// Set the time scale. Zero freezes simulated time without pausing;
    /// negative values are rejected.
    pub fn set_time_scale(&mut self, scale: f64) -> Result<()> {
        if scale < 0.0 {
            return Err(Error::Validation(format!(
                "time scale must be non-negative, got {scale}"
            )));
        }
        self.time_scale = scale;
        Ok(())
    }

    /// Set the time scale from a named preset: one simulated
    /// {second, minute, hour, day, week, month, year} per real second.
    pub fn set_time_scale_preset(&mut self, preset: &str) -> Result<()> {
        let scale = match preset {
            "real" => 1.0,
            "minute" => 60.0,
            "hour" => 3600.0,
            "day" => 86_400.0,
            "week" => 604_800.0,
            "month" => 2_629_746.0,
            "year" => 31_556_952.0,
            other => {
                return Err(Error::Configuration(format!(
                    "unknown time-scale preset `{other}`"
                )))
            }
        };
        self.set_time_scale(scale)
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }

    /// Flip the pause flag and return the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.is_paused = !self.is_paused;
        self.is_paused
    }

    /// Days elapsed since the J2000.0 epoch.
    pub fn j2000_days(&self) -> f64 {
        self.current_julian_date - J2000_JD
    }

    /// Julian centuries elapsed since the J2000.0 epoch.
    pub fn j2000_centuries(&self) -> f64 {
        self.j2000_days() / DAYS_PER_JULIAN_CENTURY
    }

    /// Greenwich mean sidereal time in degrees, from the IAU polynomial.
    pub fn sidereal_time_greenwich(&self) -> f64 {
        let d = self.j2000_days();
        let t = self.j2000_centuries();
        let gst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
            - t * t * t / 38_710_000.0;
        gst.rem_euclid(360.0)
    }

    /// Register a time-change observer; fires on every subsequent clock
    /// change, in registration order.
    pub fn add_time_change_callback(&mut self, callback: TimeCallback) -> CallbackId {
        let id = CallbackId(self.next_callback_id);
        self.next_callback_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    /// Remove a previously registered observer. Returns whether it was
    /// still present.
    pub fn remove_time_change_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    /// Number of callback invocations that returned an error and were
    /// swallowed.
    pub fn callback_failures(&self) -> u64 {
        self.callback_failures
    }

    fn notify_time_change(&mut self) {
        let julian_date = self.current_julian_date;
        for (id, callback) in &mut self.callbacks {
            if let Err(error) = callback(julian_date) {
                self.callback_failures += 1;
                warn!(callback = id.0, %error, "time-change callback failed");
            }
        }
    }
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use time::macros::datetime;

    use super::*;

    #[test]
    fn j2000_noon_is_the_reference_epoch() {
        let jd = datetime_to_julian(datetime!(2000-01-01 12:00:00 UTC));
        assert!((jd - J2000_JD).abs() < 1e-9);
    }

    #[test]
    fn julian_round_trip_is_second_accurate() {
        for dt in [
            datetime!(2000-01-01 12:00:00 UTC),
            datetime!(1999-12-31 23:59:59 UTC),
            datetime!(2024-03-01 13:45:27 UTC),
            datetime!(1600-07-04 02:30:00 UTC),
        ] {
            let jd = datetime_to_julian(dt);
            let back = julian_to_datetime(jd).unwrap();
            let delta = (back - dt).abs();
            assert!(delta < Duration::seconds(1), "{dt} -> {jd} -> {back}");
        }
    }

    #[test]
    fn update_applies_scale_and_respects_pause() {
        let mut manager = TimeManager::at_julian_date(J2000_JD);
        manager.set_time_scale(86_400.0).unwrap();
        manager.update(1.0);
        assert!((manager.current_julian_date() - (J2000_JD + 1.0)).abs() < 1e-12);

        manager.pause();
        manager.update(100.0);
        manager.advance_by_days(5.0);
        assert!((manager.current_julian_date() - (J2000_JD + 1.0)).abs() < 1e-12);

        manager.resume();
        manager.advance_by_seconds(43_200.0);
        assert!((manager.current_julian_date() - (J2000_JD + 1.5)).abs() < 1e-12);
    }

    #[test]
    fn advance_ignores_time_scale() {
        let mut manager = TimeManager::at_julian_date(J2000_JD);
        manager.set_time_scale(0.0).unwrap();
        manager.advance_by_days(2.0);
        assert!((manager.current_julian_date() - (J2000_JD + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn negative_time_scale_is_rejected() {
        let mut manager = TimeManager::at_julian_date(J2000_JD);
        assert!(matches!(
            manager.set_time_scale(-1.0),
            Err(Error::Validation(_))
        ));
        assert!(manager.set_time_scale(0.0).is_ok());
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let mut manager = TimeManager::at_julian_date(J2000_JD);
        assert!(matches!(
            manager.set_time_scale_preset("fortnight"),
            Err(Error::Configuration(_))
        ));
        manager.set_time_scale_preset("day").unwrap();
        assert!((manager.time_scale() - 86_400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn callbacks_fire_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut manager = TimeManager::at_julian_date(J2000_JD);

        for tag in 0..3 {
            let order = Rc::clone(&order);
            manager.add_time_change_callback(Box::new(move |_| {
                order.borrow_mut().push(tag);
                Ok(())
            }));
        }

        manager.advance_by_days(1.0);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn failing_callback_is_swallowed_and_counted() {
        let reached = Rc::new(RefCell::new(0));
        let mut manager = TimeManager::at_julian_date(J2000_JD);

        manager.add_time_change_callback(Box::new(|_| Err("observer broke".into())));
        {
            let reached = Rc::clone(&reached);
            manager.add_time_change_callback(Box::new(move |_| {
                *reached.borrow_mut() += 1;
                Ok(())
            }));
        }

        manager.advance_by_days(1.0);
        manager.advance_by_days(1.0);

        assert_eq!(manager.callback_failures(), 2);
        assert_eq!(*reached.borrow(), 2);
    }

    #[test]
    fn removed_callback_stops_firing() {
        let count = Rc::new(RefCell::new(0));
        let mut manager = TimeManager::at_julian_date(J2000_JD);

        let id = {
            let count = Rc::clone(&count);
            manager.add_time_change_callback(Box::new(move |_| {
                *count.borrow_mut() += 1;
                Ok(())
            }))
        };

        manager.advance_by_days(1.0);
        assert!(manager.remove_time_change_callback(id));
        assert!(!manager.remove_time_change_callback(id));
        manager.advance_by_days(1.0);

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn sidereal_time_matches_the_j2000_reference_value() {
        let manager = TimeManager::at_julian_date(J2000_JD);
        let gst = manager.sidereal_time_greenwich();
        assert!((gst - 280.460_618_37).abs() < 1e-6, "GMST {gst}");
    }
}
