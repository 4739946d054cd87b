use super::{
    CronExpression, DateSequence, ExpressionType, ScheduleSpec, ScheduleTimeZone, SolarType,
};
use crate::errors::{SchedulerError, SchedulerResult, ValidationError};
use crate::solar::{parse_location, solar_timeline, Coordinates, SolarEvent, SolarTimes};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Turns validated specs into drivers, evaluated in one time zone
#[derive(Debug, Clone, Default)]
pub struct ExpressionResolver {
    zone: ScheduleTimeZone,
}

/// Solar inputs kept so the event list can be recomputed after every fire
#[derive(Debug, Clone)]
pub struct SolarPlan {
    pub position: Coordinates,
    pub events: Vec<SolarEvent>,
    pub offset_minutes: i64,
}

/// The timing source behind a task.
///
/// `next` is only set while armed. Cron drivers are unbounded; dates drivers
/// run out; solar drivers hold a rolling list that must be re-resolved after
/// each fire.
#[derive(Debug, Clone)]
pub enum Driver {
    Cron {
        expression: CronExpression,
        zone: ScheduleTimeZone,
        next: Option<DateTime<Utc>>,
    },
    Dates {
        sequence: DateSequence,
        next: Option<DateTime<Utc>>,
    },
    Solar {
        plan: SolarPlan,
        times: SolarTimes,
        sequence: DateSequence,
        next: Option<DateTime<Utc>>,
    },
}

impl ExpressionResolver {
    pub fn new(zone: ScheduleTimeZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> &ScheduleTimeZone {
        &self.zone
    }

    /// Build an unarmed driver for a spec that already passed `validate`
    pub fn resolve(
        &self,
        spec: &ScheduleSpec,
        kind: ExpressionType,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Driver> {
        let invalid = || ValidationError::InvalidExpression {
            name: spec.name.clone(),
            expression: spec
                .expression
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        };

        match kind {
            ExpressionType::Cron => {
                let text = spec
                    .expression
                    .as_ref()
                    .and_then(|e| e.as_text())
                    .ok_or_else(invalid)?;
                let expression = CronExpression::parse(text).map_err(|_| invalid())?;
                Ok(Driver::Cron {
                    expression,
                    zone: self.zone,
                    next: None,
                })
            }
            ExpressionType::Dates => {
                let expression = spec.expression.as_ref().ok_or_else(invalid)?;
                let sequence = DateSequence::parse(expression, &self.zone)?;
                debug!("Resolved '{}' to {} fixed dates", spec.name, sequence.len());
                Ok(Driver::Dates {
                    sequence,
                    next: None,
                })
            }
            ExpressionType::Solar => {
                let plan = Self::solar_plan(spec)?;
                let (times, sequence) = plan.resolve(now).ok_or_else(|| {
                    ValidationError::EmptySolarEvents {
                        name: spec.name.clone(),
                    }
                })?;
                debug!(
                    "Resolved '{}' to {} solar events (next: {:?})",
                    spec.name,
                    sequence.len(),
                    times.next_event
                );
                Ok(Driver::Solar {
                    plan,
                    times,
                    sequence,
                    next: None,
                })
            }
        }
    }

    fn solar_plan(spec: &ScheduleSpec) -> SchedulerResult<SolarPlan> {
        let position = parse_location(&spec.location)?;
        let events = match spec.solar_type.parse::<SolarType>() {
            Ok(SolarType::All) => SolarEvent::ALL.to_vec(),
            _ => spec
                .solar_events
                .as_ref()
                .map(|list| SolarEvent::from_names(&list.names()))
                .unwrap_or_default(),
        };
        if events.is_empty() {
            return Err(SchedulerError::Validation(ValidationError::EmptySolarEvents {
                name: spec.name.clone(),
            }));
        }
        Ok(SolarPlan {
            position,
            events,
            offset_minutes: spec.offset,
        })
    }
}

impl SolarPlan {
    /// Timeline at `now` plus the offset-adjusted instants as a date sequence
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<(SolarTimes, DateSequence)> {
        let times = solar_timeline(&self.position, 0.0, &self.events, now, self.offset_minutes)?;
        let sequence =
            DateSequence::from_instants(times.event_times.iter().map(|e| e.time_offset).collect());
        Some((times, sequence))
    }
}

impl Driver {
    pub fn kind(&self) -> ExpressionType {
        match self {
            Driver::Cron { .. } => ExpressionType::Cron,
            Driver::Dates { .. } => ExpressionType::Dates,
            Driver::Solar { .. } => ExpressionType::Solar,
        }
    }

    /// Compute the first fire strictly after `now`. Solar drivers re-resolve first.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        match self {
            Driver::Cron {
                expression,
                zone,
                next,
            } => *next = expression.next_after(now, zone),
            Driver::Dates { sequence, next } => *next = sequence.next_after(now),
            Driver::Solar {
                plan,
                times,
                sequence,
                next,
            } => {
                if let Some((fresh_times, fresh_sequence)) = plan.resolve(now) {
                    *times = fresh_times;
                    *sequence = fresh_sequence;
                }
                *next = sequence.next_after(now);
            }
        }
    }

    /// Move past a fire handled at `fired_at` without re-resolving
    pub fn advance(&mut self, fired_at: DateTime<Utc>) {
        match self {
            Driver::Cron {
                expression,
                zone,
                next,
            } => *next = expression.next_after(fired_at, zone),
            Driver::Dates { sequence, next } | Driver::Solar { sequence, next, .. } => {
                *next = sequence.next_after(fired_at)
            }
        }
    }

    pub fn disarm(&mut self) {
        match self {
            Driver::Cron { next, .. } | Driver::Dates { next, .. } | Driver::Solar { next, .. } => {
                *next = None
            }
        }
    }

    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        match self {
            Driver::Cron { next, .. } | Driver::Dates { next, .. } | Driver::Solar { next, .. } => {
                *next
            }
        }
    }

    /// A fixed date list with nothing left to fire
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Driver::Dates { next: None, .. })
    }

    /// Next `count` fire instants strictly after `after`, independent of arming
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        match self {
            Driver::Cron {
                expression, zone, ..
            } => expression.upcoming(after, count, zone),
            Driver::Dates { sequence, .. } | Driver::Solar { sequence, .. } => sequence
                .dates()
                .iter()
                .copied()
                .filter(|d| *d > after)
                .take(count)
                .collect(),
        }
    }

    /// Which solar event a fire at `at` belongs to
    pub fn solar_event_at(&self, at: DateTime<Utc>) -> Option<SolarEvent> {
        match self {
            Driver::Solar { times, .. } => times
                .event_times
                .iter()
                .find(|e| e.time_offset == at)
                .map(|e| e.event),
            _ => None,
        }
    }

    pub fn solar_times(&self) -> Option<&SolarTimes> {
        match self {
            Driver::Solar { times, .. } => Some(times),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{apply_defaults, validate};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn resolve(value: serde_json::Value, now: DateTime<Utc>) -> Driver {
        let mut spec: ScheduleSpec = serde_json::from_value(value).unwrap();
        apply_defaults(&mut spec, 0);
        let kind = validate(&mut spec).unwrap();
        let zone = ScheduleTimeZone::parse(Some("UTC")).unwrap();
        ExpressionResolver::new(zone).resolve(&spec, kind, now).unwrap()
    }

    #[test]
    fn test_cron_driver_next_is_non_decreasing() {
        let start = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();
        let mut driver = resolve(json!({"name": "c", "expression": "*/15 * * * * *"}), start);
        assert!(driver.next_fire().is_none());

        let mut previous = start;
        for step in 0..20 {
            driver.arm(start + Duration::seconds(step * 7));
            let next = driver.next_fire().unwrap();
            assert!(next >= previous);
            previous = next;
        }
    }

    #[test]
    fn test_dates_driver_runs_out() {
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();
        let mut driver = resolve(
            json!({"name": "d", "expression": ["2025-05-01T10:00:05Z", "2025-05-01T10:00:10Z"]}),
            now,
        );
        assert_eq!(driver.kind(), ExpressionType::Dates);

        driver.arm(now);
        let first = driver.next_fire().unwrap();
        driver.advance(first);
        let second = driver.next_fire().unwrap();
        assert!(second > first);
        driver.advance(second);
        assert!(driver.next_fire().is_none());
        assert!(driver.is_exhausted());
    }

    #[test]
    fn test_solar_driver_tracks_event_names() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let mut driver = resolve(
            json!({
                "name": "s",
                "expressionType": "solar",
                "location": "0, 0",
                "solarType": "selected",
                "solarEvents": "sunrise,sunset"
            }),
            now,
        );
        driver.arm(now);
        let next = driver.next_fire().unwrap();
        assert_eq!(driver.solar_event_at(next), Some(SolarEvent::Sunset));
        assert!(!driver.is_exhausted());
        assert_eq!(driver.upcoming(now, 5).len(), 2);
    }
}
