//! Task lifecycle through the registry: limits, replace counts, stop/pause
//! and the static/dynamic × active/inactive filter partition.

mod common;

use common::fixtures::*;
use rstest::rstest;
use serde_json::json;
use timekeeper::TaskFilter;

#[test]
fn test_limit_finishes_after_exact_count() {
    let now = now();
    let mut registry = utc_registry();
    registry
        .add(limited_cron_spec(names::TICKER, expressions::EVERY_SECOND, 4), 0, true, now)
        .unwrap();

    let mut fired = 0;
    while fire_once(&mut registry, names::TICKER) {
        fired += 1;
        assert!(fired <= 4, "fired past the limit");
    }

    let task = registry.get(names::TICKER).unwrap();
    assert_eq!(fired, 4);
    assert_eq!(task.count(), 4);
    assert!(!task.is_running());
    assert!(task.is_finished());
    assert!(registry.next_overall_fire().is_none());
}

#[rstest]
#[case::keeps_prior_count(None, None, 2)]
#[case::explicit_count(None, Some(7), 7)]
#[case::explicit_within_limit(Some(5), Some(3), 3)]
#[case::explicit_clamped_to_limit(Some(5), Some(9), 5)]
#[case::prior_count_with_new_limit(Some(5), None, 2)]
fn test_replace_count_rules(
    #[case] limit: Option<u64>,
    #[case] count: Option<u64>,
    #[case] expected: u64,
) {
    let now = now();
    let mut registry = utc_registry();
    registry
        .upsert(cron_spec(names::HOURLY, expressions::EVERY_SECOND), now)
        .unwrap();
    assert!(fire_once(&mut registry, names::HOURLY));
    assert!(fire_once(&mut registry, names::HOURLY));

    let mut replacement = json!({"name": names::HOURLY, "expression": expressions::HOURLY});
    if let Some(limit) = limit {
        replacement["limit"] = json!(limit);
    }
    if let Some(count) = count {
        replacement["count"] = json!(count);
    }
    registry.upsert(spec(replacement), now).unwrap();

    let task = registry.get(names::HOURLY).unwrap();
    assert_eq!(task.count(), expected);
    assert!(task.is_modified());
    assert_eq!(registry.len(), 1);
}

#[rstest]
#[case::clamped_to_limit(Some(1), 2, 1, false)]
#[case::below_limit(Some(5), 2, 2, true)]
#[case::no_limit(None, 9, 9, true)]
fn test_create_applies_explicit_count(
    #[case] limit: Option<u64>,
    #[case] count: u64,
    #[case] expected: u64,
    #[case] active: bool,
) {
    let now = now();
    let mut registry = utc_registry();
    let mut created = json!({"name": "dyn-2", "expression": "* * * * * * *", "count": count});
    if let Some(limit) = limit {
        created["limit"] = json!(limit);
    }
    registry.upsert(spec(created), now).unwrap();

    let task = registry.get("dyn-2").unwrap();
    assert_eq!(task.count(), expected);
    assert_eq!(task.is_running(), active);
    assert_eq!(task.is_active(), active);
    assert!(!task.is_modified());
    assert_eq!(task.next_fire().is_some(), active);
}

#[test]
fn test_replace_keeps_position_and_origin() {
    let now = now();
    let mut registry = utc_registry();
    registry.add(cron_spec("first", expressions::HOURLY), 0, true, now).unwrap();
    registry.add(cron_spec("second", expressions::HOURLY), 1, true, now).unwrap();

    registry
        .upsert(cron_spec("first", expressions::EVERY_MINUTE), now)
        .unwrap();

    assert_eq!(registry.tasks()[0].name(), "first");
    assert!(registry.tasks()[0].is_static());
    assert_eq!(registry.tasks()[0].index(), 0);
}

#[test]
fn test_stop_resets_and_pause_preserves_count() {
    let now = now();
    let mut registry = utc_registry();
    registry
        .add(cron_spec(names::TICKER, expressions::EVERY_SECOND), 0, false, now)
        .unwrap();
    fire_once(&mut registry, names::TICKER);
    fire_once(&mut registry, names::TICKER);
    fire_once(&mut registry, names::TICKER);

    let task = registry.get_mut(names::TICKER).unwrap();
    task.pause();
    assert_eq!(task.count(), 3);
    assert!(!task.is_active());

    task.start(now);
    assert_eq!(task.count(), 3);
    task.stop(true);
    assert_eq!(task.count(), 0);
}

#[test]
fn test_invalid_batch_leaves_registry_untouched() {
    let now = now();
    let mut registry = utc_registry();
    let result = registry.upsert_all(
        vec![
            cron_spec("good", expressions::HOURLY),
            spec(json!({"name": "bad", "expressionType": "solar", "location": "0,0", "solarType": "sometimes"})),
        ],
        now,
    );
    assert!(result.is_err());
    assert!(registry.is_empty());
}

fn mixed_registry() -> timekeeper::TaskRegistry {
    let now = now();
    let mut registry = utc_registry();
    registry.add(cron_spec("static-on", expressions::HOURLY), 0, true, now).unwrap();
    registry.add(cron_spec("static-off", expressions::HOURLY), 1, true, now).unwrap();
    registry.add(cron_spec("dynamic-on", expressions::HOURLY), 2, false, now).unwrap();
    registry.add(cron_spec("dynamic-off", expressions::HOURLY), 3, false, now).unwrap();
    registry.add(limited_cron_spec("dynamic-done", expressions::EVERY_SECOND, 1), 4, false, now).unwrap();

    registry.get_mut("static-off").unwrap().pause();
    registry.get_mut("dynamic-off").unwrap().stop(true);
    fire_once(&mut registry, "dynamic-done");
    registry
}

#[rstest]
#[case(TaskFilter::All, 5)]
#[case(TaskFilter::Static, 2)]
#[case(TaskFilter::Dynamic, 3)]
#[case(TaskFilter::Active, 2)]
#[case(TaskFilter::Inactive, 3)]
#[case(TaskFilter::ActiveStatic, 1)]
#[case(TaskFilter::ActiveDynamic, 1)]
#[case(TaskFilter::InactiveStatic, 1)]
#[case(TaskFilter::InactiveDynamic, 2)]
fn test_filter_counts(#[case] filter: TaskFilter, #[case] expected: usize) {
    assert_eq!(mixed_registry().filter(filter).count(), expected);
}

#[test]
fn test_filter_buckets_partition_registry() {
    let registry = mixed_registry();
    let buckets = [
        TaskFilter::ActiveStatic,
        TaskFilter::ActiveDynamic,
        TaskFilter::InactiveStatic,
        TaskFilter::InactiveDynamic,
    ];
    for task in registry.tasks() {
        let hits = buckets.iter().filter(|f| f.matches(task)).count();
        assert_eq!(hits, 1, "task '{}' matched {} buckets", task.name(), hits);
    }
}

#[test]
fn test_cron_next_fire_is_monotonic() {
    let start = now();
    let mut registry = utc_registry();
    registry
        .add(cron_spec(names::MORNING, expressions::WEEKDAY_MORNING), 0, true, start)
        .unwrap();

    let task = registry.get_mut(names::MORNING).unwrap();
    let mut previous = task.next_fire().unwrap();
    for hours in [1, 6, 30, 80, 200] {
        task.rearm(start + chrono::Duration::hours(hours));
        let next = task.next_fire().unwrap();
        assert!(next >= previous);
        previous = next;
    }
}

#[test]
fn test_solar_task_arms_next_event() {
    let now = now();
    let mut registry = utc_registry();
    registry
        .add(solar_spec(names::DUSK, locations::EQUATOR, "sunrise,sunset"), 0, true, now)
        .unwrap();

    let task = registry.get(names::DUSK).unwrap();
    let next = task.next_fire().unwrap();
    assert!(next > now);
    assert!(next - now < chrono::Duration::hours(13));
    assert!(task.driver().solar_event_at(next).is_some());
}
