//! Ordered, name-unique task collection
//!
//! The registry is owned by one scheduler loop and never shared, so it holds
//! plain `Vec<Task>` without locks. Registry order is creation order and is
//! used to break ties between tasks firing at the same instant.

use crate::errors::{SchedulerResult, ValidationError};
use crate::schedule::{apply_defaults, validate, ExpressionResolver, ScheduleSpec, ScheduleTimeZone};
use crate::task::Task;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bulk selector used by `-all`, `-active`, `-inactive` command suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Static,
    Dynamic,
    Active,
    Inactive,
    ActiveStatic,
    ActiveDynamic,
    InactiveStatic,
    InactiveDynamic,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let active = task.is_active();
        match self {
            TaskFilter::All => true,
            TaskFilter::Static => task.is_static(),
            TaskFilter::Dynamic => task.is_dynamic(),
            TaskFilter::Active => active,
            TaskFilter::Inactive => !active,
            TaskFilter::ActiveStatic => active && task.is_static(),
            TaskFilter::ActiveDynamic => active && task.is_dynamic(),
            TaskFilter::InactiveStatic => !active && task.is_static(),
            TaskFilter::InactiveDynamic => !active && task.is_dynamic(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Static => "static",
            TaskFilter::Dynamic => "dynamic",
            TaskFilter::Active => "active",
            TaskFilter::Inactive => "inactive",
            TaskFilter::ActiveStatic => "active-static",
            TaskFilter::ActiveDynamic => "active-dynamic",
            TaskFilter::InactiveStatic => "inactive-static",
            TaskFilter::InactiveDynamic => "inactive-dynamic",
        }
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TaskFilter::All),
            "static" | "all-static" => Ok(TaskFilter::Static),
            "dynamic" | "all-dynamic" => Ok(TaskFilter::Dynamic),
            "active" => Ok(TaskFilter::Active),
            "inactive" => Ok(TaskFilter::Inactive),
            "active-static" => Ok(TaskFilter::ActiveStatic),
            "active-dynamic" => Ok(TaskFilter::ActiveDynamic),
            "inactive-static" => Ok(TaskFilter::InactiveStatic),
            "inactive-dynamic" => Ok(TaskFilter::InactiveDynamic),
            other => Err(format!("unknown filter '{}'", other)),
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TaskRegistry {
    tasks: Vec<Task>,
    resolver: ExpressionResolver,
}

/// Explicit counts are clamped to the limit when there is one
fn clamp_count(count: u64, limit: u64) -> u64 {
    if limit > 0 {
        count.min(limit)
    } else {
        count
    }
}

impl TaskRegistry {
    pub fn new(zone: ScheduleTimeZone) -> Self {
        Self {
            tasks: Vec::new(),
            resolver: ExpressionResolver::new(zone),
        }
    }

    pub fn zone(&self) -> &ScheduleTimeZone {
        self.resolver.zone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn first(&self) -> Option<&Task> {
        self.tasks.first()
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.name() == name)
    }

    pub fn get_by_id_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id() == id)
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    /// Prepare a spec for registration: defaults, validation, driver
    fn build(&self, mut spec: ScheduleSpec, index: usize, dynamic: bool, now: DateTime<Utc>) -> SchedulerResult<Task> {
        apply_defaults(&mut spec, index);
        let kind = validate(&mut spec)?;
        let driver = self.resolver.resolve(&spec, kind, now)?;
        Ok(Task::new(spec, kind, driver, index, dynamic))
    }

    /// Validate, resolve and append a started task. Nothing changes on error.
    pub fn add(
        &mut self,
        spec: ScheduleSpec,
        index: usize,
        is_static: bool,
        now: DateTime<Utc>,
    ) -> SchedulerResult<&Task> {
        let mut task = self.build(spec, index, !is_static, now)?;
        if self.get(task.name()).is_some() {
            return Err(ValidationError::DuplicateName {
                name: task.name().to_string(),
            }
            .into());
        }
        task.start(now);
        info!(
            "✓ Created {} schedule '{}' (index {}, {})",
            if is_static { "static" } else { "dynamic" },
            task.name(),
            index,
            task.kind().as_str()
        );
        self.tasks.push(task);
        let idx = self.tasks.len() - 1;
        Ok(&self.tasks[idx])
    }

    /// Create or replace a task by name.
    ///
    /// A replaced task keeps its position, index and static/dynamic origin,
    /// is marked modified and carries its count over unless the new spec
    /// sets one (clamped to the limit when there is a limit).
    pub fn upsert(&mut self, spec: ScheduleSpec, now: DateTime<Utc>) -> SchedulerResult<&Task> {
        let explicit_count = spec.count;
        let existing = self.tasks.iter().position(|t| t.name() == spec.name);

        let Some(position) = existing else {
            let index = self.tasks.len();
            self.add(spec, index, false, now)?;
            let position = self.tasks.len() - 1;
            if let Some(count) = explicit_count {
                let task = &mut self.tasks[position];
                let count = clamp_count(count, task.limit());
                task.set_count(count);
            }
            return Ok(&self.tasks[position]);
        };

        let previous = &self.tasks[position];
        let mut task = self.build(spec, previous.index(), previous.is_dynamic(), now)?;
        let count = match explicit_count {
            Some(count) => clamp_count(count, task.limit()),
            None => previous.count(),
        };

        task.start(now);
        task.set_count(count);
        task.mark_modified();

        let mut old = std::mem::replace(&mut self.tasks[position], task);
        old.stop(false);
        info!("✓ Replaced schedule '{}' (count {})", old.name(), count);
        Ok(&self.tasks[position])
    }

    /// Validate every spec before touching the registry; the first invalid
    /// entry aborts the whole batch.
    pub fn upsert_all(&mut self, specs: Vec<ScheduleSpec>, now: DateTime<Utc>) -> SchedulerResult<usize> {
        for spec in &specs {
            let mut candidate = spec.clone();
            validate(&mut candidate).map_err(|e| {
                warn!("✗ Rejected schedule batch: {}", e);
                e
            })?;
        }
        let total = specs.len();
        for spec in specs {
            self.upsert(spec, now)?;
        }
        Ok(total)
    }

    /// Stop and detach a task. Unknown names are a no-op.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(position) = self.tasks.iter().position(|t| t.name() == name) else {
            debug!("Remove ignored, no schedule named '{}'", name);
            return false;
        };
        let mut task = self.tasks.remove(position);
        task.stop(false);
        info!("Removed schedule '{}'", name);
        true
    }

    pub fn remove_matching(&mut self, filter: TaskFilter) -> usize {
        let before = self.tasks.len();
        self.tasks.retain_mut(|task| {
            if filter.matches(task) {
                task.stop(false);
                false
            } else {
                true
            }
        });
        let removed = before - self.tasks.len();
        if removed > 0 {
            info!("Removed {} schedules matching '{}'", removed, filter);
        }
        removed
    }

    pub fn filter(&self, filter: TaskFilter) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.iter().filter(move |t| filter.matches(t))
    }

    /// Ids of tasks matching `filter`, for bulk mutations
    pub fn matching_ids(&self, filter: TaskFilter) -> Vec<Uuid> {
        self.filter(filter).map(Task::id).collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> + '_ {
        self.tasks.iter_mut()
    }

    /// Active task with the soonest next fire; earlier registry order wins ties
    pub fn next_overall_fire(&self) -> Option<(&Task, DateTime<Utc>)> {
        let mut best: Option<(&Task, DateTime<Utc>)> = None;
        for task in &self.tasks {
            let Some(at) = task.next_fire() else {
                continue;
            };
            match best {
                Some((_, best_at)) if best_at <= at => {}
                _ => best = Some((task, at)),
            }
        }
        best
    }

    pub fn dynamic_tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.filter(TaskFilter::Dynamic)
    }
}
