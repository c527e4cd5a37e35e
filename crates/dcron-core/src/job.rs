//! Job identity, lifecycle state, and the record shape persisted to the
//! replicated log. The derived [`crate::Schedule`] object is *not* part of
//! this type — it's rematerialized by whoever applies a log entry (see
//! `dcron-log`), keeping capability back-references out of the serialized
//! form per the design notes on breaking the Job/Handler reference cycle.

use crate::id::JobId;
use crate::schedule::ScheduleDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job, driven by the runner, never by the applier.
///
/// ```text
/// initial --first fire--> starting --execute OK--> started --next fire--> starting ...
///              |                        |
///              +--execute fails--> error +--execute fails--> error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Initial,
    Starting,
    Started,
    Error,
}

/// A `(state, time)` pair. This pair, as stored in the replicated log, is
/// the authoritative version of a job's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStateRecord {
    pub state: JobState,
    /// Unix-second timestamp of the transition into `state`.
    pub time: i64,
}

impl JobStateRecord {
    /// Builds a record for `state` stamped at `at`.
    pub fn new(state: JobState, at: DateTime<Utc>) -> Self {
        Self {
            state,
            time: at.timestamp(),
        }
    }

    /// The initial `(Initial, now)` record for a freshly created job.
    pub fn initial(at: DateTime<Utc>) -> Self {
        Self::new(JobState::Initial, at)
    }
}

/// A scheduled job as persisted in the replicated log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub schedule: ScheduleDescriptor,
    pub state: JobStateRecord,
    pub next: Option<DateTime<Utc>>,
    pub prev: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a new job in state `Initial`, priming `next` from the
    /// schedule's first fire at or after `now`.
    pub fn new(id: JobId, descriptor: ScheduleDescriptor, now: DateTime<Utc>) -> Self {
        let next = descriptor.next(now);
        Self {
            id,
            schedule: descriptor,
            state: JobStateRecord::initial(now),
            next,
            prev: None,
        }
    }

    /// True once the schedule has reported the zero instant: no further
    /// fires remain and the runner should delete this job after its final
    /// successful execution.
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::CronSchedule;

    #[test]
    fn new_job_starts_in_initial_state() {
        let now = Utc::now();
        let descriptor = ScheduleDescriptor::Cron(CronSchedule::new("* * * * * *").unwrap());
        let job = Job::new(JobId::new("j1"), descriptor, now);

        assert_eq!(job.state.state, JobState::Initial);
        assert!(job.prev.is_none());
        assert!(job.next.is_some());
    }

    #[test]
    fn job_round_trips_through_json() {
        let now = Utc::now();
        let descriptor = ScheduleDescriptor::Cron(CronSchedule::new("* * * * * *").unwrap());
        let job = Job::new(JobId::new("j1"), descriptor, now);

        let json = serde_json::to_string(&job).unwrap();
        let restored: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, job.id);
        assert_eq!(restored.state, job.state);
    }
}
