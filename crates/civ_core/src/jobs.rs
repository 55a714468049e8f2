//! Timed jobs: construction and research.
//!
//! Both kinds share one queue. A job is created by a successful command
//! (costs are deducted at that moment), loses one remaining tick per
//! simulation tick, and is removed when it reaches zero. Every active job
//! advances in parallel; there is no single "current" slot.

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;
use crate::ids::{BuildingId, TechId};

/// Unique, monotonically increasing job identifier.
pub type JobId = u64;

/// What a job produces when it completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// One unit of a building type.
    Construction(BuildingId),
    /// Unlock of a technology.
    Research(TechId),
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Construction(id) => write!(f, "build {id}"),
            Self::Research(id) => write!(f, "research {id}"),
        }
    }
}

/// A job in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Identifier assigned at enqueue time.
    pub id: JobId,
    /// What the job produces.
    pub kind: JobKind,
    /// Ticks left until completion.
    pub remaining: u32,
    /// Total duration in ticks.
    pub total: u32,
}

impl Job {
    /// Create a job that has not progressed yet.
    #[must_use]
    pub const fn new(id: JobId, kind: JobKind, total: u32) -> Self {
        Self {
            id,
            kind,
            remaining: total,
            total,
        }
    }

    /// Check if the job is complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            100
        } else {
            ((self.total - self.remaining) * 100) / self.total
        }
    }

    /// Advance the job by one tick.
    pub fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// All jobs in flight, in enqueue order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobQueue {
    jobs: Vec<Job>,
    next_id: JobId,
}

impl JobQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job and return its id.
    pub fn enqueue(&mut self, kind: JobKind, duration: u32) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.push(Job::new(id, kind, duration));
        id
    }

    /// Check if no jobs are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Iterate jobs in enqueue order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Look up a job by id.
    #[must_use]
    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Construction jobs for one building type.
    pub fn constructions<'a>(&'a self, building: &'a str) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs.iter().filter(move |job| {
            matches!(&job.kind, JobKind::Construction(id) if id.as_str() == building)
        })
    }

    /// Check if a research job for `tech` is in flight.
    #[must_use]
    pub fn is_researching(&self, tech: &str) -> bool {
        self.jobs
            .iter()
            .any(|job| matches!(&job.kind, JobKind::Research(id) if id.as_str() == tech))
    }

    /// Id the next enqueued job will receive.
    #[must_use]
    pub const fn next_id(&self) -> JobId {
        self.next_id
    }

    /// Advance every job by one tick and remove the finished ones.
    ///
    /// Completed jobs are returned in enqueue order.
    pub fn tick(&mut self) -> Vec<Job> {
        for job in &mut self.jobs {
            job.tick();
        }

        let (done, active): (Vec<Job>, Vec<Job>) =
            std::mem::take(&mut self.jobs).into_iter().partition(Job::is_complete);
        self.jobs = active;
        done
    }

    /// Verify that no job is stuck at zero and ids are unique and below
    /// the next id.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for job in &self.jobs {
            if job.is_complete() || job.id >= self.next_id {
                return Err(InvariantViolation::StalledJob(job.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_completes_after_duration() {
        let mut queue = JobQueue::new();
        let id = queue.enqueue(JobKind::Construction("hut".into()), 3);

        assert!(queue.tick().is_empty());
        assert!(queue.tick().is_empty());
        assert_eq!(queue.get(id).unwrap().remaining, 1);

        let done = queue.tick();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_jobs_advance_in_parallel() {
        let mut queue = JobQueue::new();
        let first = queue.enqueue(JobKind::Construction("hut".into()), 2);
        let second = queue.enqueue(JobKind::Construction("hut".into()), 2);
        let long = queue.enqueue(JobKind::Research("writing".into()), 5);

        queue.tick();
        let done = queue.tick();
        let ids: Vec<JobId> = done.iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(long).unwrap().remaining, 3);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut queue = JobQueue::new();
        let a = queue.enqueue(JobKind::Research("a".into()), 1);
        queue.tick();
        let b = queue.enqueue(JobKind::Research("b".into()), 1);
        assert!(b > a);
        assert_eq!(queue.next_id(), b + 1);
    }

    #[test]
    fn test_is_researching_and_constructions() {
        let mut queue = JobQueue::new();
        queue.enqueue(JobKind::Research("writing".into()), 4);
        queue.enqueue(JobKind::Construction("hut".into()), 4);
        queue.enqueue(JobKind::Construction("hut".into()), 4);

        assert!(queue.is_researching("writing"));
        assert!(!queue.is_researching("hut"));
        assert_eq!(queue.constructions("hut").count(), 2);
        assert_eq!(queue.constructions("farm").count(), 0);
    }

    #[test]
    fn test_percentage() {
        let mut job = Job::new(0, JobKind::Construction("hut".into()), 4);
        assert_eq!(job.percentage(), 0);
        job.tick();
        assert_eq!(job.percentage(), 25);
    }

    #[test]
    fn test_check_invariants() {
        let mut queue = JobQueue::new();
        queue.enqueue(JobKind::Construction("hut".into()), 2);
        assert!(queue.check_invariants().is_ok());

        queue.jobs[0].remaining = 0;
        assert_eq!(
            queue.check_invariants(),
            Err(InvariantViolation::StalledJob(0))
        );
    }
}
