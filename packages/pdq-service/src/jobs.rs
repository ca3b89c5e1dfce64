use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use uuid::Uuid;

use crate::{ServiceError, ServiceResult};

/// Lifecycle of a background job: `pending → processing → completed|failed`.
/// An unrecognized job id is the distinct terminal state `Unknown`, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
	Pending,
	Processing,
	Completed,
	Failed { message: String },
	Unknown,
}
impl JobState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed { .. } | Self::Unknown)
	}
}

/// Job-state storage behind an interface so a single-instance deployment can
/// run on an in-process map while a multi-instance one plugs in an external
/// store.
pub trait JobStore
where
	Self: Send + Sync,
{
	fn create(&self) -> ServiceResult<Uuid>;
	fn transition(&self, job_id: Uuid, next: JobState) -> ServiceResult<()>;
	fn status(&self, job_id: Uuid) -> JobState;
}

#[derive(Default)]
pub struct InMemoryJobStore {
	jobs: Arc<Mutex<HashMap<Uuid, JobState>>>,
}
impl InMemoryJobStore {
	pub fn new() -> Self {
		Self::default()
	}
}
impl JobStore for InMemoryJobStore {
	fn create(&self) -> ServiceResult<Uuid> {
		let job_id = Uuid::new_v4();
		let mut jobs = self.jobs.lock().map_err(|_| ServiceError::Storage {
			message: "Job store lock poisoned.".to_string(),
		})?;

		jobs.insert(job_id, JobState::Pending);

		Ok(job_id)
	}

	fn transition(&self, job_id: Uuid, next: JobState) -> ServiceResult<()> {
		let mut jobs = self.jobs.lock().map_err(|_| ServiceError::Storage {
			message: "Job store lock poisoned.".to_string(),
		})?;
		let Some(current) = jobs.get(&job_id) else {
			return Err(ServiceError::InvalidRequest {
				message: format!("Unknown job id {job_id}."),
			});
		};

		if !allowed(current, &next) {
			return Err(ServiceError::InvalidRequest {
				message: format!("Job {job_id} cannot move from {current:?} to {next:?}."),
			});
		}

		jobs.insert(job_id, next);

		Ok(())
	}

	fn status(&self, job_id: Uuid) -> JobState {
		self.jobs
			.lock()
			.ok()
			.and_then(|jobs| jobs.get(&job_id).cloned())
			.unwrap_or(JobState::Unknown)
	}
}

fn allowed(current: &JobState, next: &JobState) -> bool {
	matches!(
		(current, next),
		(JobState::Pending, JobState::Processing)
			| (JobState::Processing, JobState::Completed)
			| (JobState::Processing, JobState::Failed { .. })
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn jobs_walk_the_lifecycle_in_order() {
		let store = InMemoryJobStore::new();
		let job_id = store.create().expect("create failed");

		assert_eq!(store.status(job_id), JobState::Pending);
		store.transition(job_id, JobState::Processing).expect("start failed");
		store.transition(job_id, JobState::Completed).expect("complete failed");
		assert_eq!(store.status(job_id), JobState::Completed);
	}

	#[test]
	fn completed_jobs_cannot_move_again() {
		let store = InMemoryJobStore::new();
		let job_id = store.create().expect("create failed");

		store.transition(job_id, JobState::Processing).expect("start failed");
		store
			.transition(job_id, JobState::Failed { message: "boom".to_string() })
			.expect("fail failed");
		assert!(store.transition(job_id, JobState::Processing).is_err());
	}

	#[test]
	fn pending_jobs_cannot_skip_processing() {
		let store = InMemoryJobStore::new();
		let job_id = store.create().expect("create failed");

		assert!(store.transition(job_id, JobState::Completed).is_err());
	}

	#[test]
	fn unknown_ids_are_a_state_not_an_error() {
		let store = InMemoryJobStore::new();

		assert_eq!(store.status(Uuid::new_v4()), JobState::Unknown);
	}
}
