#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::expect_used
)]
use bevy::prelude::*;
use std::{any, future, pin};

/// Runs jobs on the async compute pool and collects their outcomes in `PreUpdate`.
pub struct Plugin {
    pub maximum_active_jobs: usize,
}

impl Default for Plugin {
    fn default() -> Self {
        Self {
            maximum_active_jobs: 6,
        }
    }
}

impl bevy::prelude::Plugin for Plugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreUpdate, check_system)
            .insert_resource(JobOutcomePayloads(vec![]))
            .insert_resource(JobBudget::new(self.maximum_active_jobs));
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + Send + 'static>>;
#[cfg(target_arch = "wasm32")]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + 'static>>;

pub trait Job: any::Any + Sized + Send + Sync + 'static {
    type Outcome: any::Any + Send + Sync;

    fn name(&self) -> String;

    fn perform(self, context: Context) -> AsyncReturn<Self::Outcome>;

    fn spawn(self, commands: &mut bevy::ecs::system::Commands) {
        let (outcome_tx, outcome_recv) = async_channel::unbounded::<JobOutcomePayload>();
        let (progress_tx, progress_recv) = async_channel::unbounded::<Progress>();

        let job_name = self.name();
        let in_progress_job = InProgressJob {
            name: job_name.clone(),
            progress: 0,
            progress_recv,
            outcome_recv,
        };

        bevy::tasks::AsyncComputeTaskPool::get()
            .spawn(async move {
                let instant = instant::Instant::now();
                bevy::log::info!("Starting job '{}'", job_name);
                let outcome = self.perform(Context { progress_tx }).await;
                bevy::log::info!("Completed job '{}' in {:?}", job_name, instant.elapsed());
                if let Err(e) = outcome_tx
                    .send(JobOutcomePayload {
                        job_outcome_type_id: any::TypeId::of::<Self>(),
                        job_outcome: Box::new(outcome),
                    })
                    .await
                {
                    bevy::log::error!(
                        "Failed to send result from job {} back to main thread: {:?}",
                        job_name,
                        e
                    );
                }
            })
            .detach();

        commands.spawn(in_progress_job);
    }
}

fn check_system(
    mut query: Query<(&mut InProgressJob, Entity)>,
    mut commands: Commands,
    mut finished_jobs: FinishedJobs,
    mut budget: ResMut<JobBudget>,
) {
    query.for_each_mut(|(mut in_progress_job, entity)| {
        if let Ok(progress) = in_progress_job.progress_recv.try_recv() {
            in_progress_job.progress = progress;
        }

        match in_progress_job.outcome_recv.try_recv() {
            Ok(outcome) => {
                commands.entity(entity).despawn();
                budget.release();
                finished_jobs.outcomes.0.push(outcome);
            }
            Err(async_channel::TryRecvError::Closed) => {
                // the task dropped its sender without reporting
                bevy::log::error!("Job '{}' ended without an outcome", in_progress_job.name);
                commands.entity(entity).despawn();
                budget.release();
            }
            Err(async_channel::TryRecvError::Empty) => {}
        }
    })
}

pub struct Context {
    pub progress_tx: async_channel::Sender<Progress>,
}

impl Context {
    pub fn send_progress(&self, progress: Progress) -> async_channel::Send<u8> {
        self.progress_tx.send(progress)
    }
}

pub struct JobOutcomePayload {
    pub job_outcome_type_id: any::TypeId,
    pub job_outcome: Box<dyn any::Any + Send + Sync>,
}

/// Number of jobs allowed in flight at once, owned by the app instead of a
/// global task registry.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct JobBudget {
    pub maximum: usize,
    pub active: usize,
}

impl JobBudget {
    pub fn new(maximum: usize) -> Self {
        Self { maximum, active: 0 }
    }
    pub fn available(&self) -> usize {
        self.maximum.saturating_sub(self.active)
    }
    pub fn has_capacity(&self) -> bool {
        self.available() > 0
    }
    fn acquire(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.active += 1;
        true
    }
    fn release(&mut self) {
        self.active = self.active.saturating_sub(1);
    }
}

#[derive(bevy::ecs::system::SystemParam)]
pub struct JobSpawner<'w, 's> {
    commands: Commands<'w, 's>,
    budget: ResMut<'w, JobBudget>,
}

impl<'w, 's> JobSpawner<'w, 's> {
    /// Spawns regardless of the budget. The job still counts as active.
    pub fn spawn<J: Job>(&mut self, job: J) {
        self.budget.active += 1;
        job.spawn(&mut self.commands)
    }

    /// Spawns only when the budget allows it and hands the job back otherwise.
    pub fn try_spawn<J: Job>(&mut self, job: J) -> Result<(), J> {
        if !self.budget.acquire() {
            return Err(job);
        }
        job.spawn(&mut self.commands);
        Ok(())
    }

    pub fn available(&self) -> usize {
        self.budget.available()
    }
}

pub type Progress = u8;
pub type ProgressSender = async_channel::Sender<Progress>;

#[derive(Component)]
pub struct InProgressJob {
    pub name: String,
    pub progress: Progress,
    pub progress_recv: async_channel::Receiver<Progress>,
    pub outcome_recv: async_channel::Receiver<JobOutcomePayload>,
}

#[derive(bevy::ecs::system::SystemParam)]
pub struct FinishedJobs<'w, 's> {
    outcomes: ResMut<'w, JobOutcomePayloads>,
    phantom_data: std::marker::PhantomData<&'s ()>,
}

#[derive(Resource)]
pub struct JobOutcomePayloads(Vec<JobOutcomePayload>);

impl<'w, 's> FinishedJobs<'w, 's> {
    #[inline]
    pub fn take_next<J: Job>(&mut self) -> Option<J::Outcome> {
        let index = self
            .outcomes
            .0
            .iter_mut()
            .enumerate()
            .filter(|(_i, outcome_payload)| {
                any::TypeId::of::<J>() == outcome_payload.job_outcome_type_id
                    && outcome_payload.job_outcome.is::<J::Outcome>()
            })
            .map(|(i, _)| i)
            .next()?;
        let outcome_payload = self.outcomes.0.remove(index);
        let outcome = outcome_payload.job_outcome.downcast::<J::Outcome>();
        if outcome.is_err() {
            bevy::log::error!("encountered unexpected job result type");
        }
        outcome.map(|n| *n).ok()
    }
}
