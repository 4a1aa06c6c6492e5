//! # Task Management System
//!
//! This module provides the work queue that runs chunk generation off the main thread.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskResult`: The result of a completed task, which can spawn additional tasks
//! - `TaskChannel`: Communication channel between the main thread and one worker thread
//!
//! The manager is an ordinary value owned by whoever drives it; there is no global
//! dispatcher. Each worker has a dedicated channel and at most `MAX_TASKS_IN_FLIGHT`
//! tasks, and anything beyond that waits in a FIFO queue on the main thread.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send back results
//! 4. Results are handled on the main thread in `process_completed_tasks()`, which never
//!    blocks, or in `drain()`, which waits until no work is left
//! 5. Results can spawn new tasks
//!
//! ## Example Usage
//! ```
//! use voxel_terrain::engine_state::task_management::{
//!     task::{Task, TaskResult},
//!     TaskManager,
//! };
//!
//! struct Square(u64);
//! struct Squared(u64);
//!
//! impl Task<u64> for Square {
//!     fn process(&self) -> Box<dyn TaskResult<u64> + Send> {
//!         Box::new(Squared(self.0 * self.0))
//!     }
//! }
//!
//! impl TaskResult<u64> for Squared {
//!     fn handle_result(self: Box<Self>, total: &mut u64) -> Vec<Box<dyn Task<u64> + Send>> {
//!         *total += self.0;
//!         Vec::new()
//!     }
//! }
//!
//! let mut total = 0;
//! let mut task_manager = TaskManager::new(2);
//! for i in 1..=3 {
//!     task_manager.publish_task(Box::new(Square(i)));
//! }
//! task_manager.shutdown(&mut total)?;
//! assert_eq!(total, 14);
//! # Ok::<(), voxel_terrain::error::TerrainError>(())
//! ```

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{error, info, trace};
use task::{Task, TaskResult};

use crate::error::TerrainError;

type BoxedTask<C> = Box<dyn Task<C> + Send>;
type BoxedResult<C> = Box<dyn TaskResult<C> + Send>;

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `result_receiver`: Receives task results from worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined when the manager is dropped
pub struct TaskChannel<C> {
    task_sender: Sender<BoxedTask<C>>,
    result_receiver: Receiver<BoxedResult<C>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Type Parameters
/// - `C`: The main-thread state that task results are applied to
pub struct TaskManager<C: 'static> {
    channels: Vec<TaskChannel<C>>,
    queued_tasks: VecDeque<BoxedTask<C>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Kept at 1 so a long task never holds shorter ones hostage behind it; everything else
/// waits in the shared queue and goes to whichever worker frees up first.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl<C: 'static> TaskManager<C> {
    /// Creates a new `TaskManager` with `num_workers` worker threads (at least one).
    pub fn new(num_workers: usize) -> Self {
        info!(
            "Available parallelism: {:?}",
            thread::available_parallelism()
        );
        let num_workers = num_workers.max(1);
        let mut channels = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let (task_tx, task_rx) = channel::<BoxedTask<C>>();
            let (result_tx, result_rx) = channel::<BoxedResult<C>>();

            let worker = thread::spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let result = task.process();
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                worker: Some(worker),
            });
        }

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        }
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.channels.len()
    }

    /// Tasks waiting for a free worker.
    pub fn num_queued_tasks(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Tasks currently assigned to workers.
    pub fn num_tasks_in_flight(&self) -> usize {
        self.channels.iter().map(|c| c.num_tasks_in_flight).sum()
    }

    /// Whether any task is queued or running.
    pub fn has_pending_work(&self) -> bool {
        !self.queued_tasks.is_empty() || self.num_tasks_in_flight() > 0
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was successfully sent to the worker
    /// - `Err(task)` if the send failed (e.g., worker disconnected)
    fn try_send_task(&mut self, task: BoxedTask<C>, channel_idx: usize) -> Result<(), BoxedTask<C>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds an available worker channel, round-robin from the last one used.
    fn find_available_channel(&self) -> Option<usize> {
        let len = self.channels.len();
        (0..len)
            .map(|offset| (self.current_channel + offset) % len)
            .find(|&idx| self.channels[idx].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on an available worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: BoxedTask<C>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Moves queued tasks to workers, oldest first, until every worker is busy.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                return;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    return;
                }
            }
        }
    }

    /// Handles every result that has arrived so far, without blocking.
    ///
    /// Follow-up tasks are published after all results have been handled.
    ///
    /// # Returns
    /// The number of results handled.
    ///
    /// # Errors
    /// `TerrainError::WorkerDisconnected` if a worker with tasks in flight has exited.
    pub fn process_completed_tasks(&mut self, context: &mut C) -> Result<usize, TerrainError> {
        let mut tasks_to_queue = Vec::new();
        let mut handled = 0;
        for channel in &mut self.channels {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(result) => {
                        channel.num_tasks_in_flight -= 1;
                        handled += 1;
                        tasks_to_queue.extend(result.handle_result(context));
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if channel.num_tasks_in_flight > 0 {
                            error!(
                                "Worker exited with {} task(s) in flight",
                                channel.num_tasks_in_flight
                            );
                            return Err(TerrainError::WorkerDisconnected);
                        }
                        break;
                    }
                }
            }
        }

        for task in tasks_to_queue {
            self.publish_task(task);
        }
        Ok(handled)
    }

    /// Blocks until every queued and in-flight task, including follow-ups, has been
    /// handled.
    pub fn drain(&mut self, context: &mut C) -> Result<(), TerrainError> {
        loop {
            self.process_completed_tasks(context)?;
            self.process_queued_tasks();
            let Some(channel_idx) = self
                .channels
                .iter()
                .position(|channel| channel.num_tasks_in_flight > 0)
            else {
                if self.queued_tasks.is_empty() {
                    return Ok(());
                }
                // Queued work but nowhere to run it: every worker is gone.
                return Err(TerrainError::WorkerDisconnected);
            };

            let channel = &mut self.channels[channel_idx];
            let result = channel
                .result_receiver
                .recv()
                .map_err(|_| TerrainError::WorkerDisconnected)?;
            channel.num_tasks_in_flight -= 1;
            trace!("Drained a result from worker {channel_idx}");
            for task in result.handle_result(context) {
                self.publish_task(task);
            }
        }
    }

    /// Drains all remaining work, then stops and joins the workers.
    pub fn shutdown(mut self, context: &mut C) -> Result<(), TerrainError> {
        self.drain(context)
    }
}

impl<C: 'static> Drop for TaskManager<C> {
    fn drop(&mut self) {
        self.queued_tasks.clear();
        for channel in self.channels.drain(..) {
            let TaskChannel {
                task_sender,
                result_receiver,
                worker,
                ..
            } = channel;
            // Closing the task channel ends the worker loop once its current task is done.
            drop(task_sender);
            if let Some(worker) = worker {
                if worker.join().is_err() {
                    error!("Worker thread panicked");
                }
            }
            drop(result_receiver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Add(u64);
    struct Added(u64);

    impl Task<Vec<u64>> for Add {
        fn process(&self) -> Box<dyn TaskResult<Vec<u64>> + Send> {
            Box::new(Added(self.0))
        }
    }

    impl TaskResult<Vec<u64>> for Added {
        fn handle_result(
            self: Box<Self>,
            seen: &mut Vec<u64>,
        ) -> Vec<Box<dyn Task<Vec<u64>> + Send>> {
            seen.push(self.0);
            // Every value below 3 spawns one follow-up.
            if self.0 < 3 {
                vec![Box::new(Add(self.0 + 10))]
            } else {
                Vec::new()
            }
        }
    }

    struct Panics;

    impl Task<Vec<u64>> for Panics {
        fn process(&self) -> Box<dyn TaskResult<Vec<u64>> + Send> {
            panic!("task failure");
        }
    }

    #[test]
    fn test_excess_tasks_are_queued() {
        let mut manager = TaskManager::<Vec<u64>>::new(2);
        let scheduled: Vec<bool> = (0..5).map(|i| manager.publish_task(Box::new(Add(i)))).collect();
        assert_eq!(scheduled, vec![true, true, false, false, false]);
        assert_eq!(manager.num_tasks_in_flight(), 2);
        assert_eq!(manager.num_queued_tasks(), 3);
    }

    #[test]
    fn test_drain_runs_everything_including_follow_ups() {
        let mut seen = Vec::new();
        let mut manager = TaskManager::new(3);
        for i in 0..6 {
            manager.publish_task(Box::new(Add(i)));
        }
        manager.drain(&mut seen).unwrap();
        assert!(!manager.has_pending_work());

        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 10, 11, 12]);
    }

    #[test]
    fn test_process_completed_tasks_does_not_block() {
        let mut seen = Vec::new();
        let mut manager = TaskManager::new(1);
        assert_eq!(manager.process_completed_tasks(&mut seen).unwrap(), 0);
        manager.publish_task(Box::new(Add(7)));
        manager.shutdown(&mut seen).unwrap();
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn test_worker_panic_surfaces_as_disconnection() {
        let mut seen = Vec::new();
        let mut manager = TaskManager::new(1);
        manager.publish_task(Box::new(Panics));
        assert!(matches!(
            manager.drain(&mut seen),
            Err(TerrainError::WorkerDisconnected)
        ));
    }
}
