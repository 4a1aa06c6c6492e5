//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which provides a framework for executing work asynchronously across multiple threads.
//!
//! ## Core Components
//! - `Task`: Represents a unit of work that can be executed asynchronously
//! - `TaskResult`: Represents the result of a completed task
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the main thread with the context `C`
//! 5. The result can spawn new tasks
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the main thread
//! - Tasks own immutable snapshots of their inputs; only `handle_result()` touches `C`

/// A unit of work that runs on a worker thread.
///
/// Tasks should own everything they read (usually through `Arc`s of immutable data) and
/// must not reach into state that the main thread mutates.
pub trait Task<C>: Send {
    /// Performs the work and returns a result to hand back to the main thread.
    ///
    /// Runs on a background thread. Tasks do pure computation and never block.
    fn process(&self) -> Box<dyn TaskResult<C> + Send>;
}

/// The result of processing a `Task`.
pub trait TaskResult<C>: Send {
    /// Handles the result on the main thread.
    ///
    /// # Arguments
    /// * `context` - The state results are applied to
    ///
    /// # Returns
    /// Follow-up tasks to schedule (can be empty).
    fn handle_result(self: Box<Self>, context: &mut C) -> Vec<Box<dyn Task<C> + Send>>;
}
