use crate::types::{Payload, Task, TaskPriority, TaskStatus};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use uuid::Uuid;

/// Task records plus the ordered list of tasks still waiting for an agent.
///
/// The queue is kept sorted by descending priority. Tasks of equal priority
/// keep their submission order.
pub struct TaskStore {
    tasks: HashMap<Uuid, Task>,
    /// Every task id in creation order.
    order: Vec<Uuid>,
    /// Submission sequence number per task, the FIFO key within a priority.
    sequence: HashMap<Uuid, usize>,
    queue: Vec<Uuid>,
    completed: Vec<Uuid>,
}

impl TaskStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            order: Vec::new(),
            sequence: HashMap::new(),
            queue: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Store a pending task and enqueue it behind every task of equal or higher priority.
    pub fn submit(&mut self, task: Task) -> Uuid {
        let id = task.id;
        self.tasks.insert(id, task);
        self.sequence.insert(id, self.order.len());
        self.order.push(id);
        self.enqueue(id);
        id
    }

    /// Insert `id` at its place in the queue: higher priority first, then
    /// earlier submission.
    fn enqueue(&mut self, id: Uuid) {
        let key = self.queue_key(id);
        let position = self
            .queue
            .partition_point(|queued| self.queue_key(*queued) < key);
        self.queue.insert(position, id);
    }

    fn queue_key(&self, id: Uuid) -> (Reverse<TaskPriority>, usize) {
        let priority = self
            .tasks
            .get(&id)
            .map(|t| t.priority)
            .unwrap_or(TaskPriority::Low);
        let sequence = self.sequence.get(&id).copied().unwrap_or(usize::MAX);
        (Reverse(priority), sequence)
    }

    /// Queued task ids in scheduling order.
    pub fn queued(&self) -> &[Uuid] {
        &self.queue
    }

    /// Move a pending task to `assigned` and drop it from the queue.
    pub(crate) fn mark_assigned(&mut self, id: Uuid, agent_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Assigned;
                task.assigned_agent = Some(agent_id);
                task.started_at = Some(now);
                self.queue.retain(|queued| *queued != id);
                true
            }
            _ => false,
        }
    }

    /// Put an assigned task back in the queue after its agent dropped it.
    ///
    /// The task returns to `pending` with no agent and no start time, ahead
    /// of any later submission of the same priority. Returns `false` when the
    /// task is unknown or not assigned.
    pub(crate) fn requeue(&mut self, id: Uuid) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Assigned => {
                task.status = TaskStatus::Pending;
                task.assigned_agent = None;
                task.started_at = None;
            }
            _ => return false,
        }
        self.enqueue(id);
        true
    }

    /// Close an assigned task as completed (no error) or failed.
    ///
    /// Returns the finished task, or `None` when the task is unknown or not
    /// currently assigned.
    pub(crate) fn finish(
        &mut self,
        id: Uuid,
        outputs: Payload,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<&Task> {
        let task = self.tasks.get_mut(&id)?;
        if task.status != TaskStatus::Assigned {
            return None;
        }
        task.status = if error.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        task.completed_at = Some(now);
        task.outputs = outputs;
        task.error = error;
        self.completed.push(id);
        self.queue.retain(|queued| *queued != id);
        self.tasks.get(&id)
    }

    /// Task by id.
    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Whether the task exists and currently holds an agent.
    pub fn is_assigned(&self, id: Uuid) -> bool {
        self.tasks
            .get(&id)
            .is_some_and(|t| t.status == TaskStatus::Assigned)
    }

    /// All tasks in creation order.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Finished tasks in completion order.
    pub fn completed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.completed.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Tasks waiting for an agent.
    pub fn pending_count(&self) -> usize {
        self.count(TaskStatus::Pending)
    }

    /// Tasks held by an agent.
    pub fn running_count(&self) -> usize {
        self.count(TaskStatus::Assigned)
    }

    /// Tasks that finished, successfully or not.
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Length of the pending queue.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
