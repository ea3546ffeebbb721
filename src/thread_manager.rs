use log::info;
pub type TaskID = i32;

/// Unit of work driven repeatedly on its own thread. Returning `false` from
/// `step` ends the task.
pub trait SteppableTask: Send + 'static {
    fn step(&mut self) -> bool;

    fn name(&self) -> String {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("task")
            .to_string()
    }
}

pub struct ThreadManager {
    next_task_id: TaskID,
    tasks: std::collections::HashMap<TaskID, ManagedTask>,
}

impl ThreadManager {
    #[must_use]
    pub fn new() -> Self {
        ThreadManager {
            next_task_id: 0,
            tasks: std::collections::HashMap::new(),
        }
    }

    /// Spawns `task` on a dedicated thread.
    ///
    /// A zero `period` steps the task back to back; otherwise steps are spaced
    /// `period` apart and the stop signal is observed while waiting.
    ///
    /// # Panics
    ///
    /// Will panic if the thread does not spawn.
    pub fn add_task<T>(&mut self, task: T, period: std::time::Duration) -> TaskID
    where
        T: SteppableTask,
    {
        let id = self.next_task_id;
        let name = task.name();

        let (stop_sender, stop_receiver) = crossbeam_channel::bounded::<()>(1);

        let thread_name = name.clone();
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                if period.is_zero() {
                    run_task_continuously(task, &stop_receiver);
                } else {
                    run_task_with_period(task, period, &stop_receiver);
                }
                info!("ThreadManager: task '{thread_name}' finished.");
            })
            .expect("Failed to spawn thread");
        info!("ThreadManager: started task '{name}' with id {id}.");

        self.tasks.insert(
            id,
            ManagedTask {
                name,
                handle,
                stop_sender,
            },
        );
        self.next_task_id += 1;
        id
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_task_finished(&self, task_id: TaskID) -> bool {
        self.tasks
            .get(&task_id)
            .is_none_or(|task| task.handle.is_finished())
    }

    pub fn stop_task(&self, task_id: TaskID) {
        if let Some(task) = self.tasks.get(&task_id) {
            info!("ThreadManager: signaling task '{}' to stop.", task.name);
            let _ = task.stop_sender.try_send(());
        }
    }

    pub fn stop_all_tasks(&self) {
        info!("ThreadManager: signaling all tasks to stop...");
        for task in self.tasks.values() {
            let _ = task.stop_sender.try_send(());
        }
    }

    pub fn wait_on_task_finish(&mut self, task_id: TaskID) {
        if let Some(task) = self.tasks.remove(&task_id) {
            if task.handle.join().is_err() {
                log::error!("ThreadManager: task '{}' panicked.", task.name);
            }
        }
    }

    pub fn wait_on_all_tasks(&mut self) {
        let ids: Vec<TaskID> = self.tasks.keys().copied().collect();
        for id in ids {
            self.wait_on_task_finish(id);
        }
    }
}

impl Default for ThreadManager {
    fn default() -> Self {
        ThreadManager::new()
    }
}

fn run_task_continuously<T: SteppableTask>(
    mut task: T,
    stop_receiver: &crossbeam_channel::Receiver<()>,
) {
    loop {
        match stop_receiver.try_recv() {
            Ok(()) | Err(crossbeam_channel::TryRecvError::Disconnected) => break,
            Err(crossbeam_channel::TryRecvError::Empty) => {}
        }

        if !task.step() {
            break;
        }

        std::thread::yield_now();
    }
}

fn run_task_with_period<T: SteppableTask>(
    mut task: T,
    period: std::time::Duration,
    stop_receiver: &crossbeam_channel::Receiver<()>,
) {
    let mut next_run = std::time::Instant::now();
    loop {
        if !task.step() {
            break;
        }

        next_run += period;
        let now = std::time::Instant::now();

        if next_run > now {
            match stop_receiver.recv_timeout(next_run - now) {
                Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            }
        } else {
            // lagging behind, restart the schedule from now
            log::debug!("ThreadManager: step overran its period");
            next_run = now;

            if let Ok(()) = stop_receiver.try_recv() {
                break;
            }
        }
    }
}

struct ManagedTask {
    name: String,
    handle: std::thread::JoinHandle<()>,
    stop_sender: crossbeam_channel::Sender<()>,
}
