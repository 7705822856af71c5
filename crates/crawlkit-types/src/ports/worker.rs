//! Worker pool port: health introspection for the running pool.

#[derive(Debug, Clone)]
pub struct WorkerHealth {
    pub active_workers: usize,
    pub running: bool,
}
