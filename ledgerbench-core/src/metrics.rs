/// Metric names reported through the `metrics` facade.
#[derive(Copy, Clone, Debug)]
pub struct TaskLabels {
    pub success: &'static str,
    pub error: &'static str,
    pub latency: &'static str,
    pub phase_latency: &'static str,
}

pub const TASK_LABELS: TaskLabels = TaskLabels {
    success: "ledgerbench_task_success",
    error: "ledgerbench_task_error",
    latency: "ledgerbench_task_latency",
    phase_latency: "ledgerbench_phase_latency",
};
