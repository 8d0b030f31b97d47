pub mod id;
pub mod types;

pub use id::{JobId, JobRole};
pub use types::{
    port_number, ExposedPorts, JobSpec, JobState, JobStatus, RuntimeConfig, ScheduleRequest,
};
