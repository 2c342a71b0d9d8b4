pub use crate::client::{HttpResponse, RequestError};
pub use crate::config::{Configuration, LoadTestDefault, LoadTestDefaultType};
pub use crate::metrics::LoadTestMetrics;
pub use crate::scenario::{IterationError, IterationFunction, IterationResult, Scenario};
pub use crate::stage::{Stage, StagePlan};
pub use crate::threshold::{RunResult, Threshold};
pub use crate::user::VirtualUser;
pub use crate::{scenario, CancelHandle, LoadTest, LoadTestError};
