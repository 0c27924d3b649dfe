pub mod alert;
pub mod background;
pub mod page;
pub mod sampler;

pub use alert::{AlertSink, LogAlertSink};
pub use background::{BackgroundHandle, BackgroundRuntime};
pub use page::{PageHandle, PageRuntime};
pub use sampler::{FrameSampler, FrameSource};
