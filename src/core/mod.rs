pub mod error;
pub mod frame;
pub mod ids;
pub mod message;

pub use error::GuardError;
pub use frame::EncodedFrame;
pub use ids::{PageId, StreamId, SubmissionId};
pub use message::{BackgroundToPage, Destination, PageToBackground};
