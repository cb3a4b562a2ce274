pub mod outbox;
pub mod poller;
pub mod traits;

pub use outbox::OutboxUploader;
pub use poller::{FileConfigPoller, StaticConfigPoller};
pub use traits::{ConfigPoller, Uploader};
