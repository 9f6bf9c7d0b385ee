//! Final-phase notification.
//!
//! Once every stage has finished, the executor builds a [`Notification`] from
//! the run record and hands it to each [`Notifier`]. [`ReportPackager`]
//! optionally compresses the report directory first so the bundle can be
//! attached. Failures here are logged and never change the run status.

mod notification;
mod notifier;
mod packager;

#[cfg(test)]
pub use notifier::MockNotifier;
pub use notification::{Notification, StageLine};
pub use notifier::{
    CollectingNotifier, JsonFileNotifier, LoggingNotifier, Notifier, NOTIFICATION_FILE,
};
pub use packager::{ReportPackager, DEFAULT_COMPRESS_COMMAND};
