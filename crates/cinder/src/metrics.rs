//! Process-global command counters.
//!
//! Recorded through the `metrics` facade so applications pick the
//! exporter; without an installed recorder these are no-ops. Counters
//! are incremented once per completed command, whether the completion
//! came from a server reply or a connection teardown.

use metrics::counter;

/// Records a command that completed with a success value.
#[inline]
pub(crate) fn on_command_succeeded() {
    counter!("cinder_commands_succeeded_total").increment(1);
}

/// Records a command that completed with an error.
#[inline]
pub(crate) fn on_command_failed() {
    counter!("cinder_commands_failed_total").increment(1);
}
