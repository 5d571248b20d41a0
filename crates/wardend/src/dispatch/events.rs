/// Notifications delivered to the dispatcher loop from other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SupervisorEvent {
    /// At least one child process changed state.
    ChildExited,
    /// A termination signal arrived; carries the signal number.
    Terminate(i32),
}
