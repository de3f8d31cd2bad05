// Runner module - the task/countdown state machine
//
// TaskRunner owns the current task index, the countdown and the phase. It is
// synchronous and has no timers of its own: the session feeds it condition
// events, countdown ticks and cooldown expiry, and reacts to the events it
// returns.
//
// Cycle per task:
// 1. Idle until the current task's condition is met
// 2. CountingDown from the task duration, one step per tick
// 3. Completed when the countdown reaches zero
// 4. Cooldown for a fixed delay, then Idle on the next task

pub mod machine;
pub mod phase;

pub use machine::TaskRunner;
pub use phase::{Phase, RunnerEvent, Status};
