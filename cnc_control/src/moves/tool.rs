//! Tool on/off switching. Synchronous: no steps, no ticks.

use tracing::debug;

use cnc_common::hal::StepperHal;

use super::Dispatch;

/// Queued tool payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolPlan {
    pub id: u8,
    pub on: bool,
}

/// Drive the tool output. Always completes immediately.
pub fn tool_action<H: StepperHal>(plan: &ToolPlan, hal: &mut H) -> Dispatch {
    debug!(tool = plan.id, on = plan.on, "tool switched");
    hal.set_tool(plan.id, plan.on);
    Dispatch::Advance
}
