//! Canonical structured event names used across `reactive-stream`.

// Service orchestration and setup events.
pub const SERVICE_CREATED: &str = "service_created";
pub const SUBSCRIBE_REQUESTED: &str = "subscribe_requested";
pub const TRANSPORT_RESOLVED: &str = "transport_resolved";
pub const TRANSPORT_UNAVAILABLE: &str = "transport_unavailable";
pub const SETUP_CANCELLED: &str = "setup_cancelled";
pub const SUBSCRIPTION_TASK_ABORTED: &str = "subscription_task_aborted";
pub const SETUP_FAILED: &str = "setup_failed";
pub const CHANNEL_OPEN_OK: &str = "channel_open_ok";
pub const CHANNEL_OPEN_FAILED: &str = "channel_open_failed";
pub const CHANNEL_CLOSED: &str = "channel_closed";
pub const STACK_REGISTERED: &str = "stack_registered";

// Protocol state machine events.
pub const PROTOCOL_STATE_CHANGED: &str = "protocol_state_changed";
pub const PROTOCOL_STATE_REJECTED: &str = "protocol_state_rejected";
pub const PROTOCOL_FRAME_RECEIVED: &str = "protocol_frame_received";
pub const PROTOCOL_FRAME_IGNORED: &str = "protocol_frame_ignored";
pub const PROTOCOL_SEND_FAILED: &str = "protocol_send_failed";
pub const PROTOCOL_FAILED: &str = "protocol_failed";
pub const PROTOCOL_COMPLETED: &str = "protocol_completed";
pub const PROTOCOL_CANCELLED: &str = "protocol_cancelled";
pub const DEMAND_SENT: &str = "demand_sent";

// Callback bridge events.
pub const SUBSCRIPTION_CANCEL_REQUESTED: &str = "subscription_cancel_requested";
pub const DELIVERY_SUPPRESSED: &str = "delivery_suppressed";
pub const CALLBACK_PANICKED: &str = "callback_panicked";
