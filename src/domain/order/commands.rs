// ============================================================================
// Order Commands - lifecycle transitions
// ============================================================================
//
// Each command is carried out by sending one named message to the order's
// process instance.
//
// ============================================================================

pub const MESSAGE_PAYMENT: &str = "Message_PAYMENT";
pub const MESSAGE_START_PREPARATION: &str = "Message_START_PREPARATION";
pub const MESSAGE_PREPARED: &str = "Message_PREPARED";
pub const MESSAGE_TAKEN: &str = "Message_TAKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCommand {
    MarkPaid,
    MarkInPreparation,
    MarkPrepared,
    MarkTaken,
}

impl OrderCommand {
    pub fn message_name(&self) -> &'static str {
        match self {
            OrderCommand::MarkPaid => MESSAGE_PAYMENT,
            OrderCommand::MarkInPreparation => MESSAGE_START_PREPARATION,
            OrderCommand::MarkPrepared => MESSAGE_PREPARED,
            OrderCommand::MarkTaken => MESSAGE_TAKEN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::MarkPaid => "MarkPaid",
            OrderCommand::MarkInPreparation => "MarkInPreparation",
            OrderCommand::MarkPrepared => "MarkPrepared",
            OrderCommand::MarkTaken => "MarkTaken",
        }
    }
}
