pub mod engine;
pub mod states;

pub use engine::{BorrowFlow, FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{BorrowStage, FlowAction, FlowContext, FlowEvent, FlowType, TransitionOutcome};
