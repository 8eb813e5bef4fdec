//! Wire contract with the chat orchestration server.
//!
//! Event names and payload field names here must match the server
//! byte-for-byte; everything else in the crate works on these typed forms.

pub mod element;
pub mod event;
pub mod outbound;
pub mod spec;
pub mod step;

pub use element::{Element, ElementDisplay, ElementPartition, ElementType};
pub use event::{CallResponse, DecodeError, ServerEvent, StreamToken};
pub use outbound::{AckHandle, Outgoing};
pub use spec::{
    normalize_reply, Action, AskSpec, GatherCommandKind, GatherCommandResponse, GatherCommandSpec,
    InputSpec, MessageSpec, PreselectionKind, PreselectionSpec, Spec, UiSettingsCommand,
    UiSettingsFn, UserInputKind, GATHER_SUCCESS_CODE,
};
pub use step::{Step, StepType, ThreadSnapshot, Timestamp, WAITING_STEP_ID};
