// src/verbs/mod.rs
// Verb surface: strict request schemas, the dispatcher, and PROV-O
// activity recording

mod dispatcher;
mod provenance;
mod requests;
mod responses;

pub use dispatcher::Dispatcher;
pub use provenance::record_activity;
pub use requests::{
    AskRequest, AugmentOperation, AugmentRequest, ComposeRequest, DecomposeRequest,
    ForgetRequest, InspectRequest, NavigateRequest, PanRequest, RecallRequest, RememberRequest,
    TellRequest, TellType, TiltRequest, VerbCall, ZoomRequest,
};
pub use responses::{VerbError, VerbResponse};
