// src/zpt/mod.rs
// Zoom/Pan/Tilt navigation state and its RDF materialisation

mod navigation;
mod state;

pub use navigation::{
    parse_view_quads, session_close_quad, session_quads, view_quads, NavigationView,
};
pub use state::{PanFilters, PanUpdate, TemporalRange, ZptState};
