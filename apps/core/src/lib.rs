pub mod action_executor;
pub mod cache;
pub mod config;
pub mod instance_guard;
pub mod logging;
pub mod lookup;
pub mod lookup_session;
pub mod model;
pub mod overlay_state;
pub mod pipeline;
pub mod runtime;
pub mod search;
pub mod text_render;
pub mod ticket_session;
