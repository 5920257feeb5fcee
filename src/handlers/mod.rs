pub mod feedback_server;

pub use feedback_server::{AppState, FeedbackServer, FeedbackServerTrait};
