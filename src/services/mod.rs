pub mod feedback_store;
pub mod tdx_client;
pub mod ticket_creator;

pub use feedback_store::{FeedbackStore, InMemoryFeedbackStore};
pub use tdx_client::{QueryParams, TdxApi, TdxClient};
pub use ticket_creator::{TicketCreator, TicketFailure, TicketResult};
