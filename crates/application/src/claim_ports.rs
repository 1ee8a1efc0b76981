mod channel;
mod claim;
mod events;
mod results;
mod store;
mod token;

pub use channel::{LeadListingSource, PushChannelConnector, PushConnection};
pub use claim::ClaimStrategy;
pub use events::PushEventLog;
pub use results::{ClaimResultRepository, RecordStatus};
pub use store::{JobRepository, QueueStats};
pub use token::{AuthTokenCache, TokenProvider};
