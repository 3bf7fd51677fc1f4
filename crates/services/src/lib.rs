//! Application services for WorldFeed: the bucket cache and the operations
//! built on top of it.

pub mod cache;
pub mod feed;
pub mod maintenance;
pub mod payments;

pub use cache::{BucketCache, BucketState, Change};
pub use feed::{CommunityNews, FeedService, NewCommunity, NewNews, NewsFilter, UpvoteOutcome};
pub use maintenance::{MaintenanceService, DEMO_NEWS};
pub use payments::{ConfirmOutcome, PaymentConfirmation, PaymentIntent, PaymentRequest, PaymentService};
