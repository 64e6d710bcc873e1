pub mod client;
pub mod session;
pub mod traits;

pub use client::HttpListingService;
pub use session::Session;
pub use traits::ListingQueryService;
