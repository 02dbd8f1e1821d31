//! Use cases over tenders and bids.
//!
//! Every operation follows the same order: resolve the requester, load the
//! entity, check the guard, then append a new version only if something changed.

mod bid;
mod tender;

pub use bid::BidService;
pub use tender::TenderService;
