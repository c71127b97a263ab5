//! Cooperative cancellation for request exchanges.

mod token;

pub use token::CancellationToken;
