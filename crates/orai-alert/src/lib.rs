//! Alert evaluation and digest delivery.
//!
//! [`AlertEvaluator`] runs one pass over all active rules: resolve current
//! temperature per place, apply quiet hours and cooldown, record a delivery
//! row and send the immediate notification. [`DigestProcessor`] batches one
//! day's digest-enabled deliveries per user into a single summary email.
//! Both share one [`orai_notify::SendThrottle`] so their combined send rate
//! stays within the relay's limits.

pub mod digest;
pub mod evaluator;

pub use digest::DigestProcessor;
pub use evaluator::AlertEvaluator;

#[cfg(test)]
mod tests;
