//! The observable primitive shared across all portal crates.

pub mod observable;

pub use observable::{
    NotifyFailure, NotifyReport, Observable, Subscriber, SubscriberRef, subscriber_fn,
};
