//! Domain types shared by the provider, the store and the fetch loop.

pub mod candle;
pub mod resolution;
pub mod subject;

pub use candle::{Candle, DateFormat, HistoryPayload};
pub use resolution::{ParseResolutionError, Resolution};
pub use subject::{Subject, SubjectError};
