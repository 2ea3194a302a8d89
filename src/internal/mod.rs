//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;
pub(crate) mod in_flight;

pub(crate) use circular::StackGuard;
pub(crate) use dispose_bag::{Disposable, DisposeBag};
pub(crate) use in_flight::InFlight;
