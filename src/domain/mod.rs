//! Pure domain layer (C1-C4, C7's shapes, C8's math): no async, no I/O,
//! no singletons. Every public function here is either a stateless
//! transform over plain data or a mutation of an explicitly-passed-in
//! struct. Everything that touches a filesystem, a clock, or a network
//! socket lives in `application` or `infrastructure` instead.

pub mod context;
pub mod errors;
pub mod ledger;
pub mod market;
pub mod ports;
pub mod position;
pub mod risk;
pub mod signal;
pub mod tenant;
