pub mod bidding;
pub mod lifecycle;
pub mod model;
pub mod winner;
