pub mod catalog;
pub mod datum;
pub mod executor;
pub mod planner;
pub mod query;
pub mod storage;
pub mod tx;
