pub mod data_manager;

pub use data_manager::{NullDataManager, TracingDataManager};
