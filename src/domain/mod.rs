// Pure types and port contracts. Service logic lives in `application`.
pub mod errors;
pub mod market;
pub mod ports;
pub mod risk;
pub mod trading;
