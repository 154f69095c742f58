pub mod sim_broker;

pub use sim_broker::SimulatedBroker;
