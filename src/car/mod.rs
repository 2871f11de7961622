pub mod fsm;
pub mod session;
mod fsm_tests;

pub use fsm::CarFsm;
pub use session::CarSession;
