pub mod frame;
pub mod messages;

pub use frame::recv_frame;
pub use frame::send_frame;
pub use frame::FrameError;
pub use messages::Message;
pub use messages::MessageError;
