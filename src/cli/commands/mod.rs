mod serve;
mod tail;

pub use serve::execute_serve;
pub use tail::{execute_tail, websocket_url};
