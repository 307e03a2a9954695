//! Tiingo: REST client, supported-ticker list and the IEX live stream.

mod model;
pub mod rest;
pub mod socket;
pub mod stream;

pub use rest::Tiingo;
pub use socket::{decode_frame, subscribe_message, unsubscribe_message, IexEvent, IexKind};
pub use stream::{TiingoStream, Watcher};
