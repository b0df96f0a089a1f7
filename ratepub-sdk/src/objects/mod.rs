pub mod event;
pub mod rates;
pub mod relay;

pub use event::{EVENT_KIND, SignedEvent, Tag, UnsignedEvent};
pub use rates::RateContent;
pub use relay::{ClientMessage, RelayMessage, RelayMessageError};
