//! `steps` crate — the `Step` trait and built-in step implementations.
//!
//! Every unit of work the engine runs must implement [`Step`]. The order
//! steps take their external clients ([`OrderTable`], [`Publisher`]) as
//! constructor arguments.

pub mod error;
pub mod mock;
pub mod notify;
pub mod order;
pub mod payload;
pub mod traits;

pub use error::{SinkError, StepError};
pub use notify::{BroadcastTopic, MemoryPublisher, Notification, Publisher};
pub use order::{
    MemoryOrderTable, NotifyOrder, OrderRecord, OrderTable, ProcessOrder, SaveOrder,
    ValidateOrder,
};
pub use traits::{Step, StepContext};
