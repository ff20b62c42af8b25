//! AMQP plumbing for the reservation pipeline: the transactional-outbox
//! dispatcher that drains `events` into the bus, the competing-consumers
//! task processor that claims and executes ingestion tasks, the DLX/delay
//! topology wiring both sides agree on, and the XLSX row parser the
//! processor streams workbooks through.

pub mod dispatcher;
pub mod error;
pub mod processor;
pub mod topology;
pub mod xlsx;

pub use dispatcher::{DispatcherHandle, OutboxDispatcher};
pub use error::{BusError, BusResult};
pub use processor::{ProcessorHandle, TaskProcessor, MAX_ROWS_PER_TRANSACTION};
pub use xlsx::{parse, ParsedWorkbook};
