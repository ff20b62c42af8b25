//! MongoDB-backed repositories for tasks, outbox events, and reservations,
//! with multi-document transaction support for the atomic writes the
//! upload assembler and task processor depend on.

pub mod db;
pub mod error;
pub mod models;
pub mod repo;

pub use db::Store;
pub use error::{StoreError, StoreResult};
pub use models::{
    Event, EventEnvelope, EventError, EventStatus, Reservation, ReservationStatus, RowError, Task, TaskCreatedPayload,
    TaskStatus,
};
pub use repo::{create_task_with_event, transaction_options, EventRepository, ReservationRepository, TaskRepository};
