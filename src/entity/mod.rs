//! SeaORM entity definitions for PostgreSQL database.

pub mod service_order;
