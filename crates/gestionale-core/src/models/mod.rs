//! Shared data models

mod reservation;

pub use reservation::{Identity, Reservation, ReservationStatus};
