//! Checkout and the admin verification workflow that turns a confirmed payment
//! into an enrollment.
//!
//! The payment status change and the enrollment write are applied by a single
//! repository call ([`PaymentRepository::settle`]) so both land together or
//! not at all. Mail goes out afterwards and never undoes a committed change.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    CheckoutRequest, NewPayment, Payment, PaymentMethod, PaymentStatus, RefundOutcome, Settlement,
    SettlementOutcome, VerificationDecision,
};
pub use repository::PaymentRepository;
pub use router::payment_router;
pub use service::{PaymentError, PaymentService, VerificationOutcome};
