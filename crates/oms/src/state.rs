//! Order state machine
//!
//! ```text
//! new ──► pending_payment ──► paid ──► processing ──► completed
//!  │            │              │           │
//!  └────────────┴──────────────┴───────────┴────────► canceled
//! ```
//!
//! `completed` and `canceled` are terminal. Only an order in `processing`
//! may reach `completed`, so a payout can never be debited for an order
//! that skipped payment.

use common::OrderStatus;

use crate::error::{OmsError, Result};

/// Statuses reachable from `from` in one step
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        New => &[PendingPayment, Canceled],
        PendingPayment => &[Paid, Canceled],
        Paid => &[Processing, Canceled],
        Processing => &[Completed, Canceled],
        Completed | Canceled => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Reject any change that is not an edge of the table
pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(OmsError::InvalidTransition { from, to })
    }
}
