//! Legal document transitions.
//!
//! Each action lists the states it may start from and the state it leads to.
//! Services call [`Transition::apply`] before any write so an illegal request
//! fails with `DocumentStateConflict` and leaves the store untouched.

use std::fmt::{Debug, Display};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::purchase::PurchaseStatus;
use crate::entities::purchase_order::PurchaseOrderStatus;
use crate::entities::quote::QuoteStatus;
use crate::errors::ServiceError;

pub trait Transition: Copy + Debug {
    type State: Copy + PartialEq + Display + 'static;

    const DOCUMENT: &'static str;

    fn name(self) -> &'static str;
    fn allowed_from(self) -> &'static [Self::State];
    fn target(self) -> Self::State;

    fn permits(self, current: Self::State) -> bool {
        self.allowed_from().contains(&current)
    }

    /// Next state, or `DocumentStateConflict` naming the current one.
    fn apply(self, id: Uuid, current: Self::State) -> Result<Self::State, ServiceError> {
        if self.permits(current) {
            Ok(self.target())
        } else {
            Err(ServiceError::DocumentStateConflict {
                document: Self::DOCUMENT,
                id,
                state: current.to_string(),
                action: self.name(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Confirm,
    Cancel,
    StartPreparation,
    MarkReady,
    ConvertToSale,
}

impl Transition for OrderAction {
    type State = OrderStatus;

    const DOCUMENT: &'static str = "order";

    fn name(self) -> &'static str {
        match self {
            OrderAction::Confirm => "confirm",
            OrderAction::Cancel => "cancel",
            OrderAction::StartPreparation => "start preparing",
            OrderAction::MarkReady => "mark ready",
            OrderAction::ConvertToSale => "convert to sale",
        }
    }

    fn allowed_from(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            OrderAction::Confirm => &[Draft, Pending],
            OrderAction::Cancel => &[Draft, Pending, Confirmed, InPreparation, Ready],
            OrderAction::StartPreparation => &[Confirmed],
            OrderAction::MarkReady => &[InPreparation],
            OrderAction::ConvertToSale => &[Confirmed, InPreparation, Ready],
        }
    }

    fn target(self) -> OrderStatus {
        match self {
            OrderAction::Confirm => OrderStatus::Confirmed,
            OrderAction::Cancel => OrderStatus::Cancelled,
            OrderAction::StartPreparation => OrderStatus::InPreparation,
            OrderAction::MarkReady => OrderStatus::Ready,
            OrderAction::ConvertToSale => OrderStatus::SentToSale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAction {
    Approve,
    ConvertToOrder,
    ConvertToSale,
    /// Back to `pending` after the order made from it is cancelled
    Reopen,
}

impl Transition for QuoteAction {
    type State = QuoteStatus;

    const DOCUMENT: &'static str = "quote";

    fn name(self) -> &'static str {
        match self {
            QuoteAction::Approve => "approve",
            QuoteAction::ConvertToOrder => "convert to order",
            QuoteAction::ConvertToSale => "convert to sale",
            QuoteAction::Reopen => "reopen",
        }
    }

    fn allowed_from(self) -> &'static [QuoteStatus] {
        use QuoteStatus::*;
        match self {
            QuoteAction::Approve => &[Draft, Pending],
            QuoteAction::ConvertToOrder => &[Draft, Pending, Approved],
            QuoteAction::ConvertToSale => &[Pending, Approved],
            QuoteAction::Reopen => &[ConvertedToOrder],
        }
    }

    fn target(self) -> QuoteStatus {
        match self {
            QuoteAction::Approve => QuoteStatus::Approved,
            QuoteAction::ConvertToOrder => QuoteStatus::ConvertedToOrder,
            QuoteAction::ConvertToSale => QuoteStatus::ConvertedToSale,
            QuoteAction::Reopen => QuoteStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOrderAction {
    MarkSent,
    Cancel,
    /// Goods received against it
    Close,
    /// Its receipt was cancelled
    Reopen,
}

impl Transition for PurchaseOrderAction {
    type State = PurchaseOrderStatus;

    const DOCUMENT: &'static str = "purchase order";

    fn name(self) -> &'static str {
        match self {
            PurchaseOrderAction::MarkSent => "send",
            PurchaseOrderAction::Cancel => "cancel",
            PurchaseOrderAction::Close => "close",
            PurchaseOrderAction::Reopen => "reopen",
        }
    }

    fn allowed_from(self) -> &'static [PurchaseOrderStatus] {
        use PurchaseOrderStatus::*;
        match self {
            PurchaseOrderAction::MarkSent => &[Pending],
            PurchaseOrderAction::Cancel => &[Pending, Sent],
            PurchaseOrderAction::Close => &[Pending, Sent],
            PurchaseOrderAction::Reopen => &[Sent, Closed],
        }
    }

    fn target(self) -> PurchaseOrderStatus {
        match self {
            PurchaseOrderAction::MarkSent => PurchaseOrderStatus::Sent,
            PurchaseOrderAction::Cancel => PurchaseOrderStatus::Cancelled,
            PurchaseOrderAction::Close => PurchaseOrderStatus::Closed,
            PurchaseOrderAction::Reopen => PurchaseOrderStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseAction {
    Cancel,
}

impl Transition for PurchaseAction {
    type State = PurchaseStatus;

    const DOCUMENT: &'static str = "purchase";

    fn name(self) -> &'static str {
        "cancel"
    }

    fn allowed_from(self) -> &'static [PurchaseStatus] {
        &[PurchaseStatus::Processed]
    }

    fn target(self) -> PurchaseStatus {
        PurchaseStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Draft, true)]
    #[case(OrderStatus::Pending, true)]
    #[case(OrderStatus::Confirmed, false)]
    #[case(OrderStatus::InPreparation, false)]
    #[case(OrderStatus::Ready, false)]
    #[case(OrderStatus::SentToSale, false)]
    #[case(OrderStatus::Cancelled, false)]
    fn confirm_only_from_draft_or_pending(#[case] from: OrderStatus, #[case] allowed: bool) {
        assert_eq!(OrderAction::Confirm.permits(from), allowed);
    }

    #[rstest]
    #[case(OrderAction::Confirm)]
    #[case(OrderAction::Cancel)]
    #[case(OrderAction::ConvertToSale)]
    #[case(OrderAction::StartPreparation)]
    fn sent_to_sale_is_closed_to_every_action(#[case] action: OrderAction) {
        let id = Uuid::new_v4();
        assert_matches!(
            action.apply(id, OrderStatus::SentToSale),
            Err(ServiceError::DocumentStateConflict { document: "order", state, .. }) if state == "sent_to_sale"
        );
    }

    #[rstest]
    #[case(OrderStatus::Confirmed)]
    #[case(OrderStatus::InPreparation)]
    #[case(OrderStatus::Ready)]
    fn reserved_orders_can_be_cancelled_or_sold(#[case] from: OrderStatus) {
        let id = Uuid::new_v4();
        assert_eq!(
            OrderAction::Cancel.apply(id, from).unwrap(),
            OrderStatus::Cancelled
        );
        assert_eq!(
            OrderAction::ConvertToSale.apply(id, from).unwrap(),
            OrderStatus::SentToSale
        );
        assert!(from.holds_reservation());
    }

    #[test]
    fn preparation_progresses_in_order() {
        let id = Uuid::new_v4();
        let preparing = OrderAction::StartPreparation
            .apply(id, OrderStatus::Confirmed)
            .unwrap();
        assert_eq!(
            OrderAction::MarkReady.apply(id, preparing).unwrap(),
            OrderStatus::Ready
        );
        assert!(OrderAction::MarkReady.apply(id, OrderStatus::Confirmed).is_err());
    }

    #[rstest]
    #[case(QuoteStatus::Draft, false)]
    #[case(QuoteStatus::Pending, true)]
    #[case(QuoteStatus::Approved, true)]
    #[case(QuoteStatus::ConvertedToOrder, false)]
    #[case(QuoteStatus::ConvertedToSale, false)]
    fn quote_to_sale_sources(#[case] from: QuoteStatus, #[case] allowed: bool) {
        assert_eq!(QuoteAction::ConvertToSale.permits(from), allowed);
    }

    #[test]
    fn converted_quote_reopens_to_pending() {
        assert_eq!(
            QuoteAction::Reopen
                .apply(Uuid::new_v4(), QuoteStatus::ConvertedToOrder)
                .unwrap(),
            QuoteStatus::Pending
        );
    }

    #[test]
    fn cancelled_purchase_cannot_be_cancelled_again() {
        assert_matches!(
            PurchaseAction::Cancel.apply(Uuid::new_v4(), PurchaseStatus::Cancelled),
            Err(ServiceError::DocumentStateConflict {
                document: "purchase",
                action: "cancel",
                ..
            })
        );
    }

    #[test]
    fn purchase_order_lifecycle() {
        let id = Uuid::new_v4();
        let sent = PurchaseOrderAction::MarkSent
            .apply(id, PurchaseOrderStatus::Pending)
            .unwrap();
        let closed = PurchaseOrderAction::Close.apply(id, sent).unwrap();
        assert_eq!(
            PurchaseOrderAction::Reopen.apply(id, closed).unwrap(),
            PurchaseOrderStatus::Pending
        );
        assert!(PurchaseOrderAction::Cancel
            .apply(id, PurchaseOrderStatus::Closed)
            .is_err());
    }
}
