use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes an event for a change that is already committed.
    /// A closed channel is logged; the caller's operation still succeeded.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "domain event dropped");
        }
    }
}

/// Domain events emitted after a pipeline transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    OrderCreated(Uuid),
    OrderConfirmed(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    QuoteConverted {
        quote_id: Uuid,
        order_id: Option<Uuid>,
        sale_id: Option<Uuid>,
    },
    SaleCreated {
        sale_id: Uuid,
        order_id: Option<Uuid>,
        quote_id: Option<Uuid>,
        total: Decimal,
    },
    PurchaseOrdersGenerated {
        order_id: Uuid,
        purchase_order_ids: Vec<Uuid>,
    },
    PurchaseReceived(Uuid),
    PurchaseCancelled(Uuid),
    InventoryAdjusted {
        product_id: Uuid,
        warehouse_id: Uuid,
        delta: i32,
        reason: String,
    },
    StockReconciled {
        purchase_id: Uuid,
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    },
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockReconciled {
                purchase_id,
                product_id,
                quantity,
                ..
            } => {
                warn!(
                    purchase_id = %purchase_id,
                    product_id = %product_id,
                    quantity,
                    "stock reconciliation recorded"
                );
            }
            other => info!(event = ?other, "domain event"),
        }
    }

    info!("Event channel closed, stopping event processing");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.publish(Event::OrderConfirmed(id)).await;

        assert_eq!(rx.recv().await, Some(Event::OrderConfirmed(id)));
    }

    #[tokio::test]
    async fn publish_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        sender.publish(Event::PurchaseCancelled(Uuid::new_v4())).await;
        assert!(sender
            .send(Event::PurchaseCancelled(Uuid::new_v4()))
            .await
            .is_err());
    }
}
