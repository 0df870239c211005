use super::{EmailMessage, EmailTemplates, Mailer};
use crate::common::error::Result;
use crate::domain::{Order, OrderItem};
use crate::metrics;
use crate::storage::Storage;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Sends order e-mails in the background; failures never reach the caller.
#[derive(Clone)]
pub struct OrderNotifier {
    mailer: Arc<dyn Mailer>,
    templates: Arc<EmailTemplates>,
    storage: Arc<dyn Storage>,
    shop_name: String,
}

impl OrderNotifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        templates: Arc<EmailTemplates>,
        storage: Arc<dyn Storage>,
        shop_name: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            templates,
            storage,
            shop_name: shop_name.into(),
        }
    }

    /// Queue the customer confirmation and, when configured, the merchant notice.
    pub fn order_placed(&self, order: Order, items: Vec<OrderItem>) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.send_customer_confirmation(&order, &items).await;
            notifier.send_merchant_notification(&order, &items).await;
        })
    }

    async fn send_customer_confirmation(&self, order: &Order, items: &[OrderItem]) {
        match self
            .templates
            .order_confirmation(order, items, &self.shop_name)
        {
            Ok(Some(message)) => self.deliver("customer", &order.order_id, message).await,
            Ok(None) => {}
            Err(e) => {
                metrics::mail::failed("customer");
                error!("Failed to render confirmation for order {}: {}", order.order_id, e);
            }
        }
    }

    async fn send_merchant_notification(&self, order: &Order, items: &[OrderItem]) {
        let recipient = match self.merchant_recipient().await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => return,
            Err(e) => {
                metrics::mail::failed("merchant");
                error!("Failed to load site settings for order {}: {}", order.order_id, e);
                return;
            }
        };
        match self
            .templates
            .merchant_notification(order, items, &recipient, &self.shop_name)
        {
            Ok(message) => self.deliver("merchant", &order.order_id, message).await,
            Err(e) => {
                metrics::mail::failed("merchant");
                error!("Failed to render merchant notice for order {}: {}", order.order_id, e);
            }
        }
    }

    async fn merchant_recipient(&self) -> Result<Option<String>> {
        Ok(self.storage.get_site_settings().await?.merchant_order_email)
    }

    async fn deliver(&self, kind: &'static str, order_id: &str, message: EmailMessage) {
        let to = message.to.clone();
        match self.mailer.send(message).await {
            Ok(()) => {
                metrics::mail::sent(kind);
                info!("Sent {} e-mail for order {} to {}", kind, order_id, to);
            }
            Err(e) => {
                metrics::mail::failed(kind);
                error!("Failed to send {} e-mail for order {}: {}", kind, order_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ShopError;
    use crate::domain::{OrderDraft, SiteSettingsPatch};
    use crate::storage::InMemoryStorage;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: EmailMessage) -> Result<()> {
            if self.fail {
                return Err(ShopError::Mail("relay refused".to_string()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn order() -> Order {
        OrderDraft {
            customer_name: "Nagy Béla".to_string(),
            customer_email: "bela@example.com".to_string(),
            ..OrderDraft::default()
        }
        .into_order(1, "FC20250101/XY9Z".to_string(), Decimal::new(1000, 0), Utc::now())
    }

    fn notifier(mailer: Arc<RecordingMailer>, storage: Arc<InMemoryStorage>) -> OrderNotifier {
        OrderNotifier::new(
            mailer,
            Arc::new(EmailTemplates::new().unwrap()),
            storage,
            "FamilyCoffee",
        )
    }

    #[tokio::test]
    async fn sends_only_customer_mail_without_merchant_address() {
        let mailer = Arc::new(RecordingMailer::default());
        let storage = Arc::new(InMemoryStorage::new());
        notifier(mailer.clone(), storage)
            .order_placed(order(), Vec::new())
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "bela@example.com");
    }

    #[tokio::test]
    async fn copies_merchant_when_configured() {
        let mailer = Arc::new(RecordingMailer::default());
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .update_site_settings(SiteSettingsPatch {
                merchant_order_email: Some("bolt@example.com".to_string()),
            })
            .await
            .unwrap();
        notifier(mailer.clone(), storage)
            .order_placed(order(), Vec::new())
            .await
            .unwrap();

        let recipients: Vec<String> = mailer
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.to.clone())
            .collect();
        assert_eq!(recipients, vec!["bela@example.com", "bolt@example.com"]);
    }

    #[tokio::test]
    async fn transport_failures_are_swallowed() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        });
        let storage = Arc::new(InMemoryStorage::new());
        let handle = notifier(mailer.clone(), storage).order_placed(order(), Vec::new());
        assert!(handle.await.is_ok());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
