use super::EmailMessage;
use crate::common::error::Result;
use crate::domain::{Order, OrderItem};
use tera::{Context, Tera};

const TEMPLATES: [(&str, &str); 4] = [
    (
        "order_confirmation.html",
        include_str!("../../templates/email/order_confirmation.html"),
    ),
    (
        "order_confirmation.txt",
        include_str!("../../templates/email/order_confirmation.txt"),
    ),
    (
        "merchant_notification.html",
        include_str!("../../templates/email/merchant_notification.html"),
    ),
    (
        "merchant_notification.txt",
        include_str!("../../templates/email/merchant_notification.txt"),
    ),
];

/// Order e-mail templates compiled into the binary.
pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())?;
        Ok(Self { tera })
    }

    fn context(order: &Order, items: &[OrderItem], shop_name: &str) -> Context {
        let mut context = Context::new();
        context.insert("order", order);
        context.insert("items", items);
        context.insert("shop_name", shop_name);
        context
    }

    /// Confirmation sent to the customer; `None` when the order has no e-mail.
    pub fn order_confirmation(
        &self,
        order: &Order,
        items: &[OrderItem],
        shop_name: &str,
    ) -> Result<Option<EmailMessage>> {
        let Some(to) = order.customer_email.clone() else {
            return Ok(None);
        };
        let context = Self::context(order, items, shop_name);
        Ok(Some(EmailMessage {
            to,
            subject: format!("Rendelés visszaigazolás #{}", order.order_id),
            text_body: self.tera.render("order_confirmation.txt", &context)?,
            html_body: Some(self.tera.render("order_confirmation.html", &context)?),
        }))
    }

    /// New-order notice for the merchant inbox.
    pub fn merchant_notification(
        &self,
        order: &Order,
        items: &[OrderItem],
        to: &str,
        shop_name: &str,
    ) -> Result<EmailMessage> {
        let context = Self::context(order, items, shop_name);
        Ok(EmailMessage {
            to: to.to_string(),
            subject: format!("Új rendelés #{}", order.order_id),
            text_body: self.tera.render("merchant_notification.txt", &context)?,
            html_body: Some(self.tera.render("merchant_notification.html", &context)?),
        })
    }
}
