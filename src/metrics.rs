//! Prometheus counters for the shop.
//!
//! The recorder is installed once per process; `/metrics` renders whatever the
//! handle has accumulated.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Every metric name the service records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    CartsCreated,
    CartMutations,
    OrdersPlaced,
    OrderIdCollisions,
    EmailsSent,
    EmailsFailed,
    ContactMessagesReceived,
    LoginAttempts,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CartsCreated => "fc_carts_created_total",
            MetricName::CartMutations => "fc_cart_mutations_total",
            MetricName::OrdersPlaced => "fc_orders_placed_total",
            MetricName::OrderIdCollisions => "fc_order_id_collisions_total",
            MetricName::EmailsSent => "fc_emails_sent_total",
            MetricName::EmailsFailed => "fc_emails_failed_total",
            MetricName::ContactMessagesReceived => "fc_contact_messages_total",
            MetricName::LoginAttempts => "fc_login_attempts_total",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            MetricName::CartsCreated => "Carts created for new or expired cookies",
            MetricName::CartMutations => "Cart mutations by operation",
            MetricName::OrdersPlaced => "Orders committed",
            MetricName::OrderIdCollisions => "Order id candidates rejected as duplicates",
            MetricName::EmailsSent => "E-mails handed to the mail transport",
            MetricName::EmailsFailed => "E-mails that failed to render or send",
            MetricName::ContactMessagesReceived => "Contact form submissions stored",
            MetricName::LoginAttempts => "Staff login attempts by outcome",
        }
    }

    pub fn all() -> impl Iterator<Item = MetricName> {
        [
            MetricName::CartsCreated,
            MetricName::CartMutations,
            MetricName::OrdersPlaced,
            MetricName::OrderIdCollisions,
            MetricName::EmailsSent,
            MetricName::EmailsFailed,
            MetricName::ContactMessagesReceived,
            MetricName::LoginAttempts,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder, or return the one already installed.
pub fn init() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let handle = match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus recorder installed");
                handle
            }
            Err(e) => {
                // Another recorder owns the global slot; keep a detached one so
                // rendering still works.
                warn!("Failed to install Prometheus recorder: {}", e);
                PrometheusBuilder::new().build_recorder().handle()
            }
        };
        for name in MetricName::all() {
            ::metrics::describe_counter!(name.as_str(), name.help());
        }
        handle
    })
}

/// Prometheus text exposition of the current counters.
pub fn render() -> String {
    init().render()
}

pub mod cart {
    use super::MetricName;

    pub fn created() {
        ::metrics::counter!(MetricName::CartsCreated.as_str()).increment(1);
    }

    pub fn mutation(operation: &'static str) {
        ::metrics::counter!(MetricName::CartMutations.as_str(), "operation" => operation).increment(1);
    }
}

pub mod orders {
    use super::MetricName;

    pub fn placed() {
        ::metrics::counter!(MetricName::OrdersPlaced.as_str()).increment(1);
    }

    pub fn id_collision() {
        ::metrics::counter!(MetricName::OrderIdCollisions.as_str()).increment(1);
    }
}

pub mod mail {
    use super::MetricName;

    pub fn sent(kind: &'static str) {
        ::metrics::counter!(MetricName::EmailsSent.as_str(), "kind" => kind).increment(1);
    }

    pub fn failed(kind: &'static str) {
        ::metrics::counter!(MetricName::EmailsFailed.as_str(), "kind" => kind).increment(1);
    }
}

pub mod contact {
    use super::MetricName;

    pub fn received() {
        ::metrics::counter!(MetricName::ContactMessagesReceived.as_str()).increment(1);
    }
}

pub mod auth {
    use super::MetricName;

    pub fn login_attempt(outcome: &'static str) {
        ::metrics::counter!(MetricName::LoginAttempts.as_str(), "outcome" => outcome).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed_counters() {
        for name in MetricName::all() {
            assert!(name.as_str().starts_with("fc_"));
            assert!(name.as_str().ends_with("_total"));
        }
    }

    #[test]
    fn init_is_idempotent() {
        let first = init() as *const PrometheusHandle;
        let second = init() as *const PrometheusHandle;
        assert_eq!(first, second);
    }
}
