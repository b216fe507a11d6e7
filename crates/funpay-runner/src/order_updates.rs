use std::collections::HashMap;

use funpay_parser::FragmentParse;
use funpay_types::{OrderStatus, OrderSummary, RunnerEvent};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::RunnerError;
use crate::retry::retry_detail_fetch;
use crate::runner::{PollCycleReport, UpdateRunner};

fn count_field(data: Option<&Value>, key: &str) -> u64 {
    let Some(value) = data.and_then(|data| data.get(key)) else {
        return 0;
    };
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
        .unwrap_or(0)
}

/// `(buyer, seller)` pending-order counts of an `orders_counters` object.
pub(crate) fn order_counts(data: Option<&Value>) -> (u64, u64) {
    (count_field(data, "buyer"), count_field(data, "seller"))
}

/// Diffs a fresh order list against the stored snapshot and replaces it.
pub(crate) fn diff_orders(
    snapshot: &mut Option<HashMap<String, OrderSummary>>,
    orders: Vec<OrderSummary>,
) -> Vec<RunnerEvent> {
    let mut events = Vec::new();
    let mut current = HashMap::with_capacity(orders.len());
    for order in orders {
        match snapshot.as_ref() {
            None => events.push(RunnerEvent::InitialOrder {
                order: order.clone(),
            }),
            Some(previous) => match previous.get(&order.id) {
                None => {
                    events.push(RunnerEvent::NewOrder {
                        order: order.clone(),
                    });
                    if order.status == OrderStatus::Closed {
                        events.push(RunnerEvent::OrderStatusChanged {
                            order: order.clone(),
                        });
                    }
                }
                Some(known) if known.status != order.status => {
                    events.push(RunnerEvent::OrderStatusChanged {
                        order: order.clone(),
                    });
                }
                Some(_) => {}
            },
        }
        current.insert(order.id.clone(), order);
    }
    *snapshot = Some(current);
    events
}

impl UpdateRunner {
    pub(crate) async fn derive_order_updates(
        &mut self,
        data: Option<&Value>,
        report: &mut PollCycleReport,
    ) -> Vec<RunnerEvent> {
        let mut events = Vec::new();
        if self.state.orders_initialized {
            let (buyer, seller) = order_counts(data);
            events.push(RunnerEvent::OrdersListChanged { buyer, seller });
        }
        self.state.orders_initialized = true;
        if !self.config.resolve_order_details {
            return events;
        }

        let runner: &Self = self;
        let fetched = retry_detail_fetch(
            "order list",
            self.config.detail_retry_attempts,
            self.config.detail_retry_delay,
            move || runner.fetch_order_list(),
        )
        .await;
        match fetched {
            Ok((orders, failures)) => {
                report.parse_failures = report.parse_failures.saturating_add(failures);
                events.extend(diff_orders(&mut self.state.order_snapshot, orders));
            }
            Err(error) => {
                report.exhausted_fetches = report.exhausted_fetches.saturating_add(1);
                error!(%error, "order list fetch exhausted; skipping order diff this pass");
            }
        }
        events
    }

    /// Parsed orders plus the number of rows that failed to parse.
    async fn fetch_order_list(&self) -> Result<(Vec<OrderSummary>, usize), RunnerError> {
        let html = self.session.fetch_orders_page().await?;
        let fragments = self.parser.parse_order_list(&html, self.account.id)?;
        let mut orders = Vec::with_capacity(fragments.len());
        let mut failures = 0usize;
        for fragment in fragments {
            match fragment {
                FragmentParse::Parsed(order) => orders.push(order),
                FragmentParse::Deleted => {}
                FragmentParse::Failed(error) => {
                    failures = failures.saturating_add(1);
                    warn!(%error, "skipping unparseable order row");
                }
            }
        }
        Ok((orders, failures))
    }
}
