use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::task::JoinHandle;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    LowStockEvent,
    NewOrderEvent,
    NotificationService,
    OrderStatusChangedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub new_order_producer: Vec<EventProducer<NewOrderEvent>>,
    pub order_status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub low_stock_producer: Vec<EventProducer<LowStockEvent>>,
}

pub struct EventHandlers {
    pub on_new_order: Option<EventHandler<NewOrderEvent>>,
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_low_stock: Option<EventHandler<LowStockEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_new_order = hooks.on_new_order.map(|f| EventHandler::new(buffer_size, f));
        let on_order_status_changed = hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_low_stock = hooks.on_low_stock.map(|f| EventHandler::new(buffer_size, f));
        Self { on_new_order, on_order_status_changed, on_low_stock }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_new_order {
            result.new_order_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_low_stock {
            result.low_stock_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns one consumer task per registered hook. Each task ends once every producer for its channel has been
    /// dropped and the outstanding jobs are done, so awaiting the returned handles is a graceful shutdown.
    pub fn start_handlers(self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(3);
        if let Some(handler) = self.on_new_order {
            handles.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_order_status_changed {
            handles.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_low_stock {
            handles.push(tokio::spawn(handler.start_handler()));
        }
        debug!("📬️ Started {} event handlers", handles.len());
        handles
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_new_order: Option<Handler<NewOrderEvent>>,
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_low_stock: Option<Handler<LowStockEvent>>,
}

impl EventHooks {
    pub fn on_new_order<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NewOrderEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_new_order = Some(Arc::new(f));
        self
    }

    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_low_stock<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(LowStockEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_low_stock = Some(Arc::new(f));
        self
    }

    /// Routes all three events to `notifier`. Notification failures are logged and otherwise ignored.
    pub fn with_notifier<N: NotificationService + 'static>(&mut self, notifier: Arc<N>) -> &mut Self {
        let n = Arc::clone(&notifier);
        self.on_new_order(move |ev: NewOrderEvent| {
            let n = Arc::clone(&n);
            Box::pin(async move {
                let order_id = ev.order.id;
                if let Err(e) = n.notify_new_order(order_id, &ev.customer_label, ev.total()).await {
                    warn!("📬️ New order notification for order #{order_id} failed: {e}");
                }
            })
        });
        let n = Arc::clone(&notifier);
        self.on_order_status_changed(move |ev: OrderStatusChangedEvent| {
            let n = Arc::clone(&n);
            Box::pin(async move {
                if let Err(e) = n.notify_order_status_change(ev.order_id, ev.new_status).await {
                    warn!("📬️ Status change notification for order #{} failed: {e}", ev.order_id);
                }
            })
        });
        let n = notifier;
        self.on_low_stock(move |ev: LowStockEvent| {
            let n = Arc::clone(&n);
            Box::pin(async move {
                let p = &ev.product;
                if let Err(e) =
                    n.notify_low_stock(p.product_id, &p.product_name, p.current_stock, p.threshold).await
                {
                    warn!("📬️ Low stock notification for product #{} failed: {e}", p.product_id);
                }
            })
        });
        self
    }
}
