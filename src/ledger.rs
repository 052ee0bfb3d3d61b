//! The order ledger: token assignment and all ledger mutation behind a
//! single-writer FIFO queue.
//!
//! A dedicated task owns the [`FileStore`] and processes commands from an
//! mpsc channel one at a time, in submission order. That channel is the
//! write queue: concurrent submissions from any number of handlers are
//! serialized here, so "read counter, increment, persist, append order"
//! executes as one unit and tokens come out unique and strictly
//! increasing. Every successful mutation is published on a broadcast
//! channel so open views can re-fetch the snapshot.

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use crate::{
    error::AppError,
    menu::Bill,
    order::{Order, OrderRequest, OrderStatus},
    store::FileStore,
};

const QUEUE_DEPTH: usize = 64;
const EVENT_CAPACITY: usize = 64;

/// Published after each successful ledger mutation. Observers treat any
/// event as "re-fetch the full snapshot"; the token is for display only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LedgerEvent {
    Submitted { token: u64 },
    Prepared { token: u64 },
    Served { token: u64 },
    Deleted { token: u64 },
    Cleared,
}

impl LedgerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::Submitted { .. } => "submitted",
            LedgerEvent::Prepared { .. } => "prepared",
            LedgerEvent::Served { .. } => "served",
            LedgerEvent::Deleted { .. } => "deleted",
            LedgerEvent::Cleared => "cleared",
        }
    }
}

/// Returned to the customer after a successful submission.
#[derive(Clone, Debug, Serialize)]
pub struct Receipt {
    pub ok: bool,
    pub id: String,
    pub token: u64,
}

type Reply<T> = oneshot::Sender<Result<T, AppError>>;

enum Command {
    Submit {
        request: OrderRequest,
        bill: Bill,
        reply: Reply<Receipt>,
    },
    Active {
        reply: Reply<Vec<Order>>,
    },
    Find {
        id: String,
        reply: Reply<Order>,
    },
    Prepare {
        id: String,
        reply: Reply<()>,
    },
    Serve {
        id: String,
        reply: Reply<()>,
    },
    Remove {
        id: String,
        reply: Reply<()>,
    },
    Served {
        reply: Reply<Vec<Order>>,
    },
    ClearServed {
        reply: Reply<()>,
    },
}

/// The single-writer task. Owns the store and the in-memory ledger state.
pub struct Ledger {
    receiver: mpsc::Receiver<Command>,
    store: FileStore,
    active: Vec<Order>,
    served: Vec<Order>,
    next_token: u64,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Loads ledger state from the store and returns the actor plus its
    /// client handle. The actor does nothing until [`Ledger::run`] is
    /// spawned.
    pub async fn open(store: FileStore) -> Result<(Self, LedgerClient), AppError> {
        let active = store.load_orders().await?;
        let served = store.load_served().await?;
        let next_token = store.load_next_token().await?;

        info!(
            active = active.len(),
            served = served.len(),
            next_token,
            "Ledger loaded"
        );

        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let ledger = Self {
            receiver,
            store,
            active,
            served,
            next_token,
            events: events.clone(),
        };
        let client = LedgerClient { sender, events };

        Ok((ledger, client))
    }

    pub async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            match command {
                Command::Submit {
                    request,
                    bill,
                    reply,
                } => {
                    let _ = reply.send(self.submit(&request, &bill).await);
                }
                Command::Active { reply } => {
                    let _ = reply.send(Ok(self.snapshot(&self.active)));
                }
                Command::Find { id, reply } => {
                    let found = self
                        .active
                        .iter()
                        .find(|o| o.id == id)
                        .cloned()
                        .ok_or(AppError::NotFound);
                    let _ = reply.send(found);
                }
                Command::Prepare { id, reply } => {
                    let _ = reply.send(self.prepare(&id).await);
                }
                Command::Serve { id, reply } => {
                    let _ = reply.send(self.serve(&id).await);
                }
                Command::Remove { id, reply } => {
                    let _ = reply.send(self.remove(&id).await);
                }
                Command::Served { reply } => {
                    let _ = reply.send(Ok(self.snapshot(&self.served)));
                }
                Command::ClearServed { reply } => {
                    let _ = reply.send(self.clear_served().await);
                }
            }
        }
    }

    /// Views render the most recent order first.
    fn snapshot(&self, orders: &[Order]) -> Vec<Order> {
        orders.iter().rev().cloned().collect()
    }

    fn publish(&self, event: LedgerEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    async fn submit(&mut self, request: &OrderRequest, bill: &Bill) -> Result<Receipt, AppError> {
        // Counter first. If the counter persists but the order append
        // fails, the token is skipped for good: never reused, never
        // duplicated.
        let token = self.next_token;
        self.next_token += 1;
        self.store.save_next_token(self.next_token).await?;

        let order = Order::create(token, request, bill);
        let id = order.id.clone();
        self.active.push(order);

        if let Err(e) = self.store.save_orders(&self.active).await {
            self.active.pop();
            warn!(token, "Order append failed, token skipped: {e}");
            return Err(e);
        }

        info!(token, total = bill.total, "Order submitted");
        self.publish(LedgerEvent::Submitted { token });

        Ok(Receipt {
            ok: true,
            id,
            token,
        })
    }

    async fn prepare(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self
            .active
            .iter()
            .position(|o| o.id == id)
            .ok_or(AppError::NotFound)?;

        let current = self.active[idx].status;
        let next = current
            .transition(OrderStatus::Prepared)
            .ok_or_else(|| AppError::Validation("order can no longer be prepared".into()))?;

        if next == current {
            return Ok(());
        }

        // Revert on a failed write so memory never runs ahead of disk;
        // otherwise the idempotent retry would return Ok with disk stale.
        self.active[idx].status = next;
        if let Err(e) = self.store.save_orders(&self.active).await {
            self.active[idx].status = current;
            return Err(e);
        }

        let token = self.active[idx].token;
        info!(token, "Order prepared");
        self.publish(LedgerEvent::Prepared { token });
        Ok(())
    }

    async fn serve(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self
            .active
            .iter()
            .position(|o| o.id == id)
            .ok_or(AppError::NotFound)?;

        let mut order = self.active[idx].clone();
        order.status = order
            .status
            .transition(OrderStatus::Served)
            .ok_or_else(|| AppError::Validation("order can no longer be served".into()))?;
        let token = order.token;

        // History file first: a failure between the two writes must leave
        // the order somewhere on disk, never dropped.
        self.served.push(order);
        if let Err(e) = self.store.save_served(&self.served).await {
            self.served.pop();
            return Err(e);
        }

        self.active.remove(idx);
        if let Err(e) = self.store.save_orders(&self.active).await {
            warn!(token, "Active ledger rewrite failed after serving: {e}");
            return Err(e);
        }

        info!(token, "Order served");
        self.publish(LedgerEvent::Served { token });
        Ok(())
    }

    async fn remove(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self
            .active
            .iter()
            .position(|o| o.id == id)
            .ok_or(AppError::NotFound)?;

        let token = self.active.remove(idx).token;
        self.store.save_orders(&self.active).await?;

        info!(token, "Order deleted");
        self.publish(LedgerEvent::Deleted { token });
        Ok(())
    }

    async fn clear_served(&mut self) -> Result<(), AppError> {
        self.served.clear();
        self.store.save_served(&self.served).await?;

        info!("Served history cleared");
        self.publish(LedgerEvent::Cleared);
        Ok(())
    }
}

/// Cheap-to-clone handle used by request handlers.
#[derive(Clone)]
pub struct LedgerClient {
    sender: mpsc::Sender<Command>,
    events: broadcast::Sender<LedgerEvent>,
}

impl LedgerClient {
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    async fn send<T>(
        &self,
        command: Command,
        reply: oneshot::Receiver<Result<T, AppError>>,
    ) -> Result<T, AppError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| AppError::LedgerClosed)?;
        reply.await.map_err(|_| AppError::LedgerClosed)?
    }

    /// Validates the request, then enqueues the submission. Validation
    /// failures never reach the writer task.
    pub async fn submit(&self, request: OrderRequest) -> Result<Receipt, AppError> {
        let bill = request.validate()?;
        let (tx, rx) = oneshot::channel();
        self.send(
            Command::Submit {
                request,
                bill,
                reply: tx,
            },
            rx,
        )
        .await
    }

    pub async fn active(&self) -> Result<Vec<Order>, AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Active { reply: tx }, rx).await
    }

    pub async fn find(&self, id: &str) -> Result<Order, AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            Command::Find {
                id: id.to_string(),
                reply: tx,
            },
            rx,
        )
        .await
    }

    pub async fn prepare(&self, id: &str) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            Command::Prepare {
                id: id.to_string(),
                reply: tx,
            },
            rx,
        )
        .await
    }

    pub async fn serve(&self, id: &str) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            Command::Serve {
                id: id.to_string(),
                reply: tx,
            },
            rx,
        )
        .await
    }

    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            Command::Remove {
                id: id.to_string(),
                reply: tx,
            },
            rx,
        )
        .await
    }

    pub async fn served(&self) -> Result<Vec<Order>, AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Served { reply: tx }, rx).await
    }

    pub async fn clear_served(&self) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ClearServed { reply: tx }, rx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::Selection;
    use std::path::Path;

    async fn spawn_ledger(dir: &Path) -> LedgerClient {
        let store = FileStore::open(dir).await.unwrap();
        let (ledger, client) = Ledger::open(store).await.unwrap();
        tokio::spawn(ledger.run());
        client
    }

    fn request(name: &str, qty: u32, price: u64) -> OrderRequest {
        OrderRequest {
            name: "Asha".into(),
            phone: "9876543210".into(),
            email: String::new(),
            register_no: String::new(),
            branch: String::new(),
            class: String::new(),
            arrears: String::new(),
            year_sem: String::new(),
            address: String::new(),
            pickup_time: String::new(),
            payment_method: String::new(),
            diet: String::new(),
            comments: String::new(),
            items: vec![Selection {
                name: name.into(),
                qty,
                price,
            }],
        }
    }

    #[tokio::test]
    async fn tokens_start_at_one_and_increase() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let first = client.submit(request("Veg Biryani", 1, 80)).await.unwrap();
        let second = client.submit(request("Masala Dosa", 2, 60)).await.unwrap();

        assert_eq!(first.token, 1);
        assert_eq!(second.token, 2);
        assert!(first.ok && second.ok);
    }

    #[tokio::test]
    async fn concurrent_submissions_get_distinct_increasing_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client
                    .submit(request("Filter Coffee", i + 1, 25))
                    .await
                    .unwrap()
                    .token
            }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap());
        }
        tokens.sort_unstable();
        tokens.dedup();

        assert_eq!(tokens, (1..=8).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn rejected_submission_leaves_counter_and_ledger_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let err = client.submit(request("Veg Biryani", 0, 80)).await;
        assert!(matches!(err, Err(AppError::Validation(_))));

        assert!(client.active().await.unwrap().is_empty());

        // The next accepted order still gets the first token.
        let receipt = client.submit(request("Veg Biryani", 1, 80)).await.unwrap();
        assert_eq!(receipt.token, 1);
    }

    #[tokio::test]
    async fn counter_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        {
            let client = spawn_ledger(dir.path()).await;
            client.submit(request("Veg Thali", 1, 100)).await.unwrap();
            client.submit(request("Veg Thali", 1, 100)).await.unwrap();
        }

        let client = spawn_ledger(dir.path()).await;
        let receipt = client.submit(request("Veg Thali", 1, 100)).await.unwrap();
        assert_eq!(receipt.token, 3);
        assert_eq!(client.active().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn prepare_is_idempotent_and_forward_only() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let receipt = client.submit(request("Paneer Tikka", 1, 120)).await.unwrap();

        client.prepare(&receipt.id).await.unwrap();
        client.prepare(&receipt.id).await.unwrap();

        let order = client.find(&receipt.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Prepared);
    }

    #[tokio::test]
    async fn serving_moves_the_order_to_history() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let receipt = client.submit(request("Chicken Roll", 2, 70)).await.unwrap();
        client.serve(&receipt.id).await.unwrap();

        assert!(client.active().await.unwrap().is_empty());
        assert!(matches!(
            client.find(&receipt.id).await,
            Err(AppError::NotFound)
        ));

        let served = client.served().await.unwrap();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0].status, OrderStatus::Served);
        assert_eq!(served[0].token, receipt.token);
    }

    #[tokio::test]
    async fn deleted_orders_never_reach_history() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let receipt = client.submit(request("Veg Biryani", 1, 80)).await.unwrap();
        client.remove(&receipt.id).await.unwrap();

        assert!(client.active().await.unwrap().is_empty());
        assert!(client.served().await.unwrap().is_empty());
        assert!(matches!(
            client.remove(&receipt.id).await,
            Err(AppError::NotFound)
        ));
    }

    // Turning a store file into a directory makes the next write to it
    // fail, which stands in for a full disk or permission loss.
    fn break_file(path: &Path) {
        std::fs::remove_file(path).unwrap();
        std::fs::create_dir(path).unwrap();
    }

    #[tokio::test]
    async fn failed_history_write_keeps_the_order_active() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let receipt = client.submit(request("Veg Thali", 1, 100)).await.unwrap();

        let served_path = dir.path().join("served.json");
        break_file(&served_path);

        assert!(client.serve(&receipt.id).await.is_err());
        assert_eq!(
            client.find(&receipt.id).await.unwrap().status,
            OrderStatus::Pending
        );
        assert!(client.served().await.unwrap().is_empty());

        std::fs::remove_dir(&served_path).unwrap();
        client.serve(&receipt.id).await.unwrap();
        assert!(client.active().await.unwrap().is_empty());
        assert_eq!(client.served().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_prepare_write_leaves_status_pending() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let receipt = client.submit(request("Paneer Tikka", 1, 120)).await.unwrap();

        let orders_path = dir.path().join("orders.json");
        break_file(&orders_path);

        assert!(client.prepare(&receipt.id).await.is_err());
        assert_eq!(
            client.find(&receipt.id).await.unwrap().status,
            OrderStatus::Pending
        );

        // The retry must actually persist, not short-circuit as a no-op.
        std::fs::remove_dir(&orders_path).unwrap();
        client.prepare(&receipt.id).await.unwrap();
        assert_eq!(
            client.find(&receipt.id).await.unwrap().status,
            OrderStatus::Prepared
        );
    }

    #[tokio::test]
    async fn snapshots_list_most_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        client.submit(request("Veg Biryani", 1, 80)).await.unwrap();
        client.submit(request("Masala Dosa", 1, 60)).await.unwrap();

        let active = client.active().await.unwrap();
        assert_eq!(active[0].token, 2);
        assert_eq!(active[1].token, 1);
    }

    #[tokio::test]
    async fn clearing_history_empties_it() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;

        let receipt = client.submit(request("Veg Thali", 1, 100)).await.unwrap();
        client.serve(&receipt.id).await.unwrap();
        client.clear_served().await.unwrap();

        assert!(client.served().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutations_publish_events() {
        let dir = tempfile::tempdir().unwrap();
        let client = spawn_ledger(dir.path()).await;
        let mut events = client.subscribe();

        let receipt = client.submit(request("Veg Biryani", 1, 80)).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            LedgerEvent::Submitted {
                token: receipt.token
            }
        );

        client.prepare(&receipt.id).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            LedgerEvent::Prepared {
                token: receipt.token
            }
        );

        client.serve(&receipt.id).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            LedgerEvent::Served {
                token: receipt.token
            }
        );
    }
}
