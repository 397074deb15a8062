use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use courier_common::order::{EscrowParty, Order, OrderStatus};
use courier_common::reconcile::Snapshot;
use courier_common::user::{Role, User};
use courier_common::wallet::plan_escrow_funding;
use courier_common::wire::{self, AuthResponse, OrderDraft, ReviewDraft};

use crate::api::Api;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::push;
use crate::reconciler;
use crate::session::{self, Session};
use crate::state::SharedState;
use crate::wallet_sync;

/// The sync engine: owns the REST client, the authenticated session,
/// the reconciled snapshot, and the background tasks that keep all of
/// it fresh. One engine per process; hand out the `Arc` to callers.
pub struct Engine {
    config: ClientConfig,
    api: Arc<Api>,
    state: SharedState,
    session: Arc<RwLock<Option<Session>>>,
    trigger: mpsc::Sender<()>,
    shutdown: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Builds the engine, restores any persisted session, and spawns
    /// the reconciler, wallet synchronizer, and push listener.
    pub async fn start(config: ClientConfig) -> Result<Arc<Self>> {
        let api = Arc::new(Api::new(&config)?);

        let restored = session::load(config.session_dir.as_deref());
        if let Some(restored) = &restored {
            api.set_token(Some(restored.token.clone())).await;
            tracing::info!("restored session for user {}", restored.user.id);
        }
        let session = Arc::new(RwLock::new(restored));
        let state = SharedState::new();

        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel(1);

        let reconciler_task = tokio::spawn(reconciler::run_reconciler(
            api.clone(),
            state.clone(),
            config.poll_interval,
            config.sweep_concurrency,
            trigger_rx,
            shutdown_tx.subscribe(),
        ));
        let wallet_task = tokio::spawn(wallet_sync::run_wallet_sync(
            api.clone(),
            session.clone(),
            config.session_dir.clone(),
            config.poll_interval,
            shutdown_tx.subscribe(),
        ));
        let push_task = tokio::spawn(push::run_push_listener(
            config.ws_url.clone(),
            trigger_tx.clone(),
            shutdown_tx.subscribe(),
        ));

        Ok(Arc::new(Self {
            config,
            api,
            state,
            session,
            trigger: trigger_tx,
            shutdown: shutdown_tx,
            tasks: Mutex::new(vec![reconciler_task, wallet_task, push_task]),
        }))
    }

    /// Stops the background tasks and waits for them to finish. An
    /// in-flight pass may still complete; the generation guard keeps a
    /// late result from landing anywhere observable.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(());
        for task in self.tasks.lock().await.drain(..) {
            let _ = task.await;
        }
    }

    // ─── Session ───

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let auth = self.api.login(email, password).await?;
        self.install_session(auth).await
    }

    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: Role,
    ) -> Result<User> {
        let auth = self.api.register(email, name, password, role).await?;
        self.install_session(auth).await
    }

    /// Clears the session, in memory and on disk, and drops the token.
    pub async fn logout(&self) -> Result<()> {
        self.api.set_token(None).await;
        *self.session.write().await = None;
        session::clear(self.config.session_dir.as_deref())
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    async fn install_session(&self, auth: AuthResponse) -> Result<User> {
        let user = wire::map_user(&auth.user);
        let session = Session {
            user: user.clone(),
            token: auth.token,
        };
        self.api.set_token(Some(session.token.clone())).await;
        if let Err(e) = session::save(self.config.session_dir.as_deref(), &session) {
            tracing::warn!("persisting session failed: {e}");
        }
        *self.session.write().await = Some(session);
        tracing::info!("signed in as user {}", user.id);

        self.nudge();
        if let Err(e) = wallet_sync::refresh_wallet(
            &self.api,
            &self.session,
            self.config.session_dir.as_deref(),
        )
        .await
        {
            tracing::warn!("initial wallet fetch failed: {e}");
        }
        Ok(self.current_user().await.unwrap_or(user))
    }

    async fn require_session(&self) -> Result<Session> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotAuthenticated)
    }

    // ─── Order view ───

    pub async fn snapshot(&self) -> Snapshot {
        self.state.snapshot().await
    }

    pub async fn order(&self, id: &str) -> Option<Order> {
        self.state.order(id).await
    }

    /// Runs a reconciliation pass right now instead of waiting for the
    /// next tick. Returns whether the built snapshot was installed.
    pub async fn refresh(&self) -> Result<bool> {
        reconciler::reconcile_once(&self.api, &self.state, self.config.sweep_concurrency).await
    }

    /// Re-fetches the signed-in user's wallet right now instead of
    /// waiting for the next wallet tick.
    pub async fn refresh_wallet(&self) -> Result<()> {
        wallet_sync::refresh_wallet(&self.api, &self.session, self.config.session_dir.as_deref())
            .await
    }

    /// Queues an asynchronous reconciliation pass.
    fn nudge(&self) {
        let _ = self.trigger.try_send(());
    }

    async fn order_or_err(&self, order_id: &str) -> Result<Order> {
        self.state
            .order(order_id)
            .await
            .ok_or_else(|| ClientError::UnknownOrder(order_id.to_string()))
    }

    // ─── Order mutations ───

    /// Publishes a new order under the signed-in store's identity.
    /// Identity and status fields of the draft are overwritten.
    pub async fn create_order(&self, mut draft: OrderDraft) -> Result<()> {
        let session = self.require_session().await?;
        draft.store_id = session.user.id;
        draft.store_name = session.user.name;
        draft.status = OrderStatus::Bidding;
        self.api.create_order(&draft).await?;
        self.nudge();
        Ok(())
    }

    /// Bid upsert: a rider's repeat bid on an order updates the
    /// existing amount instead of creating a duplicate.
    pub async fn place_bid(&self, order_id: &str, amount: f64) -> Result<()> {
        let session = self.require_session().await?;
        let order = self.order_or_err(order_id).await?;
        match order.bid_by(&session.user.id) {
            Some(existing) => self.api.update_bid(&existing.id, amount).await?,
            None => {
                self.api
                    .create_bid(order_id, &session.user.id, amount)
                    .await?
            }
        }
        self.nudge();
        Ok(())
    }

    /// Store accepts a bid. The bid must belong to the order and the
    /// order must still be open for bidding.
    pub async fn select_bidder(&self, order_id: &str, bid_id: &str) -> Result<()> {
        self.require_session().await?;
        let order = self.order_or_err(order_id).await?;
        order.validate_bid_selection(bid_id)?;
        order.validate_status_update(OrderStatus::AwaitingEscrow)?;
        self.api
            .set_order_status(order_id, OrderStatus::AwaitingEscrow)
            .await?;
        self.nudge();
        Ok(())
    }

    /// Advances an order along the fulfillment lifecycle. Illegal
    /// transitions are rejected before any request goes out.
    pub async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<()> {
        self.require_session().await?;
        let order = self.order_or_err(order_id).await?;
        order.validate_status_update(status)?;
        self.api.set_order_status(order_id, status).await?;
        self.nudge();
        Ok(())
    }

    // ─── Escrow ───

    pub async fn fund_store_escrow(&self, order_id: &str) -> Result<()> {
        self.fund_escrow(order_id, EscrowParty::Store).await
    }

    pub async fn fund_rider_escrow(&self, order_id: &str) -> Result<()> {
        self.fund_escrow(order_id, EscrowParty::Rider).await
    }

    /// Moves the party's owed amount from balance into escrow, then
    /// advances the order: to `READY_FOR_PICKUP` when the counterpart
    /// already funded, otherwise (re)asserting `AWAITING_ESCROW`.
    /// A party that already funded is a no-op, never a second charge.
    async fn fund_escrow(&self, order_id: &str, party: EscrowParty) -> Result<()> {
        let session = self.require_session().await?;
        let order = self.order_or_err(order_id).await?;

        let plan = match plan_escrow_funding(&order, party, &session.user.wallet)? {
            Some(plan) => plan,
            None => {
                tracing::debug!("order {order_id}: escrow already funded, nothing to do");
                return Ok(());
            }
        };
        if party == EscrowParty::Store && order.selected_bid().is_none() {
            tracing::warn!(
                "order {order_id}: funding store escrow from the initial offer, no bid selected"
            );
        }

        self.api
            .update_wallet(&session.user.id, plan.balance_after, plan.escrow_held_after)
            .await?;
        self.api.set_order_status(order_id, plan.next_status).await?;
        self.nudge();
        Ok(())
    }

    // ─── Chat & reviews ───

    pub async fn send_message(&self, order_id: &str, text: &str) -> Result<()> {
        let session = self.require_session().await?;
        self.api
            .send_message(order_id, &session.user.id, text)
            .await?;
        self.nudge();
        Ok(())
    }

    pub async fn submit_review(
        &self,
        order_id: &str,
        target_user_id: &str,
        rating: f64,
        comment: &str,
    ) -> Result<()> {
        let session = self.require_session().await?;
        let draft = ReviewDraft {
            order_id: order_id.to_string(),
            reviewer_id: session.user.id,
            reviewer_name: session.user.name,
            target_user_id: target_user_id.to_string(),
            rating,
            comment: comment.to_string(),
        };
        self.api.create_review(&draft).await?;
        self.nudge();
        Ok(())
    }
}
