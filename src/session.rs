//! Per-operator context passed into every console operation.
//!
//! An [`AdminSession`] is only ever built for an authenticated admin. It
//! carries the single-flight state of that operator's edits, the category
//! currently in focus, and the open item preview.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::{AppError, AppResult};
use crate::services::edit_form::ItemEditForm;
use crate::services::gallery::ItemPreview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(AppError::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

/// Identity supplied by the login boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Role,
}

/// Kinds of mutation that may have at most one request in flight per operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditSlot {
    Category,
    Subcategory,
    Item,
    Report,
    User,
}

impl EditSlot {
    fn describe(self) -> &'static str {
        match self {
            EditSlot::Category => "category edit",
            EditSlot::Subcategory => "subcategory edit",
            EditSlot::Item => "item edit",
            EditSlot::Report => "report edit",
            EditSlot::User => "user edit",
        }
    }
}

/// Holds an edit slot until dropped.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct FlightGuard {
    slots: Arc<Mutex<HashSet<EditSlot>>>,
    slot: EditSlot,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        lock(&self.slots).remove(&self.slot);
    }
}

/// Identifies one "category in focus" selection. Responses produced for an
/// older ticket are stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTicket {
    generation: u64,
    category_id: String,
}

impl FocusTicket {
    pub fn category_id(&self) -> &str {
        &self.category_id
    }
}

pub struct AdminSession {
    user: AuthenticatedUser,
    in_flight: Arc<Mutex<HashSet<EditSlot>>>,
    focus_generation: AtomicU64,
    focused_category: Mutex<Option<String>>,
    preview: Mutex<Option<ItemPreview>>,
    edit_form: Mutex<Option<ItemEditForm>>,
}

impl AdminSession {
    /// Admits only authenticated admins.
    pub fn establish(current_user: Option<AuthenticatedUser>) -> AppResult<Self> {
        let user = current_user.ok_or(AppError::Unauthenticated)?;
        if user.role != Role::Admin {
            tracing::warn!("Rejected console access for user {}", user.user_id);
            return Err(AppError::PermissionDenied("Admin role required".to_string()));
        }
        Ok(Self {
            user,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            focus_generation: AtomicU64::new(0),
            focused_category: Mutex::new(None),
            preview: Mutex::new(None),
            edit_form: Mutex::new(None),
        })
    }

    pub fn user(&self) -> &AuthenticatedUser {
        &self.user
    }

    /// Claims `slot` for the duration of one mutation.
    pub fn begin(&self, slot: EditSlot) -> AppResult<FlightGuard> {
        let mut slots = lock(&self.in_flight);
        if !slots.insert(slot) {
            return Err(AppError::Busy(format!(
                "a {} is already being submitted",
                slot.describe()
            )));
        }
        Ok(FlightGuard {
            slots: self.in_flight.clone(),
            slot,
        })
    }

    pub fn is_in_flight(&self, slot: EditSlot) -> bool {
        lock(&self.in_flight).contains(&slot)
    }

    /// Moves focus to `category_id`, invalidating every earlier ticket.
    pub fn focus_category(&self, category_id: &str) -> FocusTicket {
        let mut focused = lock(&self.focused_category);
        let generation = self.focus_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *focused = Some(category_id.to_string());
        FocusTicket {
            generation,
            category_id: category_id.to_string(),
        }
    }

    pub fn focused_category(&self) -> Option<String> {
        lock(&self.focused_category).clone()
    }

    pub fn is_current(&self, ticket: &FocusTicket) -> bool {
        self.focus_generation.load(Ordering::SeqCst) == ticket.generation
    }

    pub fn show_preview(&self, preview: ItemPreview) {
        *lock(&self.preview) = Some(preview);
    }

    pub fn close_preview(&self) {
        *lock(&self.preview) = None;
    }

    /// Runs `f` against the open preview, if any.
    pub fn with_preview<R>(&self, f: impl FnOnce(&mut ItemPreview) -> R) -> Option<R> {
        lock(&self.preview).as_mut().map(f)
    }

    pub fn preview_item_id(&self) -> Option<String> {
        self.with_preview(|preview| preview.item.id.clone())
    }

    /// Replaces any form the operator had open.
    pub fn open_edit_form(&self, form: ItemEditForm) {
        *lock(&self.edit_form) = Some(form);
    }

    pub fn close_edit_form(&self) {
        *lock(&self.edit_form) = None;
    }

    pub fn with_edit_form<R>(&self, f: impl FnOnce(&mut ItemEditForm) -> R) -> Option<R> {
        lock(&self.edit_form).as_mut().map(f)
    }
}

/// Default idle period after which an unused session is dropped.
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct RegisteredSession {
    session: Arc<AdminSession>,
    last_seen: Instant,
}

impl RegisteredSession {
    /// Idle past `ttl` with no request holding it and nothing in flight.
    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_seen) >= ttl
            && Arc::strong_count(&self.session) == 1
            && lock(&self.session.in_flight).is_empty()
    }
}

/// One session per operator, so single-flight state spans all of that
/// operator's requests. Sessions idle for longer than the TTL are evicted
/// on the next lookup.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, RegisteredSession>>,
    idle_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_SESSION_IDLE_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn session_for(&self, current_user: Option<AuthenticatedUser>) -> AppResult<Arc<AdminSession>> {
        let session = AdminSession::establish(current_user)?;
        let now = Instant::now();
        let mut sessions = lock(&self.sessions);

        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_idle(now, self.idle_ttl));
        if sessions.len() < before {
            tracing::debug!("Evicted {} idle console sessions", before - sessions.len());
        }

        let entry = sessions
            .entry(session.user.user_id.clone())
            .or_insert_with(|| RegisteredSession {
                session: Arc::new(session),
                last_seen: now,
            });
        entry.last_seen = now;
        Ok(entry.session.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounds every remote call with a timeout.
#[derive(Debug, Clone, Copy)]
pub struct OperationPolicy {
    timeout: Duration,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

impl OperationPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<T, F>(&self, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("{} timed out after {:?}", operation, self.timeout);
                Err(AppError::Timeout(operation.to_string()))
            }
        }
    }

    /// Like [`run`](Self::run), but also abandons the call once `cancel` fires.
    pub async fn run_cancellable<T, F>(
        &self,
        operation: &str,
        cancel: &CancelToken,
        fut: F,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(operation.to_string()));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("{} cancelled", operation);
                Err(AppError::Cancelled(operation.to_string()))
            }
            result = self.run(operation, fut) => result,
        }
    }
}

/// Cancellation signal shared between the caller and an in-flight read.
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
