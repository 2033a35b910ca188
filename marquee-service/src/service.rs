use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use marquee_core::error::LockError;
use marquee_core::model::LockRules;
use marquee_core::{LockManager, LockStore};
use marquee_shared::events::{LockEvent, SeatsBookedEvent, SeatsLockedEvent, SeatsReleasedEvent};

use crate::contract::{
    ExtendRequest, ExtendResponse, LockRequest, LockResponse, MarkSeatsRequest, MarkSeatsResponse,
    StatusRequest, StatusResponse, UnlockRequest, UnlockResponse,
};
use crate::metrics::Metrics;

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Client-facing facade over the lock manager. Conflicts are part of the
/// response contract, not errors; store outages propagate so the booking
/// flow fails closed.
pub struct SeatLockService {
    manager: LockManager,
    metrics: Arc<Metrics>,
    events: broadcast::Sender<LockEvent>,
}

impl SeatLockService {
    pub fn new(store: Arc<dyn LockStore>, rules: LockRules, metrics: Arc<Metrics>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            manager: LockManager::new(store, rules),
            metrics,
            events,
        }
    }

    /// Seat-map subscribers (e.g. a live auditorium view) receive every
    /// lock, release and booked transition.
    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.events.subscribe()
    }

    pub async fn lock(&self, req: LockRequest) -> Result<LockResponse, LockError> {
        match self
            .manager
            .acquire(req.showtime_id, &req.seat_codes, &req.holder_id, req.ttl_seconds)
            .await
        {
            Ok(grant) => {
                self.metrics
                    .locks_acquired
                    .inc_by(grant.seat_codes.len() as u64);
                let _ = self.events.send(LockEvent::Locked(SeatsLockedEvent {
                    showtime_id: grant.showtime_id,
                    seat_codes: grant.seat_codes.clone(),
                    holder_id: req.holder_id.clone(),
                    locked_at: Utc::now().timestamp(),
                    expires_at: grant.expires_at,
                }));
                Ok(LockResponse {
                    locked: grant.seat_codes,
                    expires_at: Some(grant.expires_at),
                    conflicts: Vec::new(),
                })
            }
            Err(LockError::Conflict { conflicts }) => {
                self.metrics.lock_conflicts.inc_by(conflicts.len() as u64);
                Ok(LockResponse {
                    locked: Vec::new(),
                    expires_at: None,
                    conflicts,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn unlock(&self, req: UnlockRequest) -> Result<UnlockResponse, LockError> {
        let released = self
            .manager
            .release(req.showtime_id, &req.seat_codes, &req.holder_id)
            .await?;
        if !released.is_empty() {
            self.metrics.locks_released.inc_by(released.len() as u64);
            let _ = self.events.send(LockEvent::Released(SeatsReleasedEvent {
                showtime_id: req.showtime_id,
                seat_codes: released.clone(),
                holder_id: req.holder_id.clone(),
                released_at: Utc::now().timestamp(),
            }));
        }
        Ok(UnlockResponse { released })
    }

    pub async fn extend(&self, req: ExtendRequest) -> Result<ExtendResponse, LockError> {
        let outcome = self
            .manager
            .extend(req.showtime_id, &req.seat_codes, &req.holder_id, req.ttl_seconds)
            .await?;
        self.metrics
            .locks_extended
            .inc_by(outcome.extended.len() as u64);
        self.metrics.locks_lost.inc_by(outcome.lost.len() as u64);
        Ok(ExtendResponse {
            extended: outcome.extended,
            lost: outcome.lost,
            expires_at: outcome.expires_at,
        })
    }

    pub async fn status(&self, req: StatusRequest) -> Result<StatusResponse, LockError> {
        let seats = self.manager.status(req.showtime_id, &req.holder_id).await?;
        Ok(StatusResponse { seats })
    }

    pub async fn mark_booked(&self, req: MarkSeatsRequest) -> Result<MarkSeatsResponse, LockError> {
        let updated = self
            .manager
            .mark_booked(req.showtime_id, &req.seat_codes)
            .await?;
        if !updated.is_empty() {
            let _ = self.events.send(LockEvent::Booked(SeatsBookedEvent {
                showtime_id: req.showtime_id,
                seat_codes: updated.clone(),
                booked_at: Utc::now().timestamp(),
            }));
        }
        Ok(MarkSeatsResponse { updated })
    }

    pub async fn mark_released(
        &self,
        req: MarkSeatsRequest,
    ) -> Result<MarkSeatsResponse, LockError> {
        let updated = self
            .manager
            .mark_released(req.showtime_id, &req.seat_codes)
            .await?;
        Ok(MarkSeatsResponse { updated })
    }
}
