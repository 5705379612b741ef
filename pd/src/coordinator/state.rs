//! Pairing state owned by the coordinator task
//!
//! Everything here is synchronous and single-owner. The coordinator task is
//! the only thing that ever holds a `&mut PairingState`, so each method is one
//! indivisible check-then-mutate step.
//!
//! A user is in at most one of three places:
//! - the waiting queue
//! - an in-flight match (reserved, link not generated yet)
//! - the pending results map (match committed, result not read yet)

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{PairingResult, PairingStatus, UserId};

/// FIFO of waiting users with O(1) membership checks
#[derive(Debug, Default)]
pub struct WaitingQueue {
    order: VecDeque<UserId>,
    members: HashSet<UserId>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// Append at the tail; refuses users already queued
    pub fn push_back(&mut self, user: UserId) -> bool {
        if !self.members.insert(user.clone()) {
            return false;
        }
        self.order.push_back(user);
        true
    }

    /// Insert at the head; refuses users already queued
    pub fn push_front(&mut self, user: UserId) -> bool {
        if !self.members.insert(user.clone()) {
            return false;
        }
        self.order.push_front(user);
        true
    }

    pub fn pop_front(&mut self) -> Option<UserId> {
        let user = self.order.pop_front()?;
        self.members.remove(&user);
        Some(user)
    }

    /// Remove a user wherever they are in the queue
    pub fn remove(&mut self, user: &UserId) -> bool {
        if !self.members.remove(user) {
            return false;
        }
        self.order.retain(|u| u != user);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.order.iter()
    }
}

/// A match that has been decided but has no meeting link yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub match_id: Uuid,
    /// The arrival that found a waiter
    pub requester: UserId,
    /// The waiter taken from the head of the queue
    pub partner: UserId,
    partner_cancelled: bool,
}

impl Reservation {
    /// Whether the partner asked to stop waiting while the link was being made
    pub fn partner_cancelled(&self) -> bool {
        self.partner_cancelled
    }

    fn involves(&self, user: &UserId) -> bool {
        &self.requester == user || &self.partner == user
    }
}

/// What a `request_partner` call turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStep {
    /// Already queued, matching, or holding an unread result
    NoOp,
    /// Appended to the waiting queue
    Enqueued,
    /// Head waiter taken; a link must now be generated for this reservation
    Reserved(Reservation),
}

/// A match whose link has been attached and published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedMatch {
    pub match_id: Uuid,
    pub requester: UserId,
    pub partner: UserId,
    /// The requester's half; the partner's half is already in the pending map
    pub requester_result: PairingResult,
}

/// Waiting queue, in-flight matches and unread results
#[derive(Debug, Default)]
pub struct PairingState {
    queue: WaitingQueue,
    pending: HashMap<UserId, PairingResult>,
    in_flight: HashMap<Uuid, Reservation>,
}

impl PairingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiting(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_results(&self) -> usize {
        self.pending.len()
    }

    pub fn matches_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Waiting users in arrival order
    pub fn queued_users(&self) -> Vec<UserId> {
        self.queue.iter().cloned().collect()
    }

    fn is_matching(&self, user: &UserId) -> bool {
        self.in_flight.values().any(|r| r.involves(user))
    }

    /// Enqueue the user, or reserve a match against the head waiter
    pub fn begin_request(&mut self, user: UserId) -> RequestStep {
        if self.queue.contains(&user) || self.pending.contains_key(&user) || self.is_matching(&user) {
            debug!(%user, "begin_request: already waiting or paired");
            return RequestStep::NoOp;
        }

        match self.queue.pop_front() {
            Some(partner) => {
                let reservation = Reservation {
                    match_id: Uuid::now_v7(),
                    requester: user,
                    partner,
                    partner_cancelled: false,
                };
                debug!(match_id = %reservation.match_id, requester = %reservation.requester, partner = %reservation.partner, "begin_request: reserved");
                self.in_flight.insert(reservation.match_id, reservation.clone());
                RequestStep::Reserved(reservation)
            }
            None => {
                debug!(%user, "begin_request: enqueued");
                self.queue.push_back(user);
                RequestStep::Enqueued
            }
        }
    }

    /// Attach the link and publish the partner's result
    ///
    /// Returns `None` for an unknown or already settled match.
    pub fn commit_match(&mut self, match_id: Uuid, link: String, paired_at: DateTime<Utc>) -> Option<CommittedMatch> {
        let reservation = self.in_flight.remove(&match_id)?;
        let Reservation { requester, partner, .. } = reservation;

        let partner_result = PairingResult::new(requester.clone(), link.clone(), paired_at);
        let requester_result = PairingResult::new(partner.clone(), link, paired_at);
        self.pending.insert(partner.clone(), partner_result);

        debug!(%match_id, %requester, %partner, "commit_match: published");
        Some(CommittedMatch {
            match_id,
            requester,
            partner,
            requester_result,
        })
    }

    /// Roll a reservation back after link generation failed
    ///
    /// The partner goes back to the head of the queue so they keep their
    /// place, unless they cancelled in the meantime.
    pub fn abort_match(&mut self, match_id: Uuid) -> Option<Reservation> {
        let reservation = self.in_flight.remove(&match_id)?;
        if !reservation.partner_cancelled {
            self.queue.push_front(reservation.partner.clone());
        }
        debug!(%match_id, partner = %reservation.partner, requeued = !reservation.partner_cancelled, "abort_match: rolled back");
        Some(reservation)
    }

    /// Hold a result that could not be handed over, for the next poll
    ///
    /// A user who queued again in the meantime is taken off the queue: the
    /// held result answers that search. A user already matching or holding
    /// another result cannot take it, and `false` is returned.
    pub fn store_unclaimed(&mut self, user: UserId, result: PairingResult) -> bool {
        if self.pending.contains_key(&user) || self.is_matching(&user) {
            debug!(%user, "store_unclaimed: user already has a newer match");
            return false;
        }
        if self.queue.remove(&user) {
            debug!(%user, "store_unclaimed: left the queue to receive the held result");
        }
        debug!(%user, "store_unclaimed: holding result for next poll");
        self.pending.insert(user, result);
        true
    }

    /// Consuming status read
    pub fn poll(&mut self, user: &UserId) -> PairingStatus {
        if let Some(result) = self.pending.remove(user) {
            return PairingStatus::Paired(result);
        }
        if self.queue.contains(user) || self.is_matching(user) {
            return PairingStatus::Waiting;
        }
        PairingStatus::Idle
    }

    /// Leave the waiting queue
    ///
    /// Returns whether the user was removed from the queue. A partner whose
    /// match is already in flight is only flagged; the match still completes.
    pub fn cancel(&mut self, user: &UserId) -> bool {
        if self.queue.remove(user) {
            return true;
        }
        for reservation in self.in_flight.values_mut().filter(|r| &r.partner == user) {
            debug!(match_id = %reservation.match_id, %user, "cancel: partner already matching");
            reservation.partner_cancelled = true;
        }
        false
    }

    /// Check the cross-structure invariants, describing the first violation
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.queue.order.len() != self.queue.members.len() {
            return Err("waiting queue holds a duplicate".to_string());
        }
        for user in self.queue.iter() {
            if !self.queue.members.contains(user) {
                return Err(format!("{} queued but missing from membership set", user));
            }
            if self.pending.contains_key(user) {
                return Err(format!("{} is both waiting and holding a result", user));
            }
            if self.is_matching(user) {
                return Err(format!("{} is both waiting and matching", user));
            }
        }
        for reservation in self.in_flight.values() {
            if reservation.requester == reservation.partner {
                return Err(format!("{} matched with themselves", reservation.requester));
            }
            if self.pending.contains_key(&reservation.requester) || self.pending.contains_key(&reservation.partner) {
                return Err(format!("match {} overlaps an unread result", reservation.match_id));
            }
        }
        Ok(())
    }
}
