//! Presence roster for remote participants.
//!
//! Presences are ephemeral: one is opened on "participant joined" and
//! finalized (`left_at` set) on "participant left" or when the bridge is
//! disposed. Finalized entries stay in the roster as history.

use chrono::{DateTime, Utc};
use common::types::{ParticipantId, SessionId};
use tracing::debug;

/// One remote participant's stay in the meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl Presence {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Roster owned by a single bridge actor.
#[derive(Debug, Clone)]
pub struct PresenceRoster {
    session_id: SessionId,
    entries: Vec<Presence>,
}

impl PresenceRoster {
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            entries: Vec::new(),
        }
    }

    /// Open a presence. A repeated join for an active participant only
    /// refreshes the display name.
    pub fn join(&mut self, participant_id: ParticipantId, display_name: String, at: DateTime<Utc>) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|p| p.is_active() && p.participant_id == participant_id)
        {
            debug!(target: "classroom.bridge", participant_id = %participant_id, "Duplicate join, refreshing name");
            existing.display_name = display_name;
            return;
        }

        self.entries.push(Presence {
            session_id: self.session_id,
            participant_id,
            display_name,
            audio_enabled: true,
            video_enabled: true,
            joined_at: at,
            left_at: None,
        });
    }

    /// Finalize the active presence of `participant_id`.
    ///
    /// Returns `false` when the participant had no active presence.
    pub fn leave(&mut self, participant_id: &ParticipantId, at: DateTime<Utc>) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|p| p.is_active() && &p.participant_id == participant_id)
        {
            Some(presence) => {
                presence.left_at = Some(at);
                true
            }
            None => {
                debug!(target: "classroom.bridge", participant_id = %participant_id, "Leave for unknown participant");
                false
            }
        }
    }

    /// Finalize every open presence. Returns how many were closed.
    pub fn finalize_all(&mut self, at: DateTime<Utc>) -> usize {
        let mut closed = 0;
        for presence in self.entries.iter_mut().filter(|p| p.is_active()) {
            presence.left_at = Some(at);
            closed += 1;
        }
        closed
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|p| p.is_active()).count()
    }

    /// Participants in the meeting including the local one; never below 1.
    #[must_use]
    pub fn participant_count(&self) -> u32 {
        u32::try_from(self.active_count())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    #[must_use]
    pub fn entries(&self) -> &[Presence] {
        &self.entries
    }
}
