//! Typing presence: the remote participant set and the local compose-box
//! debounce.
//!
//! Both sides are pure state machines keyed by arm sequences. The actor owns
//! the actual timers; a tick only takes effect if its sequence still matches,
//! so a renewed signal (or a newer edit) invalidates every older timer
//! without cancelling tasks.

use crate::state::TypingParticipant;
use crate::transport::TypingSignal;

pub(crate) enum RemoteObservation {
    /// Entry inserted or renewed; arm (or re-arm) the expiry timer with this
    /// sequence. `joined` is false on renewal — the visible set is unchanged.
    Started { seq: u64, joined: bool },
    /// Entry removed by an explicit stop signal.
    Stopped,
    /// Own signal or stop for an absent participant.
    NoChange,
}

struct RemoteEntry {
    participant_id: String,
    display_name: String,
    seq: u64,
}

/// Per-conversation set of "who is typing now". One independent state machine
/// per remote participant; expiry of one never affects the others.
pub(crate) struct RemoteTyping {
    entries: Vec<RemoteEntry>,
    next_seq: u64,
}

impl RemoteTyping {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn observe(&mut self, signal: &TypingSignal, viewer_id: &str) -> RemoteObservation {
        // Never show the viewer's own indicator.
        if signal.participant_id == viewer_id {
            return RemoteObservation::NoChange;
        }

        if signal.is_typing {
            self.next_seq += 1;
            let seq = self.next_seq;
            match self
                .entries
                .iter_mut()
                .find(|e| e.participant_id == signal.participant_id)
            {
                Some(entry) => {
                    entry.seq = seq;
                    entry.display_name = signal.display_name.clone();
                    RemoteObservation::Started { seq, joined: false }
                }
                None => {
                    self.entries.push(RemoteEntry {
                        participant_id: signal.participant_id.clone(),
                        display_name: signal.display_name.clone(),
                        seq,
                    });
                    RemoteObservation::Started { seq, joined: true }
                }
            }
        } else {
            let before = self.entries.len();
            self.entries
                .retain(|e| e.participant_id != signal.participant_id);
            if self.entries.len() < before {
                RemoteObservation::Stopped
            } else {
                RemoteObservation::NoChange
            }
        }
    }

    /// Expiry tick. Removes the participant only if no renewing signal has
    /// been observed since the timer was armed.
    pub(crate) fn expire(&mut self, participant_id: &str, seq: u64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.participant_id == participant_id && e.seq == seq));
        self.entries.len() < before
    }

    /// Currently typing participants, in arrival order.
    pub(crate) fn participants(&self) -> Vec<TypingParticipant> {
        self.entries
            .iter()
            .map(|e| TypingParticipant {
                participant_id: e.participant_id.clone(),
                display_name: e.display_name.clone(),
            })
            .collect()
    }
}

/// Outbound debounce for the viewer's compose box: every edit signals
/// `typing: true` and re-arms an idle timer; only the idle tick matching the
/// latest edit emits the `false`. A successful send emits `false` immediately
/// and invalidates any pending idle tick.
pub(crate) struct ComposerTyping {
    seq: u64,
    idle_armed: bool,
}

impl ComposerTyping {
    pub(crate) fn new() -> Self {
        Self {
            seq: 0,
            idle_armed: false,
        }
    }

    /// Returns the sequence for the idle timer armed by this edit.
    pub(crate) fn edited(&mut self) -> u64 {
        self.seq += 1;
        self.idle_armed = true;
        self.seq
    }

    /// True exactly once per quiet period: for the tick of the latest edit,
    /// if no send got there first.
    pub(crate) fn idle_elapsed(&mut self, seq: u64) -> bool {
        if self.idle_armed && seq == self.seq {
            self.idle_armed = false;
            true
        } else {
            false
        }
    }

    pub(crate) fn sent(&mut self) {
        self.seq += 1;
        self.idle_armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(participant: &str, is_typing: bool) -> TypingSignal {
        TypingSignal {
            participant_id: participant.to_string(),
            display_name: participant.to_uppercase(),
            is_typing,
        }
    }

    #[test]
    fn own_signals_are_ignored() {
        let mut typing = RemoteTyping::new();
        assert!(matches!(
            typing.observe(&signal("me", true), "me"),
            RemoteObservation::NoChange
        ));
        assert!(typing.participants().is_empty());
    }

    #[test]
    fn start_then_stop_never_needs_expiry() {
        let mut typing = RemoteTyping::new();
        let RemoteObservation::Started { seq, joined } = typing.observe(&signal("a", true), "me")
        else {
            panic!("expected Started");
        };
        assert!(joined);
        assert_eq!(typing.participants().len(), 1);

        assert!(matches!(
            typing.observe(&signal("a", false), "me"),
            RemoteObservation::Stopped
        ));
        assert!(typing.participants().is_empty());

        // The stale timer tick must not resurrect or remove anything.
        assert!(!typing.expire("a", seq));
    }

    #[test]
    fn renewal_invalidates_previous_timer() {
        let mut typing = RemoteTyping::new();
        let RemoteObservation::Started { seq: first, .. } =
            typing.observe(&signal("a", true), "me")
        else {
            panic!("expected Started");
        };
        let RemoteObservation::Started { seq: second, joined } =
            typing.observe(&signal("a", true), "me")
        else {
            panic!("expected Started");
        };
        assert!(!joined);
        assert_ne!(first, second);

        assert!(!typing.expire("a", first));
        assert_eq!(typing.participants().len(), 1);
        assert!(typing.expire("a", second));
        assert!(typing.participants().is_empty());
    }

    #[test]
    fn simultaneous_typists_expire_independently() {
        let mut typing = RemoteTyping::new();
        let RemoteObservation::Started { seq: a_seq, .. } =
            typing.observe(&signal("a", true), "me")
        else {
            panic!("expected Started");
        };
        let RemoteObservation::Started { seq: b_seq, .. } =
            typing.observe(&signal("b", true), "me")
        else {
            panic!("expected Started");
        };

        assert!(typing.expire("a", a_seq));
        let rest = typing.participants();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].participant_id, "b");

        assert!(typing.expire("b", b_seq));
        assert!(typing.participants().is_empty());
    }

    #[test]
    fn composer_emits_one_stop_per_quiet_period() {
        let mut composer = ComposerTyping::new();
        let s1 = composer.edited();
        let s2 = composer.edited();
        let s3 = composer.edited();

        // Ticks for superseded edits are stale.
        assert!(!composer.idle_elapsed(s1));
        assert!(!composer.idle_elapsed(s2));
        assert!(composer.idle_elapsed(s3));
        // The same quiet period never emits twice.
        assert!(!composer.idle_elapsed(s3));
    }

    #[test]
    fn send_cancels_pending_idle_tick() {
        let mut composer = ComposerTyping::new();
        let seq = composer.edited();
        composer.sent();
        assert!(!composer.idle_elapsed(seq));
    }
}
