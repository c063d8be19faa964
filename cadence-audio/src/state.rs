use std::sync::atomic::{AtomicBool, Ordering};

/// A summary of the playback flags of a [`Listener`](crate::Listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    /// The voice is playing.
    Playing,
    /// Playback was paused and resumes where it left off.
    Paused,
    /// Nothing was played since the listener was bound, rewound or seeked.
    Initial,
    /// Playback was stopped or played to the end.
    Stopped,
}

/// Playback flags shared between the control side and the voice's
/// notifications.
///
/// Playing and paused are mutually exclusive: setting one clears the other.
pub(crate) struct PlaybackState {
    initial: AtomicBool,
    playing: AtomicBool,
    paused: AtomicBool,
    looping: AtomicBool,
}

impl PlaybackState {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            initial: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            looping: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub(crate) fn is_initial(&self) -> bool {
        self.initial.load(Ordering::SeqCst)
    }

    #[must_use]
    pub(crate) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    #[must_use]
    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub(crate) fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    pub(crate) fn set_initial(&self, initial: bool) {
        self.initial.store(initial, Ordering::SeqCst);
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        if playing {
            self.paused.store(false, Ordering::SeqCst);
        }
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        if paused {
            self.playing.store(false, Ordering::SeqCst);
        }
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub(crate) fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::SeqCst);
    }

    /// Back to the state of a freshly bound listener. Looping is kept.
    pub(crate) fn reset(&self) {
        self.set_playing(false);
        self.set_paused(false);
        self.set_initial(true);
    }

    #[must_use]
    pub(crate) fn status(&self) -> PlaybackStatus {
        if self.is_playing() {
            PlaybackStatus::Playing
        } else if self.is_paused() {
            PlaybackStatus::Paused
        } else if self.is_initial() {
            PlaybackStatus::Initial
        } else {
            PlaybackStatus::Stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaybackState, PlaybackStatus};

    #[test]
    fn playing_and_paused_are_exclusive() {
        let state = PlaybackState::new();

        state.set_playing(true);
        state.set_paused(true);
        assert!(!state.is_playing());
        assert!(state.is_paused());

        state.set_playing(true);
        assert!(state.is_playing());
        assert!(!state.is_paused());
    }

    #[test]
    fn status_priority() {
        let state = PlaybackState::new();
        assert_eq!(state.status(), PlaybackStatus::Initial);

        state.set_playing(true);
        assert_eq!(state.status(), PlaybackStatus::Playing);

        state.set_paused(true);
        assert_eq!(state.status(), PlaybackStatus::Paused);

        state.set_paused(false);
        assert_eq!(state.status(), PlaybackStatus::Initial);

        state.set_initial(false);
        assert_eq!(state.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn reset_keeps_looping() {
        let state = PlaybackState::new();
        state.set_looping(true);
        state.set_playing(true);
        state.set_initial(false);

        state.reset();

        assert!(state.is_looping());
        assert_eq!(state.status(), PlaybackStatus::Initial);
    }
}
