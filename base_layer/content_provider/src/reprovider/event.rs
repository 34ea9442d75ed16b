// Copyright 2024, The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    fmt,
    fmt::{Display, Formatter},
    sync::Arc,
};

use tokio::sync::broadcast;

use crate::ContentId;

pub type ReproviderEventSender = broadcast::Sender<Arc<ReproviderEvent>>;
pub type ReproviderEventReceiver = broadcast::Receiver<Arc<ReproviderEvent>>;

/// The reprovider task an event relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Copying tracked ids into the queue
    Sweep,
    /// Taking ids off the queue and announcing them
    Drain,
}

impl Display for Activity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Sweep => write!(f, "sweep"),
            Activity::Drain => write!(f, "drain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepReason {
    Timer,
    Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReproviderEvent {
    /// Every tracked id was submitted to the queue
    SweepCompleted { reason: SweepReason, enqueued: usize },
    Announced(ContentId),
    AnnounceFailed(ContentId, String),
    /// The id was dequeued but is no longer held locally
    SkippedMissing(ContentId),
    PresenceCheckFailed(ContentId, String),
    StoreFailure { activity: Activity, reason: String },
    /// The activity exceeded its store failure budget and has stopped
    Degraded(Activity),
}

impl Display for ReproviderEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use ReproviderEvent::*;
        match self {
            SweepCompleted { reason, enqueued } => {
                write!(f, "SweepCompleted({:?}, {} enqueued)", reason, enqueued)
            },
            Announced(id) => write!(f, "Announced({})", id),
            AnnounceFailed(id, reason) => write!(f, "AnnounceFailed({}, {})", id, reason),
            SkippedMissing(id) => write!(f, "SkippedMissing({})", id),
            PresenceCheckFailed(id, reason) => write!(f, "PresenceCheckFailed({}, {})", id, reason),
            StoreFailure { activity, reason } => write!(f, "StoreFailure({}, {})", activity, reason),
            Degraded(activity) => write!(f, "Degraded({})", activity),
        }
    }
}
