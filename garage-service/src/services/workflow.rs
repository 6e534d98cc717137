//! Job card status workflow. Every status may move to every other status;
//! a transition only decides which status collections the card leaves and
//! enters.

use crate::models::JobCardStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: JobCardStatus,
    pub to: JobCardStatus,
}

impl Transition {
    pub fn new(from: JobCardStatus, to: JobCardStatus) -> Self {
        Self { from, to }
    }

    /// True when the card must leave its current status collection.
    pub fn moves_collection(&self) -> bool {
        self.from.collection() != self.to.collection()
    }

    pub fn is_reopen(&self) -> bool {
        self.from == JobCardStatus::Closed && self.to != JobCardStatus::Closed
    }
}
