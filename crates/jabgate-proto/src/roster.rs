//! Contact directory owned by a single session.
//!
//! Entries are keyed by bare identifier. The initial roster fetch creates
//! them; presence updates and message markers only merge into them.

use std::collections::HashMap;

use crate::event::PresenceEvent;
use crate::jid;

/// Presence type recorded for contacts fetched but not yet heard from.
pub const UNAVAILABLE: &str = "unavailable";

/// One contact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RosterEntry {
    /// Bare identifier.
    pub jid: String,
    /// Display name from the roster item.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    /// Subscription or availability type.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "type", default, skip_serializing_if = "Option::is_none")
    )]
    pub kind: Option<String>,
    /// Presence `show` value.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub show: Option<String>,
    /// Status text.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub status: Option<String>,
    /// Avatar reference.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub photo: Option<String>,
    /// Whether the conversation with this contact is off the record.
    #[cfg_attr(feature = "serde", serde(default))]
    pub otr: bool,
}

impl RosterEntry {
    fn new(bare: &str) -> Self {
        Self {
            jid: bare.to_string(),
            ..Self::default()
        }
    }
}

/// The session's contact list.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    entries: HashMap<String, RosterEntry>,
}

impl Roster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a contact from the roster fetch.
    ///
    /// A fetched contact starts out unavailable until its presence arrives.
    pub fn merge_fetched(&mut self, jid: &str, name: Option<&str>) {
        let bare = jid::bare(jid);
        let entry = self
            .entries
            .entry(bare.to_string())
            .or_insert_with(|| RosterEntry::new(bare));
        if let Some(name) = name {
            entry.name = Some(name.to_string());
        }
        entry.kind = Some(UNAVAILABLE.to_string());
    }

    /// Apply a roster push from the server.
    ///
    /// Unlike the initial fetch this never touches the presence type of a
    /// contact that is already known.
    pub fn merge_pushed(&mut self, jid: &str, name: Option<&str>) {
        let bare = jid::bare(jid);
        let entry = self.entries.entry(bare.to_string()).or_insert_with(|| RosterEntry {
            kind: Some(UNAVAILABLE.to_string()),
            ..RosterEntry::new(bare)
        });
        if let Some(name) = name {
            entry.name = Some(name.to_string());
        }
    }

    /// Drop a contact the server removed.
    pub fn remove(&mut self, jid: &str) -> Option<RosterEntry> {
        self.entries.remove(jid::bare(jid))
    }

    /// Merge a presence update into the matching entry, creating it if needed.
    ///
    /// `show`, `status` and `photo` overwrite only when present. The type is
    /// always replaced: an update without one means "available" and clears
    /// whatever was recorded before.
    pub fn apply_presence(&mut self, update: &PresenceEvent) {
        let bare = jid::bare(&update.jid);
        let entry = self
            .entries
            .entry(bare.to_string())
            .or_insert_with(|| RosterEntry::new(bare));

        entry.kind.clone_from(&update.kind);
        if let Some(show) = &update.show {
            entry.show = Some(show.clone());
        }
        if let Some(status) = &update.status {
            entry.status = Some(status.clone());
        }
        if let Some(photo) = &update.photo {
            entry.photo = Some(photo.clone());
        }
    }

    /// Set the off-the-record flag of an existing contact.
    ///
    /// Returns `false` when the contact is unknown.
    pub fn set_otr(&mut self, jid: &str, otr: bool) -> bool {
        match self.entries.get_mut(jid::bare(jid)) {
            Some(entry) => {
                entry.otr = otr;
                true
            }
            None => false,
        }
    }

    /// Off-the-record flag for a destination; unknown contacts are on the record.
    pub fn otr(&self, jid: &str) -> bool {
        self.get(jid).is_some_and(|entry| entry.otr)
    }

    /// Roster name when known, otherwise the bare identifier.
    pub fn display_name<'a>(&'a self, jid: &'a str) -> &'a str {
        let bare = jid::bare(jid);
        self.entries
            .get(bare)
            .and_then(|entry| entry.name.as_deref())
            .unwrap_or(bare)
    }

    /// Look up an entry by full or bare identifier.
    pub fn get(&self, jid: &str) -> Option<&RosterEntry> {
        self.entries.get(jid::bare(jid))
    }

    /// Iterate over current entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    /// Owned copies of every entry, for readers outside the session.
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        self.entries.values().cloned().collect()
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the roster has no contacts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
