//! # Field Audit Draft
//!
//! The mutable, locally persisted draft of a property verification. Owned by
//! one agent at a time and keyed by agent in the [`DraftStore`](crate::DraftStore).

use campus_core::{AgentId, Amount, GeoPoint, MediaId, TaskId, Timestamp};
use campus_geo::CheckIn;
use serde::{Deserialize, Serialize};

/// An amenity the listing claims the property has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    /// Stable identifier (e.g. `"borehole"`).
    pub id: String,
    /// Display label.
    pub label: String,
}

/// The agent's confirmation state for one amenity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenityCheck {
    /// Amenity identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Whether the agent saw it on site.
    pub confirmed: bool,
}

/// Kind of captured media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image.
    Photo,
    /// Video clip.
    Video,
}

/// A captured photo or video, already uploaded to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Identifier.
    pub id: MediaId,
    /// Where the upload lives.
    pub url: String,
    /// Photo or video.
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// When it was captured.
    pub captured_at: Timestamp,
}

/// Period the quoted rent covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentPeriod {
    /// Per month.
    Monthly,
    /// Per quarter.
    Quarterly,
    /// Per six months.
    Biannual,
    /// Per year.
    #[default]
    Yearly,
}

/// A partial update to the draft's free-form sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPatch {
    /// Rent quoted to the agent on site.
    pub physical_rent_quote: Option<Amount>,
    /// Period of the quote.
    pub rent_period: Option<RentPeriod>,
    /// Whether the quote matches the listing.
    pub is_rent_match: Option<bool>,
    /// Whether the manager/landlord's authority checked out.
    pub is_manager_valid: Option<bool>,
    /// Notes on the manager check.
    pub manager_notes: Option<String>,
    /// Nearby points of interest worth adding to the listing.
    pub poi_suggestions: Option<Vec<String>>,
    /// General comments.
    pub comments: Option<String>,
}

/// The in-progress audit draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAuditReport {
    /// Task under verification.
    pub task_id: TaskId,
    /// Owning agent.
    pub agent_id: AgentId,
    /// Where the agent checked in.
    pub check_in_geom: GeoPoint,
    /// When the agent checked in.
    pub visited_at: Timestamp,
    /// Whether the check-in fix was low accuracy.
    pub degraded_check_in: bool,
    /// Amenity confirmations, seeded from the listing.
    pub amenities: Vec<AmenityCheck>,
    /// Rent quoted on site.
    pub physical_rent_quote: Option<Amount>,
    /// Period of the quote.
    pub rent_period: RentPeriod,
    /// Whether the quote matches the listing.
    pub is_rent_match: Option<bool>,
    /// Whether the manager's authority checked out.
    pub is_manager_valid: Option<bool>,
    /// Notes on the manager check.
    pub manager_notes: String,
    /// Captured media.
    pub media: Vec<MediaItem>,
    /// Suggested points of interest.
    pub poi_suggestions: Vec<String>,
    /// General comments.
    pub comments: String,
    /// Time of the newest local write.
    pub last_saved_at: Timestamp,
    /// Incremented on every local write.
    pub revision: u64,
}

impl FieldAuditReport {
    /// A fresh draft from a verified check-in.
    pub fn start(check_in: &CheckIn, amenities: &[Amenity]) -> Self {
        let now = Timestamp::now();
        Self {
            task_id: check_in.task_id(),
            agent_id: check_in.agent_id(),
            check_in_geom: check_in.point(),
            visited_at: check_in.verified_at(),
            degraded_check_in: check_in.degraded_accuracy(),
            amenities: amenities
                .iter()
                .map(|a| AmenityCheck {
                    id: a.id.clone(),
                    label: a.label.clone(),
                    confirmed: false,
                })
                .collect(),
            physical_rent_quote: None,
            rent_period: RentPeriod::default(),
            is_rent_match: None,
            is_manager_valid: None,
            manager_notes: String::new(),
            media: Vec::new(),
            poi_suggestions: Vec::new(),
            comments: String::new(),
            last_saved_at: now,
            revision: 0,
        }
    }

    /// Apply the set fields of `patch`.
    pub fn apply(&mut self, patch: DraftPatch) {
        if let Some(v) = patch.physical_rent_quote {
            self.physical_rent_quote = Some(v);
        }
        if let Some(v) = patch.rent_period {
            self.rent_period = v;
        }
        if let Some(v) = patch.is_rent_match {
            self.is_rent_match = Some(v);
        }
        if let Some(v) = patch.is_manager_valid {
            self.is_manager_valid = Some(v);
        }
        if let Some(v) = patch.manager_notes {
            self.manager_notes = v;
        }
        if let Some(v) = patch.poi_suggestions {
            self.poi_suggestions = v;
        }
        if let Some(v) = patch.comments {
            self.comments = v;
        }
    }

    /// Record a local write.
    pub(crate) fn touch(&mut self) {
        let now = Timestamp::now();
        // Never move backwards, even if the wall clock does.
        self.last_saved_at = std::cmp::max(now, self.last_saved_at);
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> FieldAuditReport {
        FieldAuditReport {
            task_id: TaskId::new(),
            agent_id: AgentId::new(),
            check_in_geom: GeoPoint::new(6.5, 3.3).unwrap(),
            visited_at: Timestamp::now(),
            degraded_check_in: false,
            amenities: vec![],
            physical_rent_quote: None,
            rent_period: RentPeriod::Yearly,
            is_rent_match: None,
            is_manager_valid: None,
            manager_notes: String::new(),
            media: vec![],
            poi_suggestions: vec![],
            comments: String::new(),
            last_saved_at: Timestamp::now(),
            revision: 0,
        }
    }

    #[test]
    fn patch_only_overwrites_set_fields() {
        let mut d = draft();
        d.comments = "water pressure low".into();
        d.apply(DraftPatch {
            physical_rent_quote: Some(Amount::new(150_000).unwrap()),
            is_rent_match: Some(true),
            ..DraftPatch::default()
        });
        assert_eq!(d.physical_rent_quote, Some(Amount::new(150_000).unwrap()));
        assert_eq!(d.is_rent_match, Some(true));
        assert_eq!(d.comments, "water pressure low");
    }

    #[test]
    fn touch_is_monotonic() {
        let mut d = draft();
        let before = d.last_saved_at;
        d.touch();
        assert!(d.last_saved_at >= before);
        assert_eq!(d.revision, 1);
    }

    #[test]
    fn media_kind_serializes_as_type() {
        let item = MediaItem {
            id: MediaId::new(),
            url: "https://cdn.example/1.jpg".into(),
            kind: MediaKind::Photo,
            captured_at: Timestamp::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "photo");
    }

    #[test]
    fn patch_deserializes_from_sparse_json() {
        let p: DraftPatch = serde_json::from_str(r#"{"rent_period":"monthly"}"#).unwrap();
        assert_eq!(p.rent_period, Some(RentPeriod::Monthly));
        assert!(p.comments.is_none());
    }
}
