use serde::{Deserialize, Serialize};

/// The fixed ordered stages of a mobile vision-screening session.
///
/// The ordering is invariant and known statically; forward movement walks
/// the sequence one step at a time, and the only sanctioned shortcut is the
/// jump to `ParentConsent` when a patient is picked from a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStep {
    AppointmentSchedule,
    ParentConsent,
    StudentRegistration,
    VaScreening,
    DoctorDiagnosis,
    GlassesSelection,
    InventoryCheck,
    SchoolDelivery,
}

pub const STEP_SEQUENCE: [ScreeningStep; ScreeningStep::COUNT] = [
    ScreeningStep::AppointmentSchedule,
    ScreeningStep::ParentConsent,
    ScreeningStep::StudentRegistration,
    ScreeningStep::VaScreening,
    ScreeningStep::DoctorDiagnosis,
    ScreeningStep::GlassesSelection,
    ScreeningStep::InventoryCheck,
    ScreeningStep::SchoolDelivery,
];

impl ScreeningStep {
    pub const COUNT: usize = 8;

    pub fn first() -> Self {
        ScreeningStep::AppointmentSchedule
    }

    pub fn last() -> Self {
        ScreeningStep::SchoolDelivery
    }

    /// 0-based position in the sequence; this is the wire form of
    /// `current_step` in session documents.
    pub fn index(self) -> usize {
        match self {
            ScreeningStep::AppointmentSchedule => 0,
            ScreeningStep::ParentConsent => 1,
            ScreeningStep::StudentRegistration => 2,
            ScreeningStep::VaScreening => 3,
            ScreeningStep::DoctorDiagnosis => 4,
            ScreeningStep::GlassesSelection => 5,
            ScreeningStep::InventoryCheck => 6,
            ScreeningStep::SchoolDelivery => 7,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        STEP_SEQUENCE.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ScreeningStep::AppointmentSchedule => "appointment_schedule",
            ScreeningStep::ParentConsent => "parent_consent",
            ScreeningStep::StudentRegistration => "student_registration",
            ScreeningStep::VaScreening => "va_screening",
            ScreeningStep::DoctorDiagnosis => "doctor_diagnosis",
            ScreeningStep::GlassesSelection => "glasses_selection",
            ScreeningStep::InventoryCheck => "inventory_check",
            ScreeningStep::SchoolDelivery => "school_delivery",
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn is_last(self) -> bool {
        self == Self::last()
    }

    /// Steps whose form must be captured and valid before the sequencer
    /// lets the operator move on. Consent and acuity entry gate the clinical
    /// stages that build on them; the remaining steps may be walked past and
    /// filled in on a later visit.
    pub fn requires_captured_data(self) -> bool {
        matches!(
            self,
            ScreeningStep::ParentConsent | ScreeningStep::VaScreening
        )
    }
}

impl std::fmt::Display for ScreeningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Serde adapter for the session document's integer `current_step` field.
/// Deserialization rejects out-of-range indices so a corrupt document never
/// reattaches the sequencer at a nonexistent step.
pub mod step_index {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ScreeningStep;

    pub fn serialize<S>(step: &ScreeningStep, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(step.index() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ScreeningStep, D::Error>
    where
        D: Deserializer<'de>,
    {
        let index = u64::deserialize(deserializer)?;
        usize::try_from(index)
            .ok()
            .and_then(ScreeningStep::from_index)
            .ok_or_else(|| {
                serde::de::Error::custom(format!(
                    "step index {} outside the screening sequence (0..{})",
                    index,
                    ScreeningStep::COUNT
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_indices_are_dense_and_stable() {
        for (expected, step) in STEP_SEQUENCE.iter().enumerate() {
            assert_eq!(step.index(), expected);
            assert_eq!(ScreeningStep::from_index(expected), Some(*step));
        }
        assert_eq!(ScreeningStep::from_index(ScreeningStep::COUNT), None);
    }

    #[test]
    fn forward_and_backward_navigation_agree() {
        for step in STEP_SEQUENCE {
            if let Some(next) = step.next() {
                assert_eq!(next.prev(), Some(step));
            }
        }
        assert_eq!(ScreeningStep::first().prev(), None);
        assert_eq!(ScreeningStep::last().next(), None);
    }

    #[test]
    fn step_serializes_as_snake_case_name() {
        let json = serde_json::to_string(&ScreeningStep::VaScreening).unwrap();
        assert_eq!(json, "\"va_screening\"");
    }
}
