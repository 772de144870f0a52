use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::steps::ScreeningStep;

/// Captured form state for one step, as a tagged union: each variant holds
/// only the fields that step actually collects, so a delivery method can
/// never leak into a consent record the way the original catch-all object
/// allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepData {
    AppointmentSchedule(AppointmentData),
    ParentConsent(ConsentData),
    StudentRegistration(RegistrationData),
    VaScreening(VisualAcuityData),
    DoctorDiagnosis(DiagnosisData),
    GlassesSelection(GlassesData),
    InventoryCheck(InventoryData),
    SchoolDelivery(DeliveryData),
}

impl StepData {
    /// The step this payload belongs to.
    pub fn step(&self) -> ScreeningStep {
        match self {
            StepData::AppointmentSchedule(_) => ScreeningStep::AppointmentSchedule,
            StepData::ParentConsent(_) => ScreeningStep::ParentConsent,
            StepData::StudentRegistration(_) => ScreeningStep::StudentRegistration,
            StepData::VaScreening(_) => ScreeningStep::VaScreening,
            StepData::DoctorDiagnosis(_) => ScreeningStep::DoctorDiagnosis,
            StepData::GlassesSelection(_) => ScreeningStep::GlassesSelection,
            StepData::InventoryCheck(_) => ScreeningStep::InventoryCheck,
            StepData::SchoolDelivery(_) => ScreeningStep::SchoolDelivery,
        }
    }

    /// Check the payload is complete enough to leave its step. The error is
    /// an operator-facing reason, not an internal code.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StepData::AppointmentSchedule(data) => data.validate(),
            StepData::ParentConsent(data) => data.validate(),
            StepData::StudentRegistration(data) => data.validate(),
            StepData::VaScreening(data) => data.validate(),
            StepData::DoctorDiagnosis(data) => data.validate(),
            StepData::GlassesSelection(data) => data.validate(),
            StepData::InventoryCheck(data) => data.validate(),
            StepData::SchoolDelivery(data) => data.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentData {
    pub scheduled_on: NaiveDate,
    pub school: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AppointmentData {
    fn validate(&self) -> Result<(), String> {
        if self.school.trim().is_empty() {
            return Err("appointment is missing the school name".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentData {
    pub granted: bool,
    pub consent_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
}

impl ConsentData {
    fn validate(&self) -> Result<(), String> {
        if !self.granted {
            return Err("parental consent has not been granted".to_string());
        }
        if self.consent_date.is_none() {
            return Err("consent is granted but the consent date is missing".to_string());
        }
        Ok(())
    }
}

/// Contact details confirmed (or entered manually) at the registration step.
/// The actual patient creation goes through the registration gate; this
/// records what the operator keyed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizen_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub manual_entry: bool,
}

impl RegistrationData {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// One eye's acuity entry, e.g. "20/40". Kept as entered; the backend owns
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcuityReading {
    pub uncorrected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected: Option<String>,
}

impl AcuityReading {
    fn is_filled(&self) -> bool {
        !self.uncorrected.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAcuityData {
    pub right_eye: AcuityReading,
    pub left_eye: AcuityReading,
    #[serde(default)]
    pub wears_glasses: bool,
}

impl VisualAcuityData {
    fn validate(&self) -> Result<(), String> {
        if !self.right_eye.is_filled() || !self.left_eye.is_filled() {
            return Err("acuity must be recorded for both eyes".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub sphere_right: f32,
    pub sphere_left: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cylinder_right: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cylinder_left: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_right: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_left: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pupillary_distance_mm: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisData {
    pub summary: String,
    pub needs_glasses: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<Prescription>,
}

impl DiagnosisData {
    fn validate(&self) -> Result<(), String> {
        if self.needs_glasses && self.prescription.is_none() {
            return Err("glasses were indicated but no prescription was entered".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlassesData {
    pub frame_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens_type: Option<String>,
}

impl GlassesData {
    fn validate(&self) -> Result<(), String> {
        if self.frame_model.trim().is_empty() {
            return Err("a frame model must be selected".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryData {
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_sku: Option<String>,
}

impl InventoryData {
    fn validate(&self) -> Result<(), String> {
        if self.in_stock && self.reserved_sku.is_none() {
            return Err("in-stock glasses must have a reserved SKU".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    SchoolDropOff,
    ClinicPickup,
    Courier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryData {
    pub method: DeliveryMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_on: Option<NaiveDate>,
}

impl DeliveryData {
    fn validate(&self) -> Result<(), String> {
        if self.method == DeliveryMethod::SchoolDropOff && self.school_contact.is_none() {
            return Err("school drop-off needs a school contact".to_string());
        }
        Ok(())
    }
}

/// Per-step captured state, keyed by step name on the wire.
///
/// Append-only from the sequencer's point of view: backward navigation never
/// touches it, and re-recording a step replaces that step's entry with what
/// the operator just confirmed. Only the explicit patient switch clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDataMap(BTreeMap<ScreeningStep, StepData>);

impl StepDataMap {
    /// Record a step's payload, returning the entry it replaced, if any.
    pub fn record(&mut self, data: StepData) -> Option<StepData> {
        self.0.insert(data.step(), data)
    }

    pub fn get(&self, step: ScreeningStep) -> Option<&StepData> {
        self.0.get(&step)
    }

    pub fn contains(&self, step: ScreeningStep) -> bool {
        self.0.contains_key(&step)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop everything. Only the destructive patient-switch path calls this.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScreeningStep, &StepData)> {
        self.0.iter()
    }
}
