use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use professional_cell::models::{ClinicService, Professional, Schedule, Slot};
use professional_cell::services::slots::is_offered_on;

use crate::models::{BookingRequest, PatientIdentity};
use crate::services::validation::validate_patient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Service,
    Professional,
    DateTime,
    Confirm,
}

/// Every variant carries the message shown to the user. A failed call
/// leaves the wizard unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WizardError {
    #[error("This choice belongs to the {expected:?} step, the booking is at {current:?}")]
    WrongStep { expected: WizardStep, current: WizardStep },

    #[error("Can only go back to an earlier step")]
    NotAnEarlierStep,

    #[error("This service is not available for booking")]
    ServiceUnavailable,

    #[error("This professional is not available for booking")]
    ProfessionalUnavailable,

    #[error("This professional does not attend {0}")]
    SpecialtyMismatch(String),

    #[error("Choose a date that is not in the past")]
    DateInPast,

    #[error("The professional does not attend on this date")]
    DateNotOffered,

    #[error("This time is no longer available")]
    SlotUnavailable,

    #[error("This time has already passed")]
    SlotInPast,

    #[error("{0}")]
    InvalidPatient(String),
}

/// Client-side booking flow: service, then professional, then date and
/// time, then confirmation. Selections are only accepted on their own step;
/// going back keeps them until they are replaced.
#[derive(Debug, Clone)]
pub struct BookingWizard {
    step: WizardStep,
    service: Option<ClinicService>,
    professional: Option<Professional>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
}

impl Default for BookingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Service,
            service: None,
            professional: None,
            date: None,
            time: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn service(&self) -> Option<&ClinicService> {
        self.service.as_ref()
    }

    pub fn professional(&self) -> Option<&Professional> {
        self.professional.as_ref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    fn require_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep { expected, current: self.step });
        }
        Ok(())
    }

    /// Choosing a service resets everything chosen after it, since the
    /// professional list depends on the service's specialty.
    pub fn select_service(&mut self, service: ClinicService) -> Result<(), WizardError> {
        self.require_step(WizardStep::Service)?;
        if !service.is_active {
            return Err(WizardError::ServiceUnavailable);
        }

        debug!("Wizard: service {} selected", service.id);
        self.service = Some(service);
        self.professional = None;
        self.date = None;
        self.time = None;
        self.step = WizardStep::Professional;
        Ok(())
    }

    pub fn select_professional(&mut self, professional: Professional) -> Result<(), WizardError> {
        self.require_step(WizardStep::Professional)?;
        let Some(service) = &self.service else {
            return Err(WizardError::WrongStep { expected: WizardStep::Service, current: self.step });
        };
        if !professional.is_active {
            return Err(WizardError::ProfessionalUnavailable);
        }
        if !professional.attends(&service.specialty) {
            return Err(WizardError::SpecialtyMismatch(service.specialty.clone()));
        }

        let changed = self.professional.as_ref().map(|p| p.id) != Some(professional.id);
        if changed {
            self.date = None;
            self.time = None;
        }

        debug!("Wizard: professional {} selected", professional.id);
        self.professional = Some(professional);
        self.step = WizardStep::DateTime;
        Ok(())
    }

    /// `schedules` are the chosen professional's weekly rows.
    pub fn select_date(&mut self, date: NaiveDate, schedules: &[Schedule], today: NaiveDate) -> Result<(), WizardError> {
        self.require_step(WizardStep::DateTime)?;
        if date < today {
            return Err(WizardError::DateInPast);
        }
        if !is_offered_on(schedules, date) {
            return Err(WizardError::DateNotOffered);
        }

        self.date = Some(date);
        self.time = None;
        Ok(())
    }

    /// `slot` must come from the slot listing of the selected date.
    pub fn select_time(&mut self, slot: &Slot, now: NaiveDateTime) -> Result<(), WizardError> {
        self.require_step(WizardStep::DateTime)?;
        let Some(date) = self.date else {
            return Err(WizardError::WrongStep { expected: WizardStep::DateTime, current: self.step });
        };
        if !slot.is_available() {
            return Err(WizardError::SlotUnavailable);
        }
        if date.and_time(slot.start_time) <= now {
            return Err(WizardError::SlotInPast);
        }

        self.time = Some(slot.start_time);
        self.step = WizardStep::Confirm;
        Ok(())
    }

    pub fn go_back(&mut self, step: WizardStep) -> Result<(), WizardError> {
        if step >= self.step {
            return Err(WizardError::NotAnEarlierStep);
        }
        self.step = step;
        Ok(())
    }

    /// Produces the booking request. The wizard itself is not consumed, so a
    /// failed commit can be retried.
    pub fn submit(&self, patient: PatientIdentity, notes: Option<String>) -> Result<BookingRequest, WizardError> {
        self.require_step(WizardStep::Confirm)?;
        validate_patient(&patient).map_err(WizardError::InvalidPatient)?;

        let (Some(service), Some(professional), Some(date), Some(time)) =
            (&self.service, &self.professional, self.date, self.time)
        else {
            return Err(WizardError::WrongStep { expected: WizardStep::Service, current: self.step });
        };

        Ok(BookingRequest {
            service_id: service.id,
            professional_id: professional.id,
            appointment_date: date,
            appointment_time: time,
            patient: PatientIdentity {
                name: patient.name.trim().to_string(),
                email: patient.email.trim().to_lowercase(),
                phone: patient.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            },
            notes,
        })
    }
}
