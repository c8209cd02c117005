//! `kontera-api` — the callable-action surface.
//!
//! Every core operation is exposed as a method with structured inputs and a
//! structured [`ActionResult`] (success flag plus payload, or an error code,
//! message and remediation hints). An external tool-invocation front end maps
//! requests onto these calls.

pub mod app;
pub mod dto;
pub mod error;

pub use app::Kontera;
pub use dto::{
    ActionResult, AnnotateRequest, CreateVatVoucherRequest, CreateVoucherRequest, EntryInput,
    PeriodClosedPayload, SupersedeRequest, VatComponentInput, VatVoucherPayload, VoidRequest,
};
pub use error::ApiError;
