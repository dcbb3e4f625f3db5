//! Observational pipeline progress counter.

use serde::{Deserialize, Serialize};

/// Where a reservation's transaction pipeline currently is.
///
/// Purely observational: no business decision reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Idle,
    AligningPrice,
    ResolvingAddress,
    CreatingOrder,
    AcquiringPaymentLink,
    AwaitingPayment,
    Completed,
}

impl PipelineStage {
    /// Numeric step (0 = idle, 1..=4 in progress, 5 = awaiting payment, 6 = completed).
    pub fn step(self) -> u8 {
        match self {
            PipelineStage::Idle => 0,
            PipelineStage::AligningPrice => 1,
            PipelineStage::ResolvingAddress => 2,
            PipelineStage::CreatingOrder => 3,
            PipelineStage::AcquiringPaymentLink => 4,
            PipelineStage::AwaitingPayment => 5,
            PipelineStage::Completed => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::AligningPrice => "aligning price",
            PipelineStage::ResolvingAddress => "resolving shipping address",
            PipelineStage::CreatingOrder => "creating order",
            PipelineStage::AcquiringPaymentLink => "acquiring payment link",
            PipelineStage::AwaitingPayment => "awaiting payment",
            PipelineStage::Completed => "completed",
        }
    }
}

impl core::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
