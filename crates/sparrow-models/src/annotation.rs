//! Annotation records persisted for the web frontend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detection outcome for one processed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Whether a bird was present in the segment's representative frame
    pub bird_detected: bool,
    /// When the detection pass completed
    pub processed_at: DateTime<Utc>,
}

impl Annotation {
    pub fn new(bird_detected: bool, processed_at: DateTime<Utc>) -> Self {
        Self {
            bird_detected,
            processed_at,
        }
    }
}

/// The full annotation artifact: segment filename to detection outcome.
///
/// A `BTreeMap` keeps the serialized artifact deterministic, which makes
/// repeated idempotent writes byte-identical.
pub type AnnotationMap = BTreeMap<String, Annotation>;
