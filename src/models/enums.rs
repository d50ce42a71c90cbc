use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Enum stored as a TEXT column: one string per variant, used for SQLite,
/// serde and display alike.
macro_rules! storage_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: other.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

storage_enum!(OcrStatus {
    Idle => "idle",
    Scanning => "scanning",
    Done => "done",
    Error => "error",
});

storage_enum!(AttachmentModule {
    Diagnosis => "diagnosis",
    MedicalAdvice => "medical_advice",
    CostReceipt => "cost_ocr",
    General => "general",
});

storage_enum!(MedicationStatus {
    Active => "active",
    Stopped => "stopped",
    Completed => "completed",
});

storage_enum!(LogStatus {
    Taken => "taken",
    Skipped => "skipped",
});

// New attachments start unscanned; new plans start active.
impl Default for OcrStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl Default for MedicationStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn attachment_module_round_trip() {
        for (variant, s) in [
            (AttachmentModule::Diagnosis, "diagnosis"),
            (AttachmentModule::MedicalAdvice, "medical_advice"),
            (AttachmentModule::CostReceipt, "cost_ocr"),
            (AttachmentModule::General, "general"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AttachmentModule::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn medication_status_round_trip() {
        for (variant, s) in [
            (MedicationStatus::Active, "active"),
            (MedicationStatus::Stopped, "stopped"),
            (MedicationStatus::Completed, "completed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(MedicationStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_uses_storage_strings() {
        let json = serde_json::to_string(&AttachmentModule::CostReceipt).unwrap();
        assert_eq!(json, "\"cost_ocr\"");
        let status: LogStatus = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(status, LogStatus::Skipped);
    }

    #[test]
    fn invalid_value_rejected() {
        let err = OcrStatus::from_str("pending").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }
}
