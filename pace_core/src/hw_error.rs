//! Maps `Box<dyn Error>` from trait boundaries to typed `PaceError`.
//!
//! The traits in `pace_traits` return `Box<dyn Error + Send + Sync>`; this
//! module converts those into `PaceError::Hardware`, with an optional
//! feature-gated path for `pace_hardware::HwError` downcasting.

use pace_traits::BoxError;

use crate::error::{PaceError, Result};

/// Map a trait-boundary error to a typed `PaceError`.
pub fn map_hw_error(
    component: &'static str,
    operation: &'static str,
    e: &(dyn std::error::Error + 'static),
) -> PaceError {
    // A device wrapper may already have produced a typed error
    if let Some(pace) = e.downcast_ref::<PaceError>() {
        return pace.clone();
    }

    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pace_hardware::HwError>() {
            let detail = match hw {
                pace_hardware::HwError::CommandFailed {
                    program,
                    status: Some(code),
                } => format!("`{program}` exited with code {code}"),
                pace_hardware::HwError::CommandFailed {
                    program,
                    status: None,
                } => format!("`{program}` was terminated by a signal"),
                other => other.to_string(),
            };
            return PaceError::Hardware {
                component,
                operation,
                detail,
            };
        }
    }

    PaceError::Hardware {
        component,
        operation,
        detail: e.to_string(),
    }
}

/// Attach component and operation to a trait-boundary result.
pub(crate) trait HwResultExt<T> {
    fn hw(self, component: &'static str, operation: &'static str) -> Result<T>;
}

impl<T> HwResultExt<T> for std::result::Result<T, BoxError> {
    fn hw(self, component: &'static str, operation: &'static str) -> Result<T> {
        self.map_err(|e| eyre::Report::new(map_hw_error(component, operation, &*e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_keep_their_message() {
        let e: BoxError = "reader door open".into();
        let mapped = map_hw_error("reader", "plate_out", &*e);
        assert_eq!(
            mapped,
            PaceError::Hardware {
                component: "reader",
                operation: "plate_out",
                detail: "reader door open".into()
            }
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn command_failures_report_exit_code() {
        let e: BoxError = Box::new(pace_hardware::HwError::CommandFailed {
            program: "plink".into(),
            status: Some(3),
        });
        match map_hw_error("pumps", "refill", &*e) {
            PaceError::Hardware { detail, .. } => assert!(detail.contains("code 3")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn typed_errors_pass_through() {
        let e: BoxError = Box::new(PaceError::Poisoned("robot"));
        assert_eq!(
            map_hw_error("robot", "aspirate", &*e),
            PaceError::Poisoned("robot")
        );
    }
}
