use chrono::NaiveDateTime;

use crate::workflow::error::{WorkflowError, WorkflowResult};

/// A half-open reservation interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> WorkflowResult<Self> {
        if start >= end {
            return Err(WorkflowError::validation(
                "The reservation start must be before its end",
            ));
        }
        Ok(Self { start, end })
    }

    /// Half-open overlap: `a.start < b.end && b.start < a.end`. Touching
    /// endpoints do not overlap.
    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 14)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn window(start: u32, end: u32) -> Window {
        Window::new(at(start, 0), at(end, 0)).unwrap()
    }

    #[test]
    fn empty_or_inverted_windows_are_rejected() {
        assert!(Window::new(at(10, 0), at(10, 0)).is_err());
        assert!(Window::new(at(12, 0), at(10, 0)).is_err());
    }

    #[test]
    fn overlapping_windows_are_detected() {
        // [10,12) vs [11,13)
        assert!(window(10, 12).overlaps(&window(11, 13)));
        assert!(window(11, 13).overlaps(&window(10, 12)));
        // containment
        assert!(window(10, 14).overlaps(&window(11, 12)));
        // identical
        assert!(window(10, 12).overlaps(&window(10, 12)));
    }

    #[test]
    fn touching_endpoints_do_not_overlap() {
        assert!(!window(10, 12).overlaps(&window(12, 14)));
        assert!(!window(12, 14).overlaps(&window(10, 12)));
    }

    #[test]
    fn disjoint_windows_do_not_overlap() {
        assert!(!window(8, 9).overlaps(&window(10, 12)));
    }
}
